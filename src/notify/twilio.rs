use async_trait::async_trait;
use serde::Deserialize;

use super::{ProviderError, SmsProvider};

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// Twilio Programmable Messaging over its REST API.
pub struct TwilioProvider {
    base_url: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
    client: reqwest::Client,
}

impl TwilioProvider {
    pub fn new(account_sid: &str, auth_token: &str, from_number: &str, timeout_secs: u64) -> Self {
        Self::with_base_url(TWILIO_API_BASE, account_sid, auth_token, from_number, timeout_secs)
    }

    pub fn with_base_url(
        base_url: &str,
        account_sid: &str,
        auth_token: &str,
        from_number: &str,
        timeout_secs: u64,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            account_sid: account_sid.to_string(),
            auth_token: auth_token.to_string(),
            from_number: from_number.to_string(),
            client,
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/Accounts/{}/Messages.json", self.base_url, self.account_sid)
    }
}

/// Success body of `POST .../Messages.json` (only the fields we use).
#[derive(Deserialize)]
struct MessageResponse {
    sid: String,
}

/// Error body returned with 4xx/5xx.
#[derive(Deserialize)]
struct ErrorResponse {
    code: Option<u32>,
    message: Option<String>,
    more_info: Option<String>,
}

fn parse_error_body(status: u16, body: &str) -> ProviderError {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(err) => ProviderError {
            code: err.code,
            message: err
                .message
                .unwrap_or_else(|| format!("Twilio returned HTTP {status}")),
            more_info: err.more_info,
        },
        Err(_) => ProviderError::new(None, format!("Twilio returned HTTP {status}: {body}")),
    }
}

#[async_trait]
impl SmsProvider for TwilioProvider {
    async fn send_message(&self, to: &str, body: &str) -> Result<String, ProviderError> {
        let form = [("To", to), ("From", self.from_number.as_str()), ("Body", body)];

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::new(None, "Twilio request timed out")
                } else {
                    ProviderError::new(None, format!("Twilio request failed: {e}"))
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::new(None, format!("Twilio response unreadable: {e}")))?;

        if !status.is_success() {
            return Err(parse_error_body(status.as_u16(), &text));
        }

        let parsed: MessageResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::new(None, format!("Twilio response parsing: {e}")))?;
        Ok(parsed.sid)
    }
}
