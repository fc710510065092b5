//! Notification Gateway: phone normalization and SMS dispatch.
//!
//! The gateway owns an optional `SmsProvider`. With no provider configured
//! every send short-circuits to a simulated success without network I/O.

pub mod twilio;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::RuntimeEnv;

pub use twilio::TwilioProvider;

/// Provider code for "recipient not verified" (trial accounts).
pub const RECIPIENT_NOT_VERIFIED: u32 = 21608;

/// Provider code for "sender and recipient country mismatch".
pub const COUNTRY_MISMATCH: u32 = 21659;

/// Error returned by an SMS provider.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ProviderError {
    /// Provider-specific numeric error code, when the provider returned one.
    pub code: Option<u32>,
    pub message: String,
    pub more_info: Option<String>,
}

impl ProviderError {
    pub fn new(code: Option<u32>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            more_info: None,
        }
    }
}

/// An SMS transport. Implementations receive an already normalized number.
#[async_trait]
pub trait SmsProvider: Send + Sync {
    /// Send `body` to `to`; returns the provider's message id.
    async fn send_message(&self, to: &str, body: &str) -> Result<String, ProviderError>;
}

/// Outcome of one send, as reported to callers and clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    pub simulated: bool,
    /// Set when the send was intentionally not attempted (no recipient).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NotificationResult {
    pub fn delivered(provider_id: String) -> Self {
        Self {
            success: true,
            provider_id: Some(provider_id),
            simulated: false,
            skipped: false,
            error: None,
        }
    }

    pub fn simulated() -> Self {
        Self {
            success: true,
            provider_id: None,
            simulated: true,
            skipped: false,
            error: None,
        }
    }

    pub fn skipped() -> Self {
        Self {
            success: true,
            provider_id: None,
            simulated: false,
            skipped: true,
            error: None,
        }
    }

    pub fn failed(error: String) -> Self {
        Self {
            success: false,
            provider_id: None,
            simulated: false,
            skipped: false,
            error: Some(error),
        }
    }
}

/// Normalize a phone number to international form.
///
/// Strips non-digits; ten digits get `+<country_code>`; longer numbers get
/// a leading `+`. Anything shorter is returned exactly as given.
pub fn normalize_phone(raw: &str, country_code: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

    if digits.len() == 10 {
        format!("+{country_code}{digits}")
    } else if digits.len() > 10 {
        // Twelve digits starting with the default code and any other
        // international number end up in the same shape.
        format!("+{digits}")
    } else {
        raw.to_string()
    }
}

pub struct NotificationGateway {
    provider: Option<Arc<dyn SmsProvider>>,
    country_code: String,
    env: RuntimeEnv,
}

impl NotificationGateway {
    pub fn new(provider: Option<Arc<dyn SmsProvider>>, country_code: &str, env: RuntimeEnv) -> Self {
        Self {
            provider,
            country_code: country_code.to_string(),
            env,
        }
    }

    /// Gateway with no provider: every send is simulated.
    pub fn unconfigured(country_code: &str) -> Self {
        Self::new(None, country_code, RuntimeEnv::Development)
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    pub fn normalize(&self, raw: &str) -> String {
        normalize_phone(raw, &self.country_code)
    }

    /// Send `body` to `raw_phone`. Never fails: the outcome is in the result.
    pub async fn send(&self, raw_phone: &str, body: &str) -> NotificationResult {
        let to = self.normalize(raw_phone);

        let Some(provider) = &self.provider else {
            tracing::info!(%to, chars = body.len(), "SMS provider not configured, simulating send");
            return NotificationResult::simulated();
        };

        match provider.send_message(&to, body).await {
            Ok(provider_id) => {
                tracing::info!(%to, %provider_id, "SMS sent");
                NotificationResult::delivered(provider_id)
            }
            Err(e) if e.code == Some(RECIPIENT_NOT_VERIFIED) && !self.env.is_production() => {
                tracing::warn!(
                    %to,
                    code = RECIPIENT_NOT_VERIFIED,
                    "Recipient not verified with SMS provider; treating as simulated delivery"
                );
                NotificationResult::simulated()
            }
            Err(e) => {
                if e.code == Some(COUNTRY_MISMATCH) {
                    tracing::warn!(
                        %to,
                        "Sender number country does not match recipient; use a sender from the recipient's country"
                    );
                }
                tracing::error!(
                    %to,
                    code = ?e.code,
                    more_info = e.more_info.as_deref().unwrap_or("none"),
                    error = %e.message,
                    "SMS send failed"
                );
                NotificationResult::failed(e.to_string())
            }
        }
    }
}

/// Recorded message from `MockSmsProvider`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub to: String,
    pub body: String,
}

/// Mock SMS provider for testing: records messages, optionally fails.
pub struct MockSmsProvider {
    sent: Mutex<Vec<SentMessage>>,
    failure: Option<ProviderError>,
}

impl MockSmsProvider {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failure: None,
        }
    }

    /// Every send fails with `error` (nothing is recorded).
    pub fn failing(error: ProviderError) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failure: Some(error),
        }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Default for MockSmsProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SmsProvider for MockSmsProvider {
    async fn send_message(&self, to: &str, body: &str) -> Result<String, ProviderError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| ProviderError::new(None, "mock provider lock poisoned"))?;
        sent.push(SentMessage {
            to: to.to_string(),
            body: body.to_string(),
        });
        Ok(format!("SM{:032}", sent.len()))
    }
}
