use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::{AdvisorError, GenerativeModel, Part};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini `generateContent` over REST.
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl GeminiClient {
    pub fn new(api_key: &str, model: &str, timeout_secs: u64) -> Self {
        Self::with_base_url(GEMINI_API_BASE, api_key, model, timeout_secs)
    }

    pub fn with_base_url(base_url: &str, api_key: &str, model: &str, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

/// Request body for `models/{model}:generateContent`
#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestPart {
    Text { text: String },
    Inline { inline_data: InlineData },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

/// Response body (only the fields we read)
#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

fn request_body(parts: &[Part]) -> GenerateRequest {
    let parts = parts
        .iter()
        .map(|part| match part {
            Part::Text(text) => RequestPart::Text { text: text.clone() },
            Part::Image { mime_type, data } => RequestPart::Inline {
                inline_data: InlineData {
                    mime_type: mime_type.clone(),
                    data: base64::engine::general_purpose::STANDARD.encode(data),
                },
            },
        })
        .collect();
    GenerateRequest {
        contents: vec![Content { parts }],
    }
}

/// Concatenated text of the first candidate.
fn response_text(body: &str) -> Result<String, AdvisorError> {
    let parsed: GenerateResponse =
        serde_json::from_str(body).map_err(|e| AdvisorError::ResponseParsing(e.to_string()))?;

    let text: String = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(AdvisorError::EmptyResponse);
    }
    Ok(text)
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, parts: &[Part]) -> Result<String, AdvisorError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body(parts))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AdvisorError::Http(format!("Request timed out after {}s", self.timeout_secs))
                } else {
                    AdvisorError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AdvisorError::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(AdvisorError::ProviderStatus {
                status: status.as_u16(),
                body,
            });
        }

        response_text(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_names_the_model() {
        let client = GeminiClient::with_base_url("http://localhost:1/v1beta/", "k", "gemini-1.5-pro", 5);
        assert_eq!(
            client.endpoint(),
            "http://localhost:1/v1beta/models/gemini-1.5-pro:generateContent"
        );
    }

    #[test]
    fn request_encodes_images_inline() {
        let body = request_body(&[
            Part::Text("Extract text".into()),
            Part::Image {
                mime_type: "image/png".into(),
                data: b"abc".to_vec(),
            },
        ]);
        let json = serde_json::to_value(&body).unwrap();
        let parts = &json["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "Extract text");
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(parts[1]["inline_data"]["data"], "YWJj");
    }

    #[test]
    fn response_text_joins_parts() {
        let body = r#"{"candidates": [{"content": {"parts": [{"text": "Take "}, {"text": "Aspirin"}], "role": "model"}}]}"#;
        assert_eq!(response_text(body).unwrap(), "Take Aspirin");
    }

    #[test]
    fn blocked_or_empty_response_is_error() {
        let body = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        assert!(matches!(response_text(body), Err(AdvisorError::EmptyResponse)));
        assert!(matches!(response_text("nope"), Err(AdvisorError::ResponseParsing(_))));
    }
}
