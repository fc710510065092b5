//! Shared types for the HTTP layer.

use std::sync::Arc;

use axum::extract::FromRequest;
use serde::Serialize;
use serde_json::Value;

use crate::api::error::ApiError;
use crate::core_state::CoreState;

/// Shared context for all routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }
}

/// `Json` extractor whose rejections use the API error body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Success envelope: `{ success: true, message?, data }`.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data,
        }
    }

    pub fn with_message(data: T, message: &str) -> Self {
        Self {
            success: true,
            message: Some(message.to_string()),
            data,
        }
    }
}

/// Success without a payload: `{ success: true, message }`.
#[derive(Debug, Serialize)]
pub struct Acknowledgement {
    pub success: bool,
    pub message: String,
}

impl Acknowledgement {
    pub fn new(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
        }
    }
}

/// Why a numeric body field was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberIssue {
    Missing,
    Invalid,
}

/// Read a strictly positive number from a JSON number or numeric string.
pub fn positive_number(value: Option<&Value>) -> Result<f64, NumberIssue> {
    let number = match value {
        None | Some(Value::Null) => return Err(NumberIssue::Missing),
        Some(Value::String(s)) if s.trim().is_empty() => return Err(NumberIssue::Missing),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };
    match number {
        Some(n) if n.is_finite() && n > 0.0 => Ok(n),
        _ => Err(NumberIssue::Invalid),
    }
}

/// Read several positive numbers at once. Missing wins over invalid so the
/// client sees the "required" message first.
pub fn positive_numbers<const N: usize>(values: [Option<&Value>; N]) -> Result<[f64; N], NumberIssue> {
    let parsed = values.map(positive_number);
    if parsed.iter().any(|r| *r == Err(NumberIssue::Missing)) {
        return Err(NumberIssue::Missing);
    }
    let mut out = [0.0; N];
    for (slot, result) in out.iter_mut().zip(parsed) {
        *slot = result?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_and_numeric_strings_are_accepted() {
        assert_eq!(positive_number(Some(&json!(70))), Ok(70.0));
        assert_eq!(positive_number(Some(&json!("175.5"))), Ok(175.5));
        assert_eq!(positive_number(Some(&json!(" 34 "))), Ok(34.0));
    }

    #[test]
    fn missing_and_invalid_are_distinguished() {
        assert_eq!(positive_number(None), Err(NumberIssue::Missing));
        assert_eq!(positive_number(Some(&Value::Null)), Err(NumberIssue::Missing));
        assert_eq!(positive_number(Some(&json!(""))), Err(NumberIssue::Missing));
        assert_eq!(positive_number(Some(&json!("abc"))), Err(NumberIssue::Invalid));
        assert_eq!(positive_number(Some(&json!(0))), Err(NumberIssue::Invalid));
        assert_eq!(positive_number(Some(&json!(-5))), Err(NumberIssue::Invalid));
        assert_eq!(positive_number(Some(&json!(true))), Err(NumberIssue::Invalid));
    }

    #[test]
    fn missing_takes_precedence() {
        let weight = json!("abc");
        assert_eq!(
            positive_numbers([Some(&weight), None, Some(&json!(30))]),
            Err(NumberIssue::Missing)
        );
        let ok = positive_numbers([Some(&json!(70)), Some(&json!("175")), Some(&json!(30))]);
        assert_eq!(ok, Ok([70.0, 175.0, 30.0]));
    }

    #[test]
    fn envelope_shapes() {
        let json = serde_json::to_value(Envelope::with_message(json!({"a": 1}), "done")).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "done");
        assert_eq!(json["data"]["a"], 1);

        let json = serde_json::to_value(Envelope::data(Value::Null)).unwrap();
        assert!(json.get("message").is_none());
        assert!(json["data"].is_null());
    }
}
