//! `POST /api/sos` (and the legacy `POST /api/send-sos`).
//!
//! Answers once the emergency messages are out. The hospital follow-up
//! keeps running in the background after the response is sent.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ApiJson};
use crate::geo::Coordinates;
use crate::sos::{ImmediateResult, SosError};

#[derive(Debug, Deserialize)]
pub struct SosRequest {
    pub latitude: Option<Value>,
    pub longitude: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct SosResponse {
    pub success: bool,
    pub message: &'static str,
    #[serde(flatten)]
    pub immediate: ImmediateResult,
}

fn coordinate(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl SosRequest {
    fn coordinates(&self) -> Result<Coordinates, SosError> {
        match (coordinate(self.latitude.as_ref()), coordinate(self.longitude.as_ref())) {
            (Some(lat), Some(lon)) => Ok(Coordinates::new(lat, lon)),
            _ => Err(SosError::InvalidCoordinates),
        }
    }
}

pub async fn trigger(
    State(ctx): State<ApiContext>,
    ApiJson(request): ApiJson<SosRequest>,
) -> Result<Json<SosResponse>, ApiError> {
    let at = request.coordinates()?;
    let outcome = ctx.core.sos.trigger(at).await?;
    // Dropping the handle detaches phase 2 from the request.
    drop(outcome.follow_up);

    Ok(Json(SosResponse {
        success: true,
        message: "SOS alert sent successfully. Hospital information will be sent shortly.",
        immediate: outcome.immediate,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coordinates_accept_numbers_and_strings() {
        let req = SosRequest {
            latitude: Some(json!(28.6139)),
            longitude: Some(json!("77.2090")),
        };
        let at = req.coordinates().unwrap();
        assert_eq!(at.latitude, 28.6139);
        assert_eq!(at.longitude, 77.209);
    }

    #[test]
    fn missing_coordinate_is_rejected() {
        let req = SosRequest {
            latitude: Some(json!(28.6)),
            longitude: None,
        };
        assert!(matches!(req.coordinates(), Err(SosError::InvalidCoordinates)));

        let req = SosRequest {
            latitude: Some(json!([1])),
            longitude: Some(json!(2)),
        };
        assert!(matches!(req.coordinates(), Err(SosError::InvalidCoordinates)));
    }
}
