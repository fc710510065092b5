//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::types::ApiContext;
use crate::core_state::ProviderStatus;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub providers: ProviderStatus,
    pub pending_reminder_jobs: usize,
}

/// `GET /api/health`: liveness plus which providers are configured.
pub async fn check(State(ctx): State<ApiContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: crate::config::APP_VERSION,
        providers: ctx.core.provider_status(),
        pending_reminder_jobs: ctx.core.reminders.scheduler().total_pending(),
    })
}
