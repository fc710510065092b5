//! HTTP router.
//!
//! Returns a composable `Router`. JSON routes are nested under `/api/`,
//! the generative-model routes sit at the root with a larger body limit
//! for image uploads.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the application router.
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

fn build_router(ctx: ApiContext) -> Router {
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        .route(
            "/profile",
            get(endpoints::profile::get)
                .post(endpoints::profile::upsert)
                .delete(endpoints::profile::delete),
        )
        .route(
            "/reminders",
            get(endpoints::reminders::list).post(endpoints::reminders::create),
        )
        .route(
            "/reminders/phone/:phone_number",
            get(endpoints::reminders::by_phone),
        )
        .route(
            "/reminders/:id",
            get(endpoints::reminders::detail)
                .put(endpoints::reminders::update)
                .delete(endpoints::reminders::delete),
        )
        .route("/reminders/:id/jobs", get(endpoints::reminders::jobs))
        .route(
            "/reminders/:id/deliveries",
            get(endpoints::reminders::deliveries),
        )
        .route("/sos", post(endpoints::sos::trigger))
        .route("/send-sos", post(endpoints::sos::trigger));

    let advisor = Router::new()
        .route("/generate-text", post(endpoints::advisor::generate_text))
        .route(
            "/summarize-reports",
            post(endpoints::advisor::summarize_reports),
        )
        .route("/generate-diet-plan", post(endpoints::advisor::diet_plan))
        .route("/calculate-bmi", post(endpoints::advisor::calculate_bmi))
        .route("/generate-meal-plan", post(endpoints::advisor::meal_plan))
        .layer(DefaultBodyLimit::max(endpoints::advisor::MAX_UPLOAD_BYTES));

    Router::new()
        .nest("/api", api)
        .merge(advisor)
        .with_state(ctx)
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(CorsLayer::permissive())
}
