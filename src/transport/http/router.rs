use crate::transport::http::handlers::{health, records};
use crate::transport::http::types::{ErrorResponse, HistoryResponse, OkResponse, RecordDocument};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;
use utoipa::OpenApi;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthcheck_handler,
        records::create_record_handler,
        records::update_record_handler,
        records::read_latest_handler,
        records::read_history_handler,
        records::append_audit_handler
    ),
    components(schemas(OkResponse, ErrorResponse, HistoryResponse, RecordDocument))
)]
pub struct ApiDoc;

pub fn create_router(app_state: crate::transport::http::types::AppState) -> Router {
    Router::new()
        .route("/health", get(health::healthcheck_handler))
        .route("/records", post(records::create_record_handler))
        .route("/records/:patient_id", put(records::update_record_handler))
        .route("/records/:patient_id/latest", get(records::read_latest_handler))
        .route("/records/:patient_id/history", get(records::read_history_handler))
        .route("/records/:patient_id/audit", post(records::append_audit_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(app_state)
}
