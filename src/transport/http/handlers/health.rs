use crate::transport::http::types::OkResponse;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

/// Liveness only; the ledger is not contacted.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = OkResponse)
    )
)]
pub async fn healthcheck_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(OkResponse::ok()))
}
