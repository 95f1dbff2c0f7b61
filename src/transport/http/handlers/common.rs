//! Session lifecycle shared by every ledger-backed handler.

use crate::domain::decode::{decode_payload, truncate_raw, DecodedResponse};
use crate::domain::error::{classify, GatewayError};
use crate::infra::fabric::{CallKind, TransactionRequest, TransactionResult};
use crate::transport::http::types::{AppState, ErrorResponse, OkResponse};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value as JsonValue;

/// Opens a session, issues one transaction, shapes the HTTP response, then closes the session.
///
/// The session is closed after `respond` has built the response, on success and on failure.
/// If the future is dropped mid-call the session's `Drop` closes it instead.
pub async fn run_transaction<F>(
    state: &AppState,
    kind: CallKind,
    tx: TransactionRequest,
    respond: F,
) -> Response
where
    F: FnOnce(TransactionResult) -> Response + Send,
{
    let session = match state.sessions.open().await {
        Ok(session) => session,
        Err(e) => return failure_response(&tx.operation, &e, state.raw_preview_limit),
    };
    tracing::debug!(operation = %tx.operation, ?kind, "invoking chaincode");

    let response = {
        let contract = session
            .network(&state.target.channel)
            .contract(&state.target.chaincode);
        match contract.invoke(kind, &tx).await {
            Ok(result) => respond(result),
            Err(e) => failure_response(&tx.operation, &e, state.raw_preview_limit),
        }
    };

    session.close();
    response
}

/// Maps a failure to its HTTP shape: decode failures are 500 with the raw text, the rest 400.
pub fn failure_response(operation: &str, err: &GatewayError, raw_preview_limit: usize) -> Response {
    let classified = classify(err);
    tracing::error!(
        operation,
        origin = ?classified.origin,
        error = %classified.summary,
        "ledger request failed"
    );

    match err {
        GatewayError::Decode { raw, .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: classified.summary,
                raw: Some(truncate_raw(raw, raw_preview_limit)),
            }),
        )
            .into_response(),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: classified.summary,
                raw: None,
            }),
        )
            .into_response(),
    }
}

pub fn acknowledged(_: TransactionResult) -> Response {
    (StatusCode::OK, Json(OkResponse::ok())).into_response()
}

/// Decodes an evaluate payload and hands the JSON to `shape`; non-JSON becomes a 500.
pub fn decoded_response<F>(
    operation: &str,
    result: TransactionResult,
    raw_preview_limit: usize,
    shape: F,
) -> Response
where
    F: FnOnce(JsonValue) -> Response,
{
    let payload = match result {
        TransactionResult::Payload(bytes) => bytes,
        TransactionResult::Acknowledged => Vec::new(),
    };
    match decode_payload(&payload) {
        DecodedResponse::Structured(value) => shape(value),
        DecodedResponse::Unstructured { raw, parse_error } => failure_response(
            operation,
            &GatewayError::Decode { parse_error, raw },
            raw_preview_limit,
        ),
    }
}
