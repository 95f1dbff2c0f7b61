use crate::infra::fabric::{CallKind, TransactionRequest};
use crate::transport::http::handlers::common::{acknowledged, decoded_response, run_transaction};
use crate::transport::http::types::{
    json_400, AppState, ErrorResponse, HistoryResponse, OkResponse, RecordDocument,
};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

pub const OP_CREATE_RECORD: &str = "createRecord";
pub const OP_UPDATE_RECORD: &str = "updateRecord";
pub const OP_GET_LATEST_RECORD: &str = "getLatestRecord";
pub const OP_GET_HISTORY: &str = "getHistory";
pub const OP_APPEND_AUDIT_LOG: &str = "appendAuditLog";

#[utoipa::path(
    post,
    path = "/records",
    request_body = RecordDocument,
    responses(
        (status = 200, description = "Record committed to the ledger", body = OkResponse),
        (status = 400, description = "Configuration, connection or ledger failure", body = ErrorResponse)
    )
)]
#[tracing::instrument(name = "create_record", skip_all)]
pub async fn create_record_handler(
    State(state): State<AppState>,
    body: Result<Json<RecordDocument>, JsonRejection>,
) -> Response {
    let Json(document) = match body {
        Ok(b) => b,
        Err(e) => return json_400(e).into_response(),
    };

    let tx = TransactionRequest::new(OP_CREATE_RECORD).arg(document.as_text());
    run_transaction(&state, CallKind::Submit, tx, acknowledged).await
}

#[utoipa::path(
    put,
    path = "/records/{patient_id}",
    params(("patient_id" = String, Path, description = "Patient identifier")),
    request_body = RecordDocument,
    responses(
        (status = 200, description = "Record update committed to the ledger", body = OkResponse),
        (status = 400, description = "Configuration, connection or ledger failure", body = ErrorResponse)
    )
)]
#[tracing::instrument(name = "update_record", skip_all, fields(patient_id = %patient_id))]
pub async fn update_record_handler(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
    body: Result<Json<RecordDocument>, JsonRejection>,
) -> Response {
    let Json(document) = match body {
        Ok(b) => b,
        Err(e) => return json_400(e).into_response(),
    };

    // The chaincode reads the patient id from the document itself.
    let tx = TransactionRequest::new(OP_UPDATE_RECORD).arg(document.as_text());
    run_transaction(&state, CallKind::Submit, tx, acknowledged).await
}

#[utoipa::path(
    get,
    path = "/records/{patient_id}/latest",
    params(("patient_id" = String, Path, description = "Patient identifier")),
    responses(
        (status = 200, description = "Latest record as stored on the ledger", body = RecordDocument),
        (status = 400, description = "Configuration, connection or ledger failure", body = ErrorResponse),
        (status = 500, description = "Chaincode returned non-JSON output", body = ErrorResponse)
    )
)]
#[tracing::instrument(name = "read_latest_record", skip_all, fields(patient_id = %patient_id))]
pub async fn read_latest_handler(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> Response {
    let tx = TransactionRequest::new(OP_GET_LATEST_RECORD).arg(patient_id);
    let limit = state.raw_preview_limit;
    run_transaction(&state, CallKind::Evaluate, tx, move |result| {
        decoded_response(OP_GET_LATEST_RECORD, result, limit, |record| {
            (StatusCode::OK, Json(record)).into_response()
        })
    })
    .await
}

#[utoipa::path(
    get,
    path = "/records/{patient_id}/history",
    params(("patient_id" = String, Path, description = "Patient identifier")),
    responses(
        (status = 200, description = "Every version of the record, oldest first", body = HistoryResponse),
        (status = 400, description = "Configuration, connection or ledger failure", body = ErrorResponse),
        (status = 500, description = "Chaincode returned non-JSON output", body = ErrorResponse)
    )
)]
#[tracing::instrument(name = "read_record_history", skip_all, fields(patient_id = %patient_id))]
pub async fn read_history_handler(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> Response {
    let tx = TransactionRequest::new(OP_GET_HISTORY).arg(patient_id.as_str());
    let limit = state.raw_preview_limit;
    run_transaction(&state, CallKind::Evaluate, tx, move |result| {
        decoded_response(OP_GET_HISTORY, result, limit, |history| {
            (StatusCode::OK, Json(HistoryResponse { patient_id, history })).into_response()
        })
    })
    .await
}

#[utoipa::path(
    post,
    path = "/records/{patient_id}/audit",
    params(("patient_id" = String, Path, description = "Patient identifier")),
    request_body = RecordDocument,
    responses(
        (status = 200, description = "Audit entry committed to the ledger", body = OkResponse),
        (status = 400, description = "Configuration, connection or ledger failure", body = ErrorResponse)
    )
)]
#[tracing::instrument(name = "append_audit_entry", skip_all, fields(patient_id = %patient_id))]
pub async fn append_audit_handler(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
    body: Result<Json<RecordDocument>, JsonRejection>,
) -> Response {
    let Json(entry) = match body {
        Ok(b) => b,
        Err(e) => return json_400(e).into_response(),
    };

    let tx = TransactionRequest::new(OP_APPEND_AUDIT_LOG)
        .arg(patient_id)
        .arg(entry.as_text());
    run_transaction(&state, CallKind::Submit, tx, acknowledged).await
}
