use crate::infra::config::ContractTarget;
use crate::infra::fabric::SessionFactory;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<dyn SessionFactory>,
    pub target: ContractTarget,
    /// Cap on raw text returned when a read payload is not JSON.
    pub raw_preview_limit: usize,
}

/// Opaque JSON document. Checked for well-formedness only; the chaincode receives the exact
/// bytes the client sent.
#[derive(Deserialize, Serialize, Debug, ToSchema)]
#[schema(value_type = Object)]
pub struct RecordDocument(pub Box<RawValue>);

impl RecordDocument {
    pub fn as_text(&self) -> &str {
        self.0.get()
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn ok() -> Self {
        OkResponse { ok: true }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    /// Raw (possibly truncated) chaincode output; only present when it was not JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct HistoryResponse {
    #[serde(rename = "patientId")]
    pub patient_id: String,
    #[schema(value_type = Object)]
    pub history: JsonValue,
}

pub fn json_400(err: JsonRejection) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: format!("Invalid JSON body: {}", err.body_text()),
            raw: None,
        }),
    )
}
