//! Gateway error taxonomy and the classifier that turns any failure into a one-line message.
//!
//! Every handler funnels its failure through [`classify`], so create/update/read/audit paths
//! report config, transport and ledger problems in the same shape.

use std::fmt;
use thiserror::Error;

/// Separator placed between the extracted failure fields.
pub const FIELD_DELIMITER: &str = " | ";

/// Returned when a failure exposes no fields and formats to an empty string.
const UNKNOWN_FAILURE: &str = "unknown error";

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Missing/invalid setting or credential file. Never retried.
    #[error("{0}")]
    Config(String),

    /// TLS / transport / session establishment failure.
    #[error("{message}")]
    Connection {
        message: String,
        detail: Option<String>,
    },

    /// Submit/evaluate rejected by the network or the chaincode.
    #[error("{message}")]
    Ledger {
        message: String,
        details: Vec<String>,
        cause: Option<String>,
    },

    /// Evaluate succeeded but the payload is not JSON text.
    #[error("chaincode returned non-JSON output: {parse_error}")]
    Decode { parse_error: String, raw: String },
}

impl GatewayError {
    pub fn config(message: impl Into<String>) -> Self {
        GatewayError::Config(message.into())
    }

    pub fn connection(message: impl Into<String>, detail: Option<String>) -> Self {
        GatewayError::Connection {
            message: message.into(),
            detail,
        }
    }

    pub fn ledger(message: impl Into<String>) -> Self {
        GatewayError::Ledger {
            message: message.into(),
            details: Vec::new(),
            cause: None,
        }
    }

    pub fn origin(&self) -> FailureOrigin {
        match self {
            GatewayError::Config(_) => FailureOrigin::Local,
            GatewayError::Connection { .. }
            | GatewayError::Ledger { .. }
            | GatewayError::Decode { .. } => FailureOrigin::Remote,
        }
    }
}

/// Where a failure came from: this process (config, credentials) or the network side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOrigin {
    Local,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    pub summary: String,
    pub origin: FailureOrigin,
}

impl ClassifiedError {
    pub fn is_local(&self) -> bool {
        self.origin == FailureOrigin::Local
    }

    pub fn is_remote(&self) -> bool {
        self.origin == FailureOrigin::Remote
    }
}

/// The fields the classifier knows how to read from a failure.
///
/// Implementors expose whichever of the three they carry; the rest default to `None`.
pub trait FailureReport: fmt::Debug {
    fn primary_message(&self) -> Option<String> {
        None
    }

    fn transport_detail(&self) -> Option<String> {
        None
    }

    fn cause_message(&self) -> Option<String> {
        None
    }
}

impl FailureReport for GatewayError {
    fn primary_message(&self) -> Option<String> {
        Some(self.to_string())
    }

    fn transport_detail(&self) -> Option<String> {
        match self {
            GatewayError::Connection { detail, .. } => detail.clone(),
            GatewayError::Ledger { details, .. } if !details.is_empty() => {
                Some(details.join(", "))
            }
            _ => None,
        }
    }

    fn cause_message(&self) -> Option<String> {
        match self {
            GatewayError::Ledger { cause, .. } => cause.clone(),
            _ => None,
        }
    }
}

impl FailureReport for tonic::Status {
    fn primary_message(&self) -> Option<String> {
        Some(self.message().to_string())
    }

    fn transport_detail(&self) -> Option<String> {
        Some(format!("code: {:?}", self.code()))
    }
}

/// Adapter for any `std::error::Error`: its display is the message, its source the cause.
#[derive(Debug)]
pub struct ErrorChain<'a>(pub &'a (dyn std::error::Error + 'static));

impl FailureReport for ErrorChain<'_> {
    fn primary_message(&self) -> Option<String> {
        Some(self.0.to_string())
    }

    fn cause_message(&self) -> Option<String> {
        self.0.source().map(|source| source.to_string())
    }
}

/// Joins primary message, transport detail and cause (in that order) with ` | `.
///
/// Blank fields are skipped. Falls back to the debug form, then to a fixed string, so the
/// result is never empty.
pub fn describe_failure<F: FailureReport + ?Sized>(failure: &F) -> String {
    let parts: Vec<String> = [
        failure.primary_message(),
        failure.transport_detail(),
        failure.cause_message().map(|cause| format!("cause: {}", cause)),
    ]
    .into_iter()
    .flatten()
    .filter(|part| !part.trim().is_empty())
    .collect();

    if !parts.is_empty() {
        return parts.join(FIELD_DELIMITER);
    }

    let fallback = format!("{:?}", failure);
    if fallback.trim().is_empty() {
        UNKNOWN_FAILURE.to_string()
    } else {
        fallback
    }
}

pub fn classify(err: &GatewayError) -> ClassifiedError {
    ClassifiedError {
        summary: describe_failure(err),
        origin: err.origin(),
    }
}
