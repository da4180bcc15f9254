// Operation error taxonomy for the edit pipeline.
//
// Every failure a client can observe maps to a stable string code plus a
// JSON-RPC numeric code. Gate failures carry structured details (candidate
// lists, safety scores) so callers can recover without re-running a preview
// by hand.

use redline_common::protocol::jsonrpc::{
    self, RpcError, DOCUMENT_NOT_FOUND, HANDLE_NOT_FOUND, INTERNAL_ERROR, INVALID_PARAMS,
    LEDGER_CONTENTION, PERMISSION_DENIED, PIPELINE_GATE_FAILED, TARGET_OUT_OF_RANGE,
};
use redline_common::types::AmbiguityCandidate;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum OpError {
    #[error("invalid locator: {0}")]
    InvalidLocator(String),

    #[error("path escapes the configured document root: {path}")]
    PathEscapesRoot { path: String },

    #[error("unknown document handle: {handle_id}")]
    HandleNotFound { handle_id: Uuid },

    #[error("unknown plan: {plan_id}")]
    PlanNotFound { plan_id: Uuid },

    #[error("plan {plan_id} already reached terminal status {status}")]
    PlanAlreadyApplied { plan_id: Uuid, status: String },

    #[error("plan {plan_id} requires a fresh preview before apply")]
    PreviewRequired { plan_id: Uuid },

    #[error("edit matches {} sites; disambiguate before applying", candidates.len())]
    AmbiguousTarget { candidates: Vec<AmbiguityCandidate> },

    #[error("edit would touch {score:.0}% of the document (threshold {threshold:.0}%)", score = safety_score * 100.0, threshold = threshold * 100.0)]
    UnsafeWildcard { safety_score: f64, threshold: f64 },

    #[error("apply requires explicit confirmation")]
    ConfirmationRequired,

    #[error("another apply with the same idempotency key is in flight")]
    LedgerContention { idempotency_key: String },

    #[error("unsupported edit intent: {0}")]
    UnsupportedIntent(String),

    #[error("paragraph index {index} out of range (document has {count})")]
    TargetOutOfRange { index: usize, count: usize },

    #[error("document not found: {path}")]
    DocumentNotFound { path: String },

    #[error("storage backend failure: {0}")]
    Storage(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl OpError {
    /// Stable machine-readable code, carried in the RPC error `data`.
    pub fn code(&self) -> &'static str {
        match self {
            OpError::InvalidLocator(_) => "INVALID_LOCATOR",
            OpError::PathEscapesRoot { .. } => "PATH_ESCAPES_ROOT",
            OpError::HandleNotFound { .. } => "HANDLE_NOT_FOUND",
            OpError::PlanNotFound { .. } => "PLAN_NOT_FOUND",
            OpError::PlanAlreadyApplied { .. } => "PLAN_ALREADY_APPLIED",
            OpError::PreviewRequired { .. } => "PREVIEW_REQUIRED",
            OpError::AmbiguousTarget { .. } => "AMBIGUOUS_TARGET",
            OpError::UnsafeWildcard { .. } => "UNSAFE_WILDCARD",
            OpError::ConfirmationRequired => "CONFIRMATION_REQUIRED",
            OpError::LedgerContention { .. } => "LEDGER_CONTENTION",
            OpError::UnsupportedIntent(_) => "UNSUPPORTED_INTENT",
            OpError::TargetOutOfRange { .. } => "TARGET_OUT_OF_RANGE",
            OpError::DocumentNotFound { .. } => "DOCUMENT_NOT_FOUND",
            OpError::Storage(_) => "STORAGE_ERROR",
            OpError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// JSON-RPC numeric code for the response envelope.
    pub fn rpc_code(&self) -> i32 {
        match self {
            OpError::InvalidLocator(_) | OpError::UnsupportedIntent(_) => INVALID_PARAMS,
            OpError::PathEscapesRoot { .. } => PERMISSION_DENIED,
            OpError::HandleNotFound { .. } => HANDLE_NOT_FOUND,
            OpError::PlanNotFound { .. }
            | OpError::PlanAlreadyApplied { .. }
            | OpError::PreviewRequired { .. }
            | OpError::AmbiguousTarget { .. }
            | OpError::UnsafeWildcard { .. }
            | OpError::ConfirmationRequired => PIPELINE_GATE_FAILED,
            OpError::LedgerContention { .. } => LEDGER_CONTENTION,
            OpError::TargetOutOfRange { .. } => TARGET_OUT_OF_RANGE,
            OpError::DocumentNotFound { .. } => DOCUMENT_NOT_FOUND,
            OpError::Storage(_) | OpError::Internal(_) => INTERNAL_ERROR,
        }
    }

    /// A contending apply may succeed on retry once the in-flight holder
    /// finishes; everything else needs a changed request.
    pub fn retryable(&self) -> bool {
        matches!(self, OpError::LedgerContention { .. })
    }

    /// Structured payload attached to the RPC error.
    pub fn details(&self) -> serde_json::Value {
        let mut details = json!({ "code": self.code() });
        match self {
            OpError::AmbiguousTarget { candidates } => {
                details["candidates"] = json!(candidates);
            }
            OpError::UnsafeWildcard { safety_score, threshold } => {
                details["safety_score"] = json!(safety_score);
                details["threshold"] = json!(threshold);
            }
            OpError::LedgerContention { idempotency_key } => {
                details["idempotency_key"] = json!(idempotency_key);
                details["retryable"] = json!(true);
            }
            OpError::PlanAlreadyApplied { status, .. } => {
                details["status"] = json!(status);
            }
            _ => {}
        }
        details
    }

    pub fn into_rpc_error(self) -> RpcError {
        RpcError { code: self.rpc_code(), message: self.to_string(), data: Some(self.details()) }
    }
}

impl From<redline_common::path::PathError> for OpError {
    fn from(error: redline_common::path::PathError) -> Self {
        OpError::InvalidLocator(error.to_string())
    }
}

impl From<redline_common::intent::IntentError> for OpError {
    fn from(error: redline_common::intent::IntentError) -> Self {
        OpError::UnsupportedIntent(error.to_string())
    }
}

/// Shorthand kept out of `jsonrpc` so the protocol crate stays free of
/// daemon error semantics.
pub fn method_not_found(method: &str) -> RpcError {
    RpcError {
        code: jsonrpc::METHOD_NOT_FOUND,
        message: format!("method not found: {method}"),
        data: None,
    }
}
