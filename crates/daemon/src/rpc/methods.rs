// JSON-RPC method dispatch.
//
// Each method parses its params into a typed struct, calls into the
// pipeline, and serializes the result. Pipeline errors map to structured
// RPC errors through `OpError::into_rpc_error`.

use std::sync::Arc;

use redline_common::intent::EditIntent;
use redline_common::protocol::jsonrpc::{
    is_supported_protocol_version, Request, RequestId, Response, RpcError, INTERNAL_ERROR,
    INVALID_PARAMS, INVALID_REQUEST, PARSE_ERROR,
};
use redline_common::protocol::methods::{
    APPLY_EDIT, CLOSE_DOCUMENT_HANDLE, DAEMON_SHUTDOWN, GET_DOCUMENT_METADATA,
    GET_DOCUMENT_PARAGRAPHS, GET_DOCUMENT_TABLES, LIST_OPEN_DOCUMENTS, OPEN_DOCUMENT_HANDLE,
    PLAN_EDIT, PREVIEW_EDIT, RPC_PING, SESSION_POLICY,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::errors::{method_not_found, OpError};
use crate::locator::Locator;
use crate::pipeline::{ApplyOptions, EditPipeline};

#[derive(Clone)]
pub struct RpcServerState {
    pipeline: Arc<EditPipeline>,
    shutdown_notifier: Option<broadcast::Sender<()>>,
}

impl RpcServerState {
    pub fn new(pipeline: Arc<EditPipeline>) -> Self {
        Self { pipeline, shutdown_notifier: None }
    }

    pub fn with_shutdown_notifier(mut self, notifier: broadcast::Sender<()>) -> Self {
        self.shutdown_notifier = Some(notifier);
        self
    }

    pub fn pipeline(&self) -> &Arc<EditPipeline> {
        &self.pipeline
    }
}

// ── Param / result shapes ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct OpenDocumentParams {
    locator: Locator,
}

#[derive(Debug, Deserialize)]
struct CloseDocumentParams {
    handle_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct PlanEditParams {
    locator: Locator,
    /// Kept as raw JSON so an unrecognized intent kind surfaces as a
    /// structured UNSUPPORTED_INTENT error instead of a bare params failure.
    intent: Value,
}

#[derive(Debug, Deserialize)]
struct PreviewEditParams {
    plan_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct ApplyEditParams {
    plan_id: Uuid,
    #[serde(default)]
    confirm: bool,
    #[serde(default)]
    idempotency_key: Option<String>,
    #[serde(default)]
    override_unsafe: bool,
}

#[derive(Debug, Deserialize)]
struct HandleViewParams {
    handle_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct ParagraphsParams {
    handle_id: Uuid,
    #[serde(default)]
    offset: usize,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ListHandlesResult {
    handles: Vec<redline_common::types::HandleInfo>,
    total: usize,
    session_policy: &'static str,
}

// ── Dispatch ────────────────────────────────────────────────────────

/// Decode a raw request line and dispatch it. Malformed input yields a
/// JSON-RPC parse or invalid-request error instead of dropping the line.
pub async fn handle_raw_request(raw: &[u8], state: &RpcServerState) -> Response {
    let request: Request = match serde_json::from_slice(raw) {
        Ok(request) => request,
        Err(error) => {
            let code = if serde_json::from_slice::<Value>(raw).is_ok() {
                INVALID_REQUEST
            } else {
                PARSE_ERROR
            };
            return Response::error(
                RequestId::Null,
                RpcError { code, message: format!("invalid json-rpc request: {error}"), data: None },
            );
        }
    };
    dispatch_request(request, state).await
}

pub async fn dispatch_request(request: Request, state: &RpcServerState) -> Response {
    let Request { method, params, id, protocol_version, .. } = request;

    if let Some(version) = &protocol_version {
        if !is_supported_protocol_version(version) {
            return Response::error(
                id,
                RpcError {
                    code: INVALID_REQUEST,
                    message: format!("unsupported protocol version `{version}`"),
                    data: None,
                },
            );
        }
    }

    debug!(%method, "dispatching rpc request");
    let result = dispatch_method(&method, params, state).await;
    match result {
        Ok(value) => Response::success(id, value),
        Err(error) => Response::error(id, error),
    }
}

async fn dispatch_method(
    method: &str,
    params: Option<Value>,
    state: &RpcServerState,
) -> Result<Value, RpcError> {
    match method {
        RPC_PING => Ok(json!({ "ok": true })),
        DAEMON_SHUTDOWN => {
            if let Some(notifier) = &state.shutdown_notifier {
                let _ = notifier.send(());
            }
            Ok(json!({ "ok": true }))
        }
        OPEN_DOCUMENT_HANDLE => {
            let params: OpenDocumentParams = parse_params(params)?;
            let info = state.pipeline.open_handle(&params.locator).await.map_err(op_error)?;
            to_value(&info)
        }
        LIST_OPEN_DOCUMENTS => {
            let handles = state.pipeline.list_handles();
            let total = handles.len();
            to_value(&ListHandlesResult { handles, total, session_policy: SESSION_POLICY })
        }
        CLOSE_DOCUMENT_HANDLE => {
            let params: CloseDocumentParams = parse_params(params)?;
            state.pipeline.close_handle(params.handle_id).map_err(op_error)?;
            Ok(json!({ "closed": true }))
        }
        PLAN_EDIT => {
            let params: PlanEditParams = parse_params(params)?;
            let intent: EditIntent = serde_json::from_value(params.intent)
                .map_err(|error| op_error(OpError::UnsupportedIntent(error.to_string())))?;
            let summary =
                state.pipeline.plan_edit(&params.locator, intent).await.map_err(op_error)?;
            Ok(json!({ "plan_id": summary.plan_id, "summary": summary }))
        }
        PREVIEW_EDIT => {
            let params: PreviewEditParams = parse_params(params)?;
            let report = state.pipeline.preview_edit(params.plan_id).await.map_err(op_error)?;
            to_value(&report)
        }
        APPLY_EDIT => {
            let params: ApplyEditParams = parse_params(params)?;
            let options = ApplyOptions {
                confirm: params.confirm,
                idempotency_key: params.idempotency_key,
                override_unsafe: params.override_unsafe,
            };
            let outcome =
                state.pipeline.apply_edit(params.plan_id, options).await.map_err(op_error)?;
            to_value(&outcome)
        }
        GET_DOCUMENT_METADATA => {
            let params: HandleViewParams = parse_params(params)?;
            let metadata =
                state.pipeline.document_metadata(params.handle_id).await.map_err(op_error)?;
            to_value(&metadata)
        }
        GET_DOCUMENT_PARAGRAPHS => {
            let params: ParagraphsParams = parse_params(params)?;
            let page = state
                .pipeline
                .document_paragraphs(params.handle_id, params.offset, params.limit)
                .await
                .map_err(op_error)?;
            to_value(&page)
        }
        GET_DOCUMENT_TABLES => {
            let params: HandleViewParams = parse_params(params)?;
            let tables =
                state.pipeline.document_tables(params.handle_id).await.map_err(op_error)?;
            Ok(json!({ "tables": tables }))
        }
        unknown => Err(method_not_found(unknown)),
    }
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, RpcError> {
    let params = params.unwrap_or(Value::Null);
    serde_json::from_value(params).map_err(|error| RpcError {
        code: INVALID_PARAMS,
        message: format!("invalid params: {error}"),
        data: None,
    })
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|error| RpcError {
        code: INTERNAL_ERROR,
        message: format!("failed to serialize response: {error}"),
        data: None,
    })
}

fn op_error(error: crate::errors::OpError) -> RpcError {
    error.into_rpc_error()
}

#[cfg(test)]
mod tests {
    use redline_common::protocol::jsonrpc::{METHOD_NOT_FOUND, PIPELINE_GATE_FAILED};
    use tempfile::TempDir;

    use super::*;
    use crate::config::DaemonConfig;
    use crate::storage::audit::AuditDb;
    use crate::storage::{DocumentStorage, LocalStorage};

    fn test_state(dir: &TempDir) -> RpcServerState {
        let mut config = DaemonConfig::default();
        config.documents.root = Some(dir.path().to_path_buf());
        config.documents.autobackup = false;
        let storage =
            Arc::new(LocalStorage::new(dir.path(), false).expect("storage should initialize"));
        let audit = AuditDb::open_in_memory().expect("audit db should open");
        let pipeline = EditPipeline::new(config, storage as Arc<dyn DocumentStorage>, audit)
            .expect("pipeline should initialize");
        RpcServerState::new(Arc::new(pipeline))
    }

    async fn call(state: &RpcServerState, method: &str, params: Value) -> Response {
        let request = Request::new(method, Some(params), RequestId::Number(1));
        dispatch_request(request, state).await
    }

    fn result(response: Response) -> Value {
        assert!(response.error.is_none(), "expected success: {response:?}");
        response.result.expect("success response should carry a result")
    }

    #[tokio::test]
    async fn ping_responds_ok() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        let response = call(&state, RPC_PING, json!({})).await;
        assert_eq!(result(response), json!({ "ok": true }));
    }

    #[tokio::test]
    async fn unknown_method_yields_method_not_found() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        let response = call(&state, "merge_documents", json!({})).await;
        assert_eq!(response.error.expect("error should be present").code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_json_yields_parse_error() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        let response = handle_raw_request(b"{nonsense", &state).await;
        assert_eq!(response.error.expect("error should be present").code, PARSE_ERROR);
        assert_eq!(response.id, RequestId::Null);
    }

    #[tokio::test]
    async fn unsupported_protocol_version_is_rejected() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        let mut request = Request::new(RPC_PING, None, RequestId::Number(1));
        request.protocol_version = Some("redline-rpc.v99".to_string());
        let response = dispatch_request(request, &state).await;
        assert_eq!(response.error.expect("error should be present").code, INVALID_REQUEST);
    }

    #[tokio::test]
    async fn list_open_documents_reports_session_policy() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        std::fs::write(dir.path().join("memo.txt"), "hello\n").unwrap();

        let empty = result(call(&state, LIST_OPEN_DOCUMENTS, json!({})).await);
        assert_eq!(empty["session_policy"], "dedup_by_canonical_path");
        assert_eq!(empty["total"], 0);

        result(
            call(&state, OPEN_DOCUMENT_HANDLE, json!({ "locator": { "path": "memo.txt" } })).await,
        );
        let listed = result(call(&state, LIST_OPEN_DOCUMENTS, json!({})).await);
        assert_eq!(listed["session_policy"], "dedup_by_canonical_path");
        assert_eq!(listed["total"], 1);
    }

    #[tokio::test]
    async fn unknown_intent_kind_yields_unsupported_intent() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        std::fs::write(dir.path().join("memo.txt"), "hello\n").unwrap();

        let response = call(
            &state,
            PLAN_EDIT,
            json!({
                "locator": { "path": "memo.txt" },
                "intent": { "kind": "merge_cells", "rows": [0, 1] },
            }),
        )
        .await;
        let error = response.error.expect("error should be present");
        assert_eq!(error.code, INVALID_PARAMS);
        let data = error.data.expect("error data should be present");
        assert_eq!(data["code"], "UNSUPPORTED_INTENT");
    }

    #[tokio::test]
    async fn full_pipeline_over_rpc() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        std::fs::write(dir.path().join("memo.txt"), "The 2025 budget.\n").unwrap();

        let opened = result(
            call(&state, OPEN_DOCUMENT_HANDLE, json!({ "locator": { "path": "memo.txt" } })).await,
        );
        let handle_id = opened["handle_id"].as_str().expect("handle_id should be a string");

        let planned = result(
            call(
                &state,
                PLAN_EDIT,
                json!({
                    "locator": { "handle_id": handle_id },
                    "intent": { "kind": "replace_text", "find": "2025", "replace": "2026" },
                }),
            )
            .await,
        );
        let plan_id = planned["plan_id"].as_str().expect("plan_id should be a string").to_string();

        let previewed =
            result(call(&state, PREVIEW_EDIT, json!({ "plan_id": plan_id })).await);
        assert_eq!(previewed["ambiguous"], json!(false));
        assert_eq!(previewed["fragments"].as_array().map(Vec::len), Some(1));

        let applied = result(
            call(&state, APPLY_EDIT, json!({ "plan_id": plan_id, "confirm": true })).await,
        );
        assert_eq!(applied["status"], json!("APPLIED"));

        let content = std::fs::read_to_string(dir.path().join("memo.txt")).unwrap();
        assert_eq!(content, "The 2026 budget.\n");
    }

    #[tokio::test]
    async fn gate_failures_carry_structured_data() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        std::fs::write(dir.path().join("memo.txt"), "x 2025\n\ny 2025\n").unwrap();

        let planned = result(
            call(
                &state,
                PLAN_EDIT,
                json!({
                    "locator": { "path": "memo.txt" },
                    "intent": { "kind": "replace_text", "find": "2025", "replace": "2026" },
                }),
            )
            .await,
        );
        let plan_id = planned["plan_id"].clone();

        result(call(&state, PREVIEW_EDIT, json!({ "plan_id": plan_id })).await);
        let response =
            call(&state, APPLY_EDIT, json!({ "plan_id": plan_id, "confirm": true })).await;
        let error = response.error.expect("apply should fail");
        assert_eq!(error.code, PIPELINE_GATE_FAILED);
        let data = error.data.expect("error data should be present");
        assert_eq!(data["code"], json!("AMBIGUOUS_TARGET"));
        assert_eq!(data["candidates"].as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn list_and_close_handles() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        std::fs::write(dir.path().join("a.txt"), "a\n").unwrap();

        let opened = result(
            call(&state, OPEN_DOCUMENT_HANDLE, json!({ "locator": { "path": "a.txt" } })).await,
        );
        let handle_id = opened["handle_id"].clone();

        let listed = result(call(&state, LIST_OPEN_DOCUMENTS, json!({})).await);
        assert_eq!(listed["total"], json!(1));

        let closed =
            result(call(&state, CLOSE_DOCUMENT_HANDLE, json!({ "handle_id": handle_id })).await);
        assert_eq!(closed, json!({ "closed": true }));

        let response =
            call(&state, GET_DOCUMENT_METADATA, json!({ "handle_id": handle_id })).await;
        let error = response.error.expect("metadata on closed handle should fail");
        assert_eq!(error.data.expect("data should be present")["code"], json!("HANDLE_NOT_FOUND"));
    }

    #[tokio::test]
    async fn invalid_params_are_rejected() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        let response = call(&state, PREVIEW_EDIT, json!({ "plan": "not-a-field" })).await;
        assert_eq!(response.error.expect("error should be present").code, INVALID_PARAMS);
    }
}
