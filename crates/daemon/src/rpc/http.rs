// JSON-RPC over HTTP: `POST /rpc`, one request per call.
//
// The body goes through the same raw-request handler as the socket
// transport, so malformed payloads get a JSON-RPC error envelope instead
// of a framework 4xx.

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::rpc::methods::{handle_raw_request, RpcServerState};

pub fn router(state: RpcServerState) -> Router {
    Router::new()
        .route("/rpc", post(rpc_endpoint))
        .route("/healthz", get(healthz))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve_http(
    listener: TcpListener,
    state: RpcServerState,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    let local_addr = listener.local_addr().context("failed to read http listener address")?;
    info!(%local_addr, "http rpc listener ready");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await
        .context("http rpc server exited with error")
}

async fn rpc_endpoint(
    State(state): State<RpcServerState>,
    body: Bytes,
) -> Json<redline_common::protocol::jsonrpc::Response> {
    Json(handle_raw_request(&body, &state).await)
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use redline_common::protocol::jsonrpc::{Request, RequestId, Response};
    use serde_json::json;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::*;
    use crate::config::DaemonConfig;
    use crate::pipeline::EditPipeline;
    use crate::storage::audit::AuditDb;
    use crate::storage::{DocumentStorage, LocalStorage};

    fn test_state(dir: &TempDir) -> RpcServerState {
        let mut config = DaemonConfig::default();
        config.documents.root = Some(dir.path().to_path_buf());
        let storage =
            Arc::new(LocalStorage::new(dir.path(), false).expect("storage should initialize"));
        let audit = AuditDb::open_in_memory().expect("audit db should open");
        let pipeline = EditPipeline::new(config, storage as Arc<dyn DocumentStorage>, audit)
            .expect("pipeline should initialize");
        RpcServerState::new(Arc::new(pipeline))
    }

    async fn post_rpc(router: Router, body: Vec<u8>) -> Response {
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/rpc")
            .header("content-type", "application/json")
            .body(axum::body::Body::from(body))
            .expect("request should build");
        let response = router.oneshot(request).await.expect("router should respond");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        serde_json::from_slice(&bytes).expect("response should decode")
    }

    #[tokio::test]
    async fn ping_over_http() {
        let dir = TempDir::new().unwrap();
        let router = router(test_state(&dir));
        let request = Request::new("rpc.ping", Some(json!({})), RequestId::Number(1));
        let body = serde_json::to_vec(&request).unwrap();

        let response = post_rpc(router, body).await;
        assert_eq!(response.result, Some(json!({ "ok": true })));
    }

    #[tokio::test]
    async fn malformed_body_gets_a_jsonrpc_error() {
        let dir = TempDir::new().unwrap();
        let router = router(test_state(&dir));

        let response = post_rpc(router, b"{broken".to_vec()).await;
        assert_eq!(response.error.expect("error should be present").code, -32700);
    }

    #[tokio::test]
    async fn health_endpoint_responds() {
        let dir = TempDir::new().unwrap();
        let router = router(test_state(&dir));
        let request = axum::http::Request::builder()
            .method("GET")
            .uri("/healthz")
            .body(axum::body::Body::empty())
            .expect("request should build");
        let response = router.oneshot(request).await.expect("router should respond");
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }
}
