// JSON-RPC 2.0 over Unix domain sockets, newline-delimited framing.
//
// Peer hangup aborts the in-flight request: the dispatch future is dropped
// at its next await point, so a disconnected apply stops before its save is
// handed to the blocking pool. A save already on the blocking pool finishes
// on its own; the rename there is atomic either way.

use anyhow::{Context, Result};
use tokio::io::{self, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::broadcast;
use tracing::warn;

use crate::rpc::methods::{handle_raw_request, RpcServerState};

/// Serve connections until the shutdown channel fires.
pub async fn serve_unix_until_shutdown(
    listener: UnixListener,
    state: RpcServerState,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => return Ok(()),
            accepted = listener.accept() => {
                let (stream, _) =
                    accepted.context("failed to accept unix rpc connection")?;
                let connection_state = state.clone();
                tokio::spawn(async move {
                    if let Err(error) = serve_connection(stream, connection_state).await {
                        warn!(?error, "unix rpc connection failed");
                    }
                });
            }
        }
    }
}

/// Handle a single RPC stream. Each request line yields one response line.
pub async fn serve_connection<IO>(stream: IO, state: RpcServerState) -> Result<()>
where
    IO: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, mut write_half) = io::split(stream);
    let mut reader = BufReader::new(read_half);

    loop {
        let mut request_line = Vec::new();
        let bytes_read = reader
            .read_until(b'\n', &mut request_line)
            .await
            .context("failed to read json-rpc request")?;

        if bytes_read == 0 {
            return Ok(());
        }

        trim_line_endings(&mut request_line);
        if request_line.iter().all(|byte| byte.is_ascii_whitespace()) {
            continue;
        }

        let response = tokio::select! {
            response = handle_raw_request(&request_line, &state) => response,
            _ = peer_hangup(&mut reader) => return Ok(()),
        };
        let mut encoded =
            serde_json::to_vec(&response).context("failed to serialize json-rpc response")?;
        encoded.push(b'\n');

        write_half.write_all(&encoded).await.context("failed to write json-rpc response")?;
        write_half.flush().await.context("failed to flush json-rpc response")?;
    }
}

/// Resolves once the peer can no longer receive a response. Pipelined input
/// parks this future instead, so queued requests never get consumed here.
async fn peer_hangup<R>(reader: &mut BufReader<R>)
where
    R: AsyncRead + Unpin,
{
    match reader.fill_buf().await {
        Ok(buffered) if !buffered.is_empty() => std::future::pending().await,
        Ok(_) | Err(_) => {}
    }
}

fn trim_line_endings(line: &mut Vec<u8>) {
    while matches!(line.last(), Some(b'\n' | b'\r')) {
        line.pop();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use redline_common::intent::EditIntent;
    use redline_common::protocol::jsonrpc::{Request, RequestId, Response};
    use serde_json::json;
    use tempfile::TempDir;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::{UnixListener, UnixStream};
    use tokio::sync::broadcast;

    use super::{serve_unix_until_shutdown, RpcServerState};
    use crate::config::DaemonConfig;
    use crate::errors::OpError;
    use crate::locator::Locator;
    use crate::pipeline::{ApplyOptions, EditPipeline};
    use crate::storage::audit::AuditDb;
    use crate::storage::{DocumentStorage, LocalStorage};

    /// Stalls reads long enough for a test to hang up mid-request.
    struct SlowLoadStorage {
        inner: LocalStorage,
        saves: AtomicUsize,
    }

    impl DocumentStorage for SlowLoadStorage {
        fn load(&self, path: &str) -> Result<String, OpError> {
            std::thread::sleep(Duration::from_millis(300));
            self.inner.load(path)
        }

        fn save(&self, path: &str, content: &str) -> Result<(), OpError> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.inner.save(path, content)
        }

        fn exists(&self, path: &str) -> Result<bool, OpError> {
            self.inner.exists(path)
        }
    }

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

    #[tokio::test]
    async fn accepts_concurrent_connections() {
        let docs = TempDir::new().expect("temp dir should create");
        let socket_path = unique_socket_path("rpc-concurrency");
        let listener = match UnixListener::bind(&socket_path) {
            Ok(listener) => listener,
            Err(error) if error.kind() == io::ErrorKind::PermissionDenied => {
                eprintln!("skipping unix socket test: bind is not permitted in this environment");
                return;
            }
            Err(error) => panic!("failed to bind unix socket: {error}"),
        };

        let state = test_state(&docs);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let server =
            tokio::spawn(
                async move { serve_unix_until_shutdown(listener, state, shutdown_rx).await },
            );

        let mut clients = Vec::new();
        for client_id in 0_i64..8_i64 {
            let socket_path = socket_path.clone();
            clients.push(tokio::spawn(async move {
                let request = Request::new("rpc.ping", Some(json!({})), RequestId::Number(client_id));
                rpc_call(&socket_path, request).await
            }));
        }

        for (expected_id, task) in (0_i64..8_i64).zip(clients) {
            let response = task.await.expect("client call should complete");
            assert_eq!(response.id, RequestId::Number(expected_id));
            assert!(response.error.is_none(), "expected success response: {response:?}");
            assert_eq!(response.result, Some(json!({ "ok": true })));
        }

        let _ = shutdown_tx.send(());
        let _ = server.await;
        cleanup_socket_file(&socket_path);
    }

    #[tokio::test]
    async fn keeps_connection_open_for_multiple_requests() {
        let docs = TempDir::new().expect("temp dir should create");
        let socket_path = unique_socket_path("rpc-multi-request");
        let listener = match UnixListener::bind(&socket_path) {
            Ok(listener) => listener,
            Err(error) if error.kind() == io::ErrorKind::PermissionDenied => {
                eprintln!("skipping unix socket test: bind is not permitted in this environment");
                return;
            }
            Err(error) => panic!("failed to bind unix socket: {error}"),
        };

        let state = test_state(&docs);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let server =
            tokio::spawn(
                async move { serve_unix_until_shutdown(listener, state, shutdown_rx).await },
            );
        let stream = UnixStream::connect(&socket_path).await.expect("client should connect");
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let ping = Request::new("rpc.ping", Some(json!({})), RequestId::Number(1));
        write_request(&mut write_half, &ping).await;
        let ping_response = read_response(&mut reader).await;
        assert_eq!(ping_response.result, Some(json!({ "ok": true })));

        let unknown = Request::new("rpc.unknown", Some(json!({})), RequestId::Number(2));
        write_request(&mut write_half, &unknown).await;
        let unknown_response = read_response(&mut reader).await;
        assert_eq!(unknown_response.error.expect("error should be present").code, -32601);

        let _ = shutdown_tx.send(());
        let _ = server.await;
        cleanup_socket_file(&socket_path);
    }

    #[tokio::test]
    async fn hangup_during_apply_leaves_document_unchanged() {
        let docs = TempDir::new().expect("temp dir should create");
        std::fs::write(docs.path().join("memo.txt"), "draft wording here\n")
            .expect("fixture should write");
        let socket_path = unique_socket_path("rpc-hangup");
        let listener = match UnixListener::bind(&socket_path) {
            Ok(listener) => listener,
            Err(error) if error.kind() == io::ErrorKind::PermissionDenied => {
                eprintln!("skipping unix socket test: bind is not permitted in this environment");
                return;
            }
            Err(error) => panic!("failed to bind unix socket: {error}"),
        };

        let mut config = DaemonConfig::default();
        config.documents.root = Some(docs.path().to_path_buf());
        config.documents.autobackup = false;
        let storage = Arc::new(SlowLoadStorage {
            inner: LocalStorage::new(docs.path(), false).expect("storage should initialize"),
            saves: AtomicUsize::new(0),
        });
        let audit = AuditDb::open_in_memory().expect("audit db should open");
        let pipeline = Arc::new(
            EditPipeline::new(config, Arc::clone(&storage) as Arc<dyn DocumentStorage>, audit)
                .expect("pipeline should initialize"),
        );
        let state = RpcServerState::new(Arc::clone(&pipeline));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let server =
            tokio::spawn(
                async move { serve_unix_until_shutdown(listener, state, shutdown_rx).await },
            );

        let locator = Locator::Path { path: "memo.txt".into() };
        let intent = EditIntent::ReplaceText {
            find: "draft".into(),
            replace: "final".into(),
            paragraph: None,
            occurrence: None,
            match_case: true,
        };
        let summary =
            pipeline.plan_edit(&locator, intent).await.expect("plan should stage");
        pipeline.preview_edit(summary.plan_id).await.expect("preview should compute");

        // Send the apply, then hang up before the slow reload finishes.
        let stream = UnixStream::connect(&socket_path).await.expect("client should connect");
        let (_read_half, mut write_half) = stream.into_split();
        let request = Request::new(
            "apply_edit",
            Some(json!({ "plan_id": summary.plan_id, "confirm": true })),
            RequestId::Number(1),
        );
        write_request(&mut write_half, &request).await;
        drop(write_half);
        drop(_read_half);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(storage.saves.load(Ordering::SeqCst), 0, "aborted apply must not save");
        assert_eq!(
            std::fs::read_to_string(docs.path().join("memo.txt")).expect("fixture should read"),
            "draft wording here\n",
        );

        // The plan survived the hangup and can still be applied.
        let options = ApplyOptions { confirm: true, ..ApplyOptions::default() };
        let outcome =
            pipeline.apply_edit(summary.plan_id, options).await.expect("retry should commit");
        assert_eq!(outcome.paragraphs_changed, 1);
        assert_eq!(storage.saves.load(Ordering::SeqCst), 1);

        let _ = shutdown_tx.send(());
        let _ = server.await;
        cleanup_socket_file(&socket_path);
    }

    #[tokio::test]
    async fn shutdown_channel_stops_the_server() {
        let docs = TempDir::new().expect("temp dir should create");
        let socket_path = unique_socket_path("rpc-shutdown");
        let listener = match UnixListener::bind(&socket_path) {
            Ok(listener) => listener,
            Err(error) if error.kind() == io::ErrorKind::PermissionDenied => {
                eprintln!("skipping unix socket test: bind is not permitted in this environment");
                return;
            }
            Err(error) => panic!("failed to bind unix socket: {error}"),
        };

        let state = test_state(&docs);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let server =
            tokio::spawn(
                async move { serve_unix_until_shutdown(listener, state, shutdown_rx).await },
            );

        shutdown_tx.send(()).expect("shutdown signal should send");
        let result = server.await.expect("server task should join");
        assert!(result.is_ok());
        cleanup_socket_file(&socket_path);
    }

    async fn rpc_call(socket_path: &Path, request: Request) -> Response {
        let stream = UnixStream::connect(socket_path).await.expect("client should connect");
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        write_request(&mut write_half, &request).await;
        read_response(&mut reader).await
    }

    async fn write_request(write_half: &mut tokio::net::unix::OwnedWriteHalf, request: &Request) {
        let mut encoded =
            serde_json::to_vec(request).expect("request should serialize for test transport");
        encoded.push(b'\n');
        write_half.write_all(&encoded).await.expect("request write should succeed");
        write_half.flush().await.expect("request flush should succeed");
    }

    async fn read_response(reader: &mut BufReader<tokio::net::unix::OwnedReadHalf>) -> Response {
        let mut response_line = Vec::new();
        reader.read_until(b'\n', &mut response_line).await.expect("response should be readable");
        serde_json::from_slice::<Response>(&response_line).expect("response should decode")
    }

    fn unique_socket_path(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time should be after unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!("redline-{prefix}-{nanos}.sock"))
    }

    fn cleanup_socket_file(path: &Path) {
        let _ = std::fs::remove_file(path);
    }
}
