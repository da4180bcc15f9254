// Daemon runtime assembly: wire config, storage, pipeline, and transports
// together, then serve until shutdown.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::DaemonConfig;
use crate::pipeline::EditPipeline;
use crate::rpc::methods::RpcServerState;
use crate::rpc::{http::serve_http, unix::serve_unix_until_shutdown};
use crate::startup::{bind_socket, remove_pid_file, write_pid_file, DaemonPaths};
use crate::storage::audit::AuditDb;
use crate::storage::storage_from_config;

/// Run the daemon in the foreground until ctrl-c or a `daemon.shutdown`
/// request arrives.
pub async fn run_standalone(config: DaemonConfig, http_port: Option<u16>) -> Result<()> {
    let paths = DaemonPaths::resolve()?;
    run_standalone_with_paths(config, http_port, paths).await
}

async fn run_standalone_with_paths(
    config: DaemonConfig,
    http_port: Option<u16>,
    paths: DaemonPaths,
) -> Result<()> {
    let storage = storage_from_config(&config)?;
    let audit = AuditDb::open(&paths.audit_db_path)?;
    let pipeline = Arc::new(EditPipeline::new(config, storage, audit)?);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(4);
    let state = RpcServerState::new(pipeline).with_shutdown_notifier(shutdown_tx.clone());

    let ctrl_c_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        let _ = ctrl_c_tx.send(());
    });

    if let Some(port) = http_port {
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .with_context(|| format!("failed to bind http port {port}"))?;
        let http_state = state.clone();
        let http_shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            if let Err(error) = serve_http(listener, http_state, http_shutdown).await {
                warn!(?error, "http rpc server terminated unexpectedly");
            }
        });
    }

    let listener = bind_socket(&paths.socket_path).await?;
    write_pid_file(&paths.pid_path)?;

    info!(socket_path = %paths.socket_path.display(), "daemon started");
    let result = serve_unix_until_shutdown(listener, state, shutdown_rx).await;
    cleanup_paths(&paths);
    result.context("daemon exited with error")
}

fn cleanup_paths(paths: &DaemonPaths) {
    remove_pid_file(&paths.pid_path);
    let _ = std::fs::remove_file(&paths.socket_path);
}
