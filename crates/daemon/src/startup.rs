// Daemon startup: PID file, socket binding, runtime paths.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::net::UnixListener;
use tracing::info;

use crate::security::{ensure_owner_only_dir, ensure_owner_only_file, open_private_truncate};

const SOCKET_NAME: &str = "daemon.sock";
const PID_FILE_NAME: &str = "daemon.pid";
const AUDIT_DB_NAME: &str = "audit.db";

/// Resolved paths for daemon runtime files under `~/.redline/`.
pub struct DaemonPaths {
    pub base_dir: PathBuf,
    pub socket_path: PathBuf,
    pub pid_path: PathBuf,
    pub audit_db_path: PathBuf,
}

impl DaemonPaths {
    pub fn resolve() -> Result<Self> {
        let base = base_dir()?;
        Ok(Self {
            socket_path: base.join(SOCKET_NAME),
            pid_path: base.join(PID_FILE_NAME),
            audit_db_path: base.join(AUDIT_DB_NAME),
            base_dir: base,
        })
    }
}

/// Write the current process PID, owner-readable only.
pub fn write_pid_file(path: &Path) -> Result<()> {
    let pid = std::process::id();
    let mut file = open_private_truncate(path).context("failed to create PID file")?;
    write!(file, "{pid}").context("failed to write PID")?;
    info!(pid, path = %path.display(), "wrote PID file");
    Ok(())
}

pub fn remove_pid_file(path: &Path) {
    if let Err(error) = fs::remove_file(path) {
        if error.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(%error, "failed to remove PID file");
        }
    }
}

/// Remove any stale socket file and bind a fresh Unix listener. The daemon
/// signals readiness by accepting connections.
pub async fn bind_socket(path: &Path) -> Result<UnixListener> {
    if path.exists() {
        fs::remove_file(path).context("failed to remove stale socket")?;
    }

    let listener = UnixListener::bind(path).context("failed to bind Unix socket")?;
    ensure_owner_only_file(path)?;
    info!(path = %path.display(), "daemon socket ready");
    Ok(listener)
}

/// True when a daemon already answers on the socket.
pub async fn is_daemon_running(socket_path: &Path) -> bool {
    tokio::net::UnixStream::connect(socket_path).await.is_ok()
}

fn base_dir() -> Result<PathBuf> {
    let base = crate::config::global_dir().context("could not determine home directory")?;
    fs::create_dir_all(&base)
        .with_context(|| format!("failed to create `{}`", base.display()))?;
    ensure_owner_only_dir(&base)?;
    Ok(base)
}
