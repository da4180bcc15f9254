use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use redline_daemon::config::DaemonConfig;
use redline_daemon::runtime::run_standalone;

/// Redline document daemon.
#[derive(Debug, Parser)]
#[command(name = "redlined", version, about = "Redline document daemon")]
struct Cli {
    /// Document root directory (overrides config and REDLINE_ROOT).
    #[arg(long)]
    root: Option<std::path::PathBuf>,

    /// Also serve JSON-RPC over HTTP on this localhost port.
    #[arg(long)]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut config = DaemonConfig::load();
    if let Some(root) = cli.root {
        config.documents.root = Some(root);
    }

    run_standalone(config, cli.http_port).await
}
