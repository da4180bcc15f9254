// CLI subcommand dispatch.

use clap::Subcommand;
use serde_json::json;

pub mod apply;
pub mod close;
pub mod ls;
pub mod meta;
pub mod open;
pub mod ping;
pub mod plan;
pub mod preview;
pub mod read;
pub mod tables;

#[derive(Subcommand)]
pub enum Command {
    /// Open a document handle for a path, URI, or existing handle
    Open(open::OpenArgs),
    /// List open document handles
    Ls(ls::LsArgs),
    /// Close a document handle
    Close(close::CloseArgs),
    /// Stage an edit plan against a document
    Plan(plan::PlanArgs),
    /// Preview a staged plan's fragments and safety score
    Preview(preview::PreviewArgs),
    /// Apply a previewed plan to storage
    Apply(apply::ApplyArgs),
    /// Read document paragraphs (paged)
    Read(read::ReadArgs),
    /// Show document metadata
    Meta(meta::MetaArgs),
    /// Extract pipe-delimited tables from a document
    Tables(tables::TablesArgs),
    /// Check that the daemon is reachable
    Ping(ping::PingArgs),
}

pub fn run(cmd: Command) -> anyhow::Result<()> {
    match cmd {
        Command::Open(args) => open::run(args),
        Command::Ls(args) => ls::run(args),
        Command::Close(args) => close::run(args),
        Command::Plan(args) => plan::run(args),
        Command::Preview(args) => preview::run(args),
        Command::Apply(args) => apply::run(args),
        Command::Read(args) => read::run(args),
        Command::Meta(args) => meta::run(args),
        Command::Tables(args) => tables::run(args),
        Command::Ping(args) => ping::run(args),
    }
}

/// Run an async RPC call from a sync command handler.
pub(crate) fn block_on<F, T>(future: F) -> anyhow::Result<T>
where
    F: std::future::Future<Output = anyhow::Result<T>>,
{
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("tokio runtime should build")
        .block_on(future)
}

/// Interpret a positional document target as a locator value.
///
/// A UUID selects an existing handle, a string with a scheme is a remote
/// URI, anything else is a root-relative path.
pub(crate) fn locator_value(target: &str) -> serde_json::Value {
    if uuid::Uuid::parse_str(target).is_ok() {
        json!({ "handle_id": target })
    } else if target.contains("://") {
        json!({ "uri": target })
    } else {
        json!({ "path": target })
    }
}
