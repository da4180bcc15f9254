// `redline ls` — list open document handles.

use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::json;

use redline_common::protocol::methods;
use redline_common::types::HandleInfo;

use crate::client::DaemonClient;
use crate::commands::block_on;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct LsArgs {
    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LsResult {
    #[serde(default)]
    pub handles: Vec<HandleInfo>,
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub session_policy: String,
}

pub fn run(args: LsArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);

    match block_on(call_ls()) {
        Ok(result) => {
            output::print_output(format, &result, format_human)?;
            Ok(())
        }
        Err(e) => {
            output::print_anyhow_error(format, &e);
            Err(e)
        }
    }
}

async fn call_ls() -> anyhow::Result<LsResult> {
    let client = DaemonClient::default();
    client.call(methods::LIST_OPEN_DOCUMENTS, json!({})).await
}

fn format_human(result: &LsResult) -> String {
    if result.handles.is_empty() {
        return "No open handles.".into();
    }

    let mut lines = Vec::new();
    lines.push(format!(
        "{} open handle(s), session policy {}",
        result.total, result.session_policy
    ));
    for h in &result.handles {
        lines.push(format!(
            "  {}  {}  (last used {})",
            h.handle_id,
            h.path,
            h.last_used_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
    }
    lines.join("\n")
}
