// `redline ping` — daemon liveness check.

use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::json;

use redline_common::protocol::methods;

use crate::client::DaemonClient;
use crate::commands::block_on;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct PingArgs {
    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResult {
    pub ok: bool,
}

pub fn run(args: PingArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);

    match block_on(call_ping()) {
        Ok(result) => {
            output::print_output(format, &result, |_| "Daemon is up.".into())?;
            Ok(())
        }
        Err(e) => {
            output::print_anyhow_error(format, &e);
            Err(e)
        }
    }
}

async fn call_ping() -> anyhow::Result<PingResult> {
    let client = DaemonClient::default();
    client.call(methods::RPC_PING, json!({})).await
}
