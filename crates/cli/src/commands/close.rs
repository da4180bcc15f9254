// `redline close` — close a document handle.

use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use redline_common::protocol::methods;

use crate::client::DaemonClient;
use crate::commands::block_on;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct CloseArgs {
    /// Handle to close.
    pub handle_id: Uuid,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseResult {
    pub closed: bool,
}

pub fn run(args: CloseArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);

    match block_on(call_close(args.handle_id)) {
        Ok(result) => {
            output::print_output(format, &result, |_| "Handle closed.".into())?;
            Ok(())
        }
        Err(e) => {
            output::print_anyhow_error(format, &e);
            Err(e)
        }
    }
}

async fn call_close(handle_id: Uuid) -> anyhow::Result<CloseResult> {
    let client = DaemonClient::default();
    client.call(methods::CLOSE_DOCUMENT_HANDLE, json!({ "handle_id": handle_id })).await
}
