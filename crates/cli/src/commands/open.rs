// `redline open` — open (or re-use) a document handle.

use clap::Args;
use serde_json::json;

use redline_common::protocol::methods;
use redline_common::types::HandleInfo;

use crate::client::DaemonClient;
use crate::commands::{block_on, locator_value};
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct OpenArgs {
    /// Document target: root-relative path, file:// or http(s):// URI.
    pub target: String,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

pub fn run(args: OpenArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    let locator = locator_value(&args.target);

    match block_on(call_open(locator)) {
        Ok(info) => {
            output::print_output(format, &info, format_human)?;
            Ok(())
        }
        Err(e) => {
            output::print_anyhow_error(format, &e);
            Err(e)
        }
    }
}

async fn call_open(locator: serde_json::Value) -> anyhow::Result<HandleInfo> {
    let client = DaemonClient::default();
    client.call(methods::OPEN_DOCUMENT_HANDLE, json!({ "locator": locator })).await
}

fn format_human(info: &HandleInfo) -> String {
    format!("Opened {} as handle {}", info.path, info.handle_id)
}
