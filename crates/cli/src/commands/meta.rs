// `redline meta` — document metadata for an open handle.

use clap::Args;
use serde_json::json;
use uuid::Uuid;

use redline_common::protocol::methods;
use redline_common::types::DocumentMetadata;

use crate::client::DaemonClient;
use crate::commands::block_on;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct MetaArgs {
    /// Handle to inspect.
    pub handle_id: Uuid,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

pub fn run(args: MetaArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);

    match block_on(call_meta(args.handle_id)) {
        Ok(metadata) => {
            output::print_output(format, &metadata, format_human)?;
            Ok(())
        }
        Err(e) => {
            output::print_anyhow_error(format, &e);
            Err(e)
        }
    }
}

async fn call_meta(handle_id: Uuid) -> anyhow::Result<DocumentMetadata> {
    let client = DaemonClient::default();
    client.call(methods::GET_DOCUMENT_METADATA, json!({ "handle_id": handle_id })).await
}

fn format_human(metadata: &DocumentMetadata) -> String {
    format!(
        "{}\n  paragraphs: {}\n  characters: {}\n  hash: {}",
        metadata.path, metadata.paragraph_count, metadata.character_count, metadata.content_hash
    )
}
