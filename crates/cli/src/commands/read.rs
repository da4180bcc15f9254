// `redline read` — paged paragraph view of an open document.

use clap::Args;
use serde_json::json;
use uuid::Uuid;

use redline_common::protocol::methods;
use redline_common::types::ParagraphPage;

use crate::client::DaemonClient;
use crate::commands::block_on;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct ReadArgs {
    /// Handle to read from.
    pub handle_id: Uuid,

    /// First paragraph to return (0-based).
    #[arg(long, default_value_t = 0)]
    offset: usize,

    /// Maximum paragraphs to return (defaults to the daemon's page limit).
    #[arg(long)]
    limit: Option<usize>,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

pub fn run(args: ReadArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);

    match block_on(call_read(&args)) {
        Ok(page) => {
            output::print_output(format, &page, format_human)?;
            Ok(())
        }
        Err(e) => {
            output::print_anyhow_error(format, &e);
            Err(e)
        }
    }
}

async fn call_read(args: &ReadArgs) -> anyhow::Result<ParagraphPage> {
    let client = DaemonClient::default();
    let mut params = json!({ "handle_id": args.handle_id, "offset": args.offset });
    if let Some(limit) = args.limit {
        params["limit"] = json!(limit);
    }
    client.call(methods::GET_DOCUMENT_PARAGRAPHS, params).await
}

fn format_human(page: &ParagraphPage) -> String {
    let mut lines = Vec::new();
    for (i, paragraph) in page.paragraphs.iter().enumerate() {
        lines.push(format!("[{}] {}", page.offset + i, paragraph));
    }
    if page.truncated {
        let shown = page.offset + page.paragraphs.len();
        lines.push(format!(
            "… {} of {} paragraphs shown; continue with --offset {}",
            page.paragraphs.len(),
            page.total,
            shown
        ));
    }
    if lines.is_empty() {
        return "Document is empty.".into();
    }
    lines.join("\n")
}
