// `redline plan` — stage an edit plan against a document.

use clap::{Args, Subcommand};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use redline_common::protocol::methods;
use redline_common::types::PlanSummary;

use crate::client::DaemonClient;
use crate::commands::{block_on, locator_value};
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct PlanArgs {
    /// Document target: handle UUID, root-relative path, or URI.
    pub target: String,

    #[command(subcommand)]
    intent: IntentCommand,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Subcommand)]
enum IntentCommand {
    /// Replace occurrences of a text fragment
    Replace(ReplaceIntentArgs),
    /// Overwrite one paragraph wholesale
    Set(ParagraphTextArgs),
    /// Insert a new paragraph at an index
    Insert(ParagraphTextArgs),
    /// Delete the paragraph at an index
    Delete(ParagraphIndexArgs),
}

#[derive(Debug, Args)]
struct ReplaceIntentArgs {
    /// Text to search for.
    #[arg(long)]
    find: String,

    /// Replacement text.
    #[arg(long)]
    replace: String,

    /// Restrict the search to one paragraph (0-based).
    #[arg(long)]
    paragraph: Option<usize>,

    /// Replace only the Nth match (1-based).
    #[arg(long)]
    occurrence: Option<usize>,

    /// Match regardless of letter case.
    #[arg(long)]
    ignore_case: bool,
}

#[derive(Debug, Args)]
struct ParagraphTextArgs {
    /// Paragraph index (0-based).
    #[arg(long)]
    index: usize,

    /// Paragraph text.
    #[arg(long, group = "text_source")]
    text: Option<String>,

    /// Read paragraph text from a file.
    #[arg(long, group = "text_source")]
    file: Option<String>,
}

#[derive(Debug, Args)]
struct ParagraphIndexArgs {
    /// Paragraph index (0-based).
    #[arg(long)]
    index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanResult {
    pub plan_id: Uuid,
    pub summary: PlanSummary,
}

pub fn run(args: PlanArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    let locator = locator_value(&args.target);
    let intent = intent_value(args.intent)?;

    match block_on(call_plan(locator, intent)) {
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

fn intent_value(intent: IntentCommand) -> anyhow::Result<serde_json::Value> {
    Ok(match intent {
        IntentCommand::Replace(args) => {
            let mut value = json!({
                "kind": "replace_text",
                "find": args.find,
                "replace": args.replace,
                "match_case": !args.ignore_case,
            });
            if let Some(paragraph) = args.paragraph {
                value["paragraph"] = json!(paragraph);
            }
            if let Some(occurrence) = args.occurrence {
                value["occurrence"] = json!(occurrence);
            }
            value
        }
        IntentCommand::Set(args) => {
            let text = resolve_text(args.text, args.file)?;
            json!({ "kind": "set_paragraph", "index": args.index, "text": text })
        }
        IntentCommand::Insert(args) => {
            let text = resolve_text(args.text, args.file)?;
            json!({ "kind": "insert_paragraph", "index": args.index, "text": text })
        }
        IntentCommand::Delete(args) => {
            json!({ "kind": "delete_paragraph", "index": args.index })
        }
    })
}

fn resolve_text(text: Option<String>, file: Option<String>) -> anyhow::Result<String> {
    match (text, file) {
        (Some(t), _) => Ok(t),
        (_, Some(path)) => std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("failed to read text file `{path}`: {e}")),
        (None, None) => anyhow::bail!("either --text or --file is required"),
    }
}

async fn call_plan(
    locator: serde_json::Value,
    intent: serde_json::Value,
) -> anyhow::Result<PlanResult> {
    let client = DaemonClient::default();
    client.call(methods::PLAN_EDIT, json!({ "locator": locator, "intent": intent })).await
}

fn format_human(result: &PlanResult) -> String {
    format!(
        "Plan {} staged ({}) on handle {} — status {}. Next: redline preview {}",
        result.plan_id,
        result.summary.intent_kind,
        result.summary.handle_id,
        result.summary.status,
        result.plan_id
    )
}
