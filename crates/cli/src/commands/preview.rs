// `redline preview` — render a plan's staged changes without writing.

use clap::Args;
use serde_json::json;
use uuid::Uuid;

use redline_common::diff::FragmentKind;
use redline_common::protocol::methods;
use redline_common::types::PreviewReport;

use crate::client::DaemonClient;
use crate::commands::block_on;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct PreviewArgs {
    /// Plan to preview.
    pub plan_id: Uuid,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

pub fn run(args: PreviewArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);

    match block_on(call_preview(args.plan_id)) {
        Ok(report) => {
            if report.ambiguous {
                output::print_warning(
                    format,
                    "AMBIGUOUS_TARGET",
                    &format!(
                        "{} candidate matches; apply will refuse until the plan is narrowed",
                        report.candidates.len()
                    ),
                );
            }
            output::print_output(format, &report, format_human)?;
            Ok(())
        }
        Err(e) => {
            output::print_anyhow_error(format, &e);
            Err(e)
        }
    }
}

async fn call_preview(plan_id: Uuid) -> anyhow::Result<PreviewReport> {
    let client = DaemonClient::default();
    client.call(methods::PREVIEW_EDIT, json!({ "plan_id": plan_id })).await
}

fn format_human(report: &PreviewReport) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "Preview #{} of plan {} — {} fragment(s), safety score {:.2}",
        report.preview_seq,
        report.plan_id,
        report.fragments.len(),
        report.safety_score
    ));

    for fragment in &report.fragments {
        let marker = match fragment.kind {
            FragmentKind::Replaced => '~',
            FragmentKind::Inserted => '+',
            FragmentKind::Deleted => '-',
        };
        lines.push(format!("  {marker} paragraph {}", fragment.paragraph_index));
        if let Some(before) = &fragment.before {
            lines.push(format!("    - {before}"));
        }
        if let Some(after) = &fragment.after {
            lines.push(format!("    + {after}"));
        }
    }

    if report.fragments.is_empty() {
        lines.push("  (no changes)".into());
    }

    if report.ambiguous {
        lines.push(format!("{} candidate match(es):", report.candidates.len()));
        for candidate in &report.candidates {
            lines.push(format!(
                "  paragraph {} @ {}: {}",
                candidate.paragraph_index, candidate.position, candidate.context
            ));
        }
    }

    lines.push(format!("Document hash: {}", report.content_hash));
    lines.join("\n")
}
