// `redline apply` — commit a previewed plan to storage.

use clap::Args;
use serde_json::json;
use uuid::Uuid;

use redline_common::protocol::methods;
use redline_common::types::ApplyOutcome;

use crate::client::DaemonClient;
use crate::commands::block_on;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Plan to apply.
    pub plan_id: Uuid,

    /// Acknowledge the previewed changes.
    #[arg(long)]
    confirm: bool,

    /// Replay-protection key; re-running with the same key returns the
    /// recorded outcome instead of applying twice.
    #[arg(long)]
    idempotency_key: Option<String>,

    /// Apply even when the edit exceeds the safety threshold.
    #[arg(long)]
    override_unsafe: bool,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

pub fn run(args: ApplyArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);

    match block_on(call_apply(&args)) {
        Ok(outcome) => {
            output::print_output(format, &outcome, format_human)?;
            Ok(())
        }
        Err(e) => {
            output::print_anyhow_error(format, &e);
            Err(e)
        }
    }
}

async fn call_apply(args: &ApplyArgs) -> anyhow::Result<ApplyOutcome> {
    let client = DaemonClient::default();
    let mut params = json!({
        "plan_id": args.plan_id,
        "confirm": args.confirm,
        "override_unsafe": args.override_unsafe,
    });
    if let Some(key) = &args.idempotency_key {
        params["idempotency_key"] = json!(key);
    }
    client.call(methods::APPLY_EDIT, params).await
}

fn format_human(outcome: &ApplyOutcome) -> String {
    let replay = if outcome.replayed { " (replayed)" } else { "" };
    format!(
        "Applied plan {}{} — {} paragraph(s) changed at {}. Document hash: {}",
        outcome.plan_id,
        replay,
        outcome.paragraphs_changed,
        outcome.applied_at.format("%Y-%m-%d %H:%M:%S UTC"),
        outcome.content_hash
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use redline_common::types::PlanStatus;

    fn sample_outcome() -> ApplyOutcome {
        ApplyOutcome {
            plan_id: Uuid::nil(),
            status: PlanStatus::Applied,
            paragraphs_changed: 3,
            content_hash: "deadbeef".into(),
            applied_at: Utc::now(),
            replayed: false,
        }
    }

    #[test]
    fn human_format_shows_outcome() {
        let output = format_human(&sample_outcome());
        assert!(output.contains("Applied plan"));
        assert!(output.contains("3 paragraph(s)"));
        assert!(output.contains("deadbeef"));
        assert!(!output.contains("replayed"));
    }

    #[test]
    fn human_format_marks_replays() {
        let mut outcome = sample_outcome();
        outcome.replayed = true;
        assert!(format_human(&outcome).contains("(replayed)"));
    }

    #[test]
    fn json_format_roundtrips() {
        let outcome = sample_outcome();
        let mut buf = Vec::new();
        output::write_output(&mut buf, OutputFormat::Json, &outcome, format_human).unwrap();
        let parsed: ApplyOutcome = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed.status, PlanStatus::Applied);
        assert_eq!(parsed.paragraphs_changed, 3);
    }
}
