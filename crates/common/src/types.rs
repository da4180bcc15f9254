// Wire-visible types shared between the daemon and the CLI client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::diff::ChangeFragment;

// ── Handles ─────────────────────────────────────────────────────────────

/// A registered document handle as reported to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleInfo {
    pub handle_id: Uuid,
    /// Canonical workdir-relative path of the backing document.
    pub path: String,
    pub opened_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

// ── Plans ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanStatus {
    New,
    Previewed,
    Applied,
    Rejected,
}

impl PlanStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, PlanStatus::Applied | PlanStatus::Rejected)
    }
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PlanStatus::New => "NEW",
            PlanStatus::Previewed => "PREVIEWED",
            PlanStatus::Applied => "APPLIED",
            PlanStatus::Rejected => "REJECTED",
        };
        f.write_str(s)
    }
}

/// Client-facing view of a staged plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub plan_id: Uuid,
    pub handle_id: Uuid,
    pub status: PlanStatus,
    pub intent_kind: String,
    pub created_at: DateTime<Utc>,
}

// ── Previews ────────────────────────────────────────────────────────────

/// One plausible target site for an edit that matched more than one place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbiguityCandidate {
    pub paragraph_index: usize,
    /// Character offset of the match within its paragraph.
    pub position: usize,
    /// Surrounding text with the match bracketed, for human disambiguation.
    pub context: String,
}

/// The rendered result of previewing a plan against the current document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewReport {
    pub plan_id: Uuid,
    /// Monotonic per-plan preview counter; re-previewing bumps it.
    pub preview_seq: u64,
    pub fragments: Vec<ChangeFragment>,
    pub candidates: Vec<AmbiguityCandidate>,
    pub ambiguous: bool,
    /// Fraction of the document's paragraphs the apply would touch, in [0, 1].
    pub safety_score: f64,
    /// Hash of the document content the preview was computed against.
    pub content_hash: String,
}

// ── Applies ─────────────────────────────────────────────────────────────

/// Durable outcome of an apply, replayed verbatim on idempotent retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyOutcome {
    pub plan_id: Uuid,
    pub status: PlanStatus,
    pub paragraphs_changed: usize,
    pub content_hash: String,
    pub applied_at: DateTime<Utc>,
    /// True when this response is a replay of an earlier apply rather
    /// than the result of a fresh mutation.
    #[serde(default)]
    pub replayed: bool,
}

// ── Document views ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub path: String,
    pub paragraph_count: usize,
    pub character_count: usize,
    pub content_hash: String,
}

/// A table detected in the document body: a paragraph whose lines are
/// `|`-delimited rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableView {
    pub paragraph_index: usize,
    pub rows: Vec<Vec<String>>,
}

/// A page of paragraphs returned by the paragraphs view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParagraphPage {
    pub offset: usize,
    pub total: usize,
    pub paragraphs: Vec<String>,
    /// Set when the page was cut short by the server-side paging limit.
    pub truncated: bool,
}
