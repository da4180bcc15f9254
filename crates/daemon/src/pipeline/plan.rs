// Plan records and the plan state machine.
//
// A plan is immutable once built: the intent never changes after
// `plan_edit` validates it. Only the status and the active-preview pointer
// move, and they move under the plan's own async mutex so concurrent calls
// against one plan serialize.

use chrono::{DateTime, Utc};
use redline_common::intent::EditIntent;
use redline_common::types::{PlanStatus, PlanSummary, PreviewReport};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::errors::OpError;

#[derive(Debug)]
pub struct PlanRecord {
    pub plan_id: Uuid,
    pub handle_id: Uuid,
    /// Canonical document path at plan time.
    pub path: String,
    pub intent: EditIntent,
    pub created_at: DateTime<Utc>,
    pub state: Mutex<PlanState>,
}

#[derive(Debug)]
pub struct PlanState {
    pub status: PlanStatus,
    /// Most recent preview; only this one satisfies the apply gate.
    /// Superseded previews live on in the audit journal.
    pub active_preview: Option<PreviewReport>,
}

impl PlanRecord {
    pub fn new(handle_id: Uuid, path: String, intent: EditIntent) -> Self {
        Self {
            plan_id: Uuid::new_v4(),
            handle_id,
            path,
            intent,
            created_at: Utc::now(),
            state: Mutex::new(PlanState { status: PlanStatus::New, active_preview: None }),
        }
    }

    pub fn summary(&self, status: PlanStatus) -> PlanSummary {
        PlanSummary {
            plan_id: self.plan_id,
            handle_id: self.handle_id,
            status,
            intent_kind: self.intent.kind_name().to_string(),
            created_at: self.created_at,
        }
    }
}

/// Legal transitions: NEW → PREVIEWED, PREVIEWED → {PREVIEWED, APPLIED,
/// REJECTED}. APPLIED and REJECTED are absorbing; nothing skips PREVIEWED.
pub fn validate_transition(
    plan_id: Uuid,
    from: PlanStatus,
    to: PlanStatus,
) -> Result<(), OpError> {
    let legal = matches!(
        (from, to),
        (PlanStatus::New, PlanStatus::Previewed)
            | (PlanStatus::Previewed, PlanStatus::Previewed)
            | (PlanStatus::Previewed, PlanStatus::Applied)
            | (PlanStatus::Previewed, PlanStatus::Rejected)
    );
    if legal {
        return Ok(());
    }
    if from.is_terminal() {
        return Err(OpError::PlanAlreadyApplied { plan_id, status: from.to_string() });
    }
    Err(OpError::PreviewRequired { plan_id })
}
