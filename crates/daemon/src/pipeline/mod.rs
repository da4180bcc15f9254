// The staged edit pipeline: plan → preview → apply.
//
// All document I/O goes through the storage backend on the blocking pool.
// Applies serialize per document via a per-path async mutex, and each plan
// serializes its own state transitions behind the plan's mutex. Apply is
// cancel-safe at every await point before the save is dispatched to the
// blocking pool: a caller disconnecting there leaves the document unchanged
// and the plan still PREVIEWED. Once the save is dispatched it completes
// atomically even if the caller is gone.

pub mod plan;
pub mod preview;

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use anyhow::anyhow;
use redline_common::intent::EditIntent;
use redline_common::types::{
    ApplyOutcome, DocumentMetadata, HandleInfo, ParagraphPage, PlanStatus, PlanSummary,
    PreviewReport, TableView,
};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use crate::config::DaemonConfig;
use crate::engine::document::TextDocument;
use crate::errors::OpError;
use crate::ledger::{IdempotencyLedger, RecordedOutcome, Reservation};
use crate::locator::{Locator, LocatorResolver};
use crate::pipeline::plan::{validate_transition, PlanRecord};
use crate::registry::HandleRegistry;
use crate::storage::audit::AuditDb;
use crate::storage::DocumentStorage;

/// Per-apply options beyond the plan itself.
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    pub confirm: bool,
    pub idempotency_key: Option<String>,
    /// Explicit acknowledgement that a high-blast-radius edit is wanted.
    pub override_unsafe: bool,
}

pub struct EditPipeline {
    config: DaemonConfig,
    registry: Arc<HandleRegistry>,
    resolver: LocatorResolver,
    ledger: Arc<IdempotencyLedger>,
    storage: Arc<dyn DocumentStorage>,
    audit: Arc<StdMutex<AuditDb>>,
    plans: RwLock<HashMap<Uuid, Arc<PlanRecord>>>,
    /// One async mutex per canonical path; applies to the same document
    /// queue here instead of failing fast.
    doc_locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl EditPipeline {
    pub fn new(
        config: DaemonConfig,
        storage: Arc<dyn DocumentStorage>,
        audit: AuditDb,
    ) -> anyhow::Result<Self> {
        let registry = Arc::new(HandleRegistry::new());
        let root = config.document_root()?;
        let http_base = match &config.storage.http_base_url {
            Some(base) => Some(Url::parse(base)?),
            None => None,
        };
        let resolver = LocatorResolver::new(Arc::clone(&registry), root, http_base);
        Ok(Self {
            config,
            registry,
            resolver,
            ledger: IdempotencyLedger::new(),
            storage,
            audit: Arc::new(StdMutex::new(audit)),
            plans: RwLock::new(HashMap::new()),
            doc_locks: StdMutex::new(HashMap::new()),
        })
    }

    pub fn registry(&self) -> &HandleRegistry {
        &self.registry
    }

    // ── Handle operations ───────────────────────────────────────────

    /// Resolve a locator and register a handle for it. Path and uri forms
    /// must name a document the backend can see.
    pub async fn open_handle(&self, locator: &Locator) -> Result<HandleInfo, OpError> {
        let must_exist = !matches!(locator, Locator::Handle { .. });
        let info = self.resolver.resolve(locator)?;
        if must_exist && !self.exists(&info.path).await? {
            // Undo the speculative registration so a bad path doesn't
            // leave a dangling handle behind.
            let _ = self.registry.close(info.handle_id);
            return Err(OpError::DocumentNotFound { path: info.path });
        }
        Ok(info)
    }

    pub fn list_handles(&self) -> Vec<HandleInfo> {
        self.registry.list()
    }

    pub fn close_handle(&self, handle_id: Uuid) -> Result<HandleInfo, OpError> {
        self.registry.close(handle_id)
    }

    // ── Plan / preview / apply ──────────────────────────────────────

    /// Validate an intent and stage it as an immutable plan.
    pub async fn plan_edit(
        &self,
        locator: &Locator,
        intent: EditIntent,
    ) -> Result<PlanSummary, OpError> {
        intent.validate()?;
        let handle = self.open_handle(locator).await?;

        let record = Arc::new(PlanRecord::new(handle.handle_id, handle.path, intent));
        let summary = record.summary(PlanStatus::New);
        self.audit_log(|audit| {
            audit.record_plan(
                record.plan_id,
                record.handle_id,
                &record.path,
                record.intent.kind_name(),
                record.created_at,
            )
        });
        info!(plan_id = %record.plan_id, path = %record.path,
              intent = record.intent.kind_name(), "plan created");

        self.plans.write().await.insert(record.plan_id, record);
        Ok(summary)
    }

    /// Compute (or recompute) the active preview for a plan.
    pub async fn preview_edit(&self, plan_id: Uuid) -> Result<PreviewReport, OpError> {
        let record = self.plan(plan_id).await?;
        let mut state = record.state.lock().await;
        validate_transition(plan_id, state.status, PlanStatus::Previewed)?;

        let document = self.load(&record.path).await?;
        let staged = document.stage(&record.intent)?;
        let preview_seq = state.active_preview.as_ref().map(|p| p.preview_seq + 1).unwrap_or(1);
        let report =
            preview::render_preview(plan_id, &record.intent, &document, &staged, preview_seq);

        self.audit_log(|audit| {
            audit.record_preview(
                plan_id,
                report.preview_seq,
                report.fragments.len(),
                report.safety_score,
                report.ambiguous,
                &report.content_hash,
            )?;
            audit.update_plan_status(plan_id, "PREVIEWED")
        });
        info!(plan_id = %plan_id, preview_seq, fragments = report.fragments.len(),
              ambiguous = report.ambiguous, safety = report.safety_score, "preview computed");

        state.status = PlanStatus::Previewed;
        state.active_preview = Some(report.clone());
        Ok(report)
    }

    /// Run the apply gate chain and, if every gate passes, mutate the
    /// document through the storage backend.
    pub async fn apply_edit(
        &self,
        plan_id: Uuid,
        options: ApplyOptions,
    ) -> Result<ApplyOutcome, OpError> {
        // Gate 1: idempotent replay, before anything else is looked at.
        let reservation = match &options.idempotency_key {
            Some(key) => match self.ledger.begin(key) {
                Reservation::Replay(outcome) => return replay_outcome(outcome),
                Reservation::Contended => {
                    return Err(OpError::LedgerContention { idempotency_key: key.clone() });
                }
                Reservation::Reserved(guard) => Some(guard),
            },
            None => None,
        };

        let record = self.plan(plan_id).await?;
        let doc_lock = self.doc_lock(&record.path);
        let _doc_guard = doc_lock.lock().await;
        let mut state = record.state.lock().await;

        // Gate 2: previewed, and the preview still matches the document.
        validate_transition(plan_id, state.status, PlanStatus::Applied)?;
        let preview = state
            .active_preview
            .clone()
            .ok_or(OpError::PreviewRequired { plan_id })?;
        let document = self.load(&record.path).await?;
        if document.content_hash() != preview.content_hash {
            return Err(OpError::PreviewRequired { plan_id });
        }

        // Gate 3: ambiguity.
        if preview.ambiguous && !record.intent.is_disambiguated() {
            return Err(OpError::AmbiguousTarget { candidates: preview.candidates.clone() });
        }

        // Gate 4: blast radius.
        let threshold = self.config.safety.blast_radius_threshold;
        if preview.safety_score > threshold && !options.override_unsafe {
            return Err(OpError::UnsafeWildcard {
                safety_score: preview.safety_score,
                threshold,
            });
        }

        // Gate 5: explicit confirmation.
        if !options.confirm {
            return Err(OpError::ConfirmationRequired);
        }

        // Execution. From here on the outcome, success or failure, is
        // what an idempotent retry will see.
        let staged = document.stage(&record.intent)?;
        match self.save(&record.path, staged.document.render()).await {
            Ok(()) => {
                state.status = PlanStatus::Applied;
                let outcome = ApplyOutcome {
                    plan_id,
                    status: PlanStatus::Applied,
                    paragraphs_changed: staged.fragments.len(),
                    content_hash: staged.document.content_hash(),
                    applied_at: chrono::Utc::now(),
                    replayed: false,
                };
                if let Some(guard) = reservation {
                    guard.complete(RecordedOutcome::Success(outcome.clone()));
                }
                self.record_apply_audit(&options, &outcome);
                info!(plan_id = %plan_id, path = %record.path,
                      paragraphs_changed = outcome.paragraphs_changed, "apply committed");
                Ok(outcome)
            }
            Err(error) => {
                state.status = PlanStatus::Rejected;
                if let Some(guard) = reservation {
                    guard.complete(RecordedOutcome::Failure {
                        code: error.code().to_string(),
                        message: error.to_string(),
                    });
                }
                self.audit_log(|audit| audit.update_plan_status(plan_id, "REJECTED"));
                warn!(plan_id = %plan_id, path = %record.path, %error, "apply failed");
                Err(error)
            }
        }
    }

    // ── Read-only views ─────────────────────────────────────────────

    pub async fn document_metadata(&self, handle_id: Uuid) -> Result<DocumentMetadata, OpError> {
        let handle = self.registry.lookup(handle_id)?;
        let document = self.load(&handle.path).await?;
        Ok(document.metadata(&handle.path))
    }

    /// A page of paragraphs, capped by the configured paging limit.
    pub async fn document_paragraphs(
        &self,
        handle_id: Uuid,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<ParagraphPage, OpError> {
        let handle = self.registry.lookup(handle_id)?;
        let document = self.load(&handle.path).await?;
        let total = document.paragraph_count();

        let cap = self.config.paging.paragraph_limit;
        let requested = limit.unwrap_or(cap).min(cap);
        let start = offset.min(total);
        let end = (start + requested).min(total);

        Ok(ParagraphPage {
            offset: start,
            total,
            paragraphs: document.paragraphs()[start..end].to_vec(),
            truncated: end < total,
        })
    }

    pub async fn document_tables(&self, handle_id: Uuid) -> Result<Vec<TableView>, OpError> {
        let handle = self.registry.lookup(handle_id)?;
        let document = self.load(&handle.path).await?;
        Ok(extract_tables(document.paragraphs()))
    }

    // ── Internals ───────────────────────────────────────────────────

    async fn plan(&self, plan_id: Uuid) -> Result<Arc<PlanRecord>, OpError> {
        self.plans
            .read()
            .await
            .get(&plan_id)
            .cloned()
            .ok_or(OpError::PlanNotFound { plan_id })
    }

    fn doc_lock(&self, path: &str) -> Arc<Mutex<()>> {
        let mut locks = self.doc_locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(path.to_string()).or_default())
    }

    async fn load(&self, path: &str) -> Result<TextDocument, OpError> {
        let storage = Arc::clone(&self.storage);
        let path = path.to_string();
        let content = tokio::task::spawn_blocking(move || storage.load(&path))
            .await
            .map_err(|error| OpError::Internal(anyhow!("storage task panicked: {error}")))??;
        Ok(TextDocument::parse(&content))
    }

    async fn save(&self, path: &str, content: String) -> Result<(), OpError> {
        let storage = Arc::clone(&self.storage);
        let path = path.to_string();
        tokio::task::spawn_blocking(move || storage.save(&path, &content))
            .await
            .map_err(|error| OpError::Internal(anyhow!("storage task panicked: {error}")))?
    }

    async fn exists(&self, path: &str) -> Result<bool, OpError> {
        let storage = Arc::clone(&self.storage);
        let path = path.to_string();
        tokio::task::spawn_blocking(move || storage.exists(&path))
            .await
            .map_err(|error| OpError::Internal(anyhow!("storage task panicked: {error}")))?
    }

    fn record_apply_audit(&self, options: &ApplyOptions, outcome: &ApplyOutcome) {
        let key = options.idempotency_key.as_deref().unwrap_or("");
        self.audit_log(|audit| {
            audit.record_apply(
                outcome.plan_id,
                key,
                "APPLIED",
                outcome.paragraphs_changed,
                &outcome.content_hash,
                outcome.replayed,
                outcome.applied_at,
            )?;
            audit.update_plan_status(outcome.plan_id, "APPLIED")
        });
    }

    /// Audit failures are logged, never surfaced; the journal is an
    /// observer of the pipeline, not a participant.
    fn audit_log(&self, write: impl FnOnce(&AuditDb) -> anyhow::Result<()>) {
        let audit = self.audit.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(error) = write(&audit) {
            warn!(%error, "audit journal write failed");
        }
    }
}

/// Replay a recorded outcome: successes come back flagged `replayed`,
/// recorded failures come back as the same class of error.
fn replay_outcome(outcome: RecordedOutcome) -> Result<ApplyOutcome, OpError> {
    match outcome {
        RecordedOutcome::Success(mut outcome) => {
            outcome.replayed = true;
            Ok(outcome)
        }
        RecordedOutcome::Failure { code, message } => {
            if code == "STORAGE_ERROR" {
                Err(OpError::Storage(message))
            } else {
                Err(OpError::Internal(anyhow!(message)))
            }
        }
    }
}

/// A paragraph is a table when every line contains a `|` delimiter.
fn extract_tables(paragraphs: &[String]) -> Vec<TableView> {
    paragraphs
        .iter()
        .enumerate()
        .filter(|(_, block)| {
            !block.is_empty() && block.lines().all(|line| line.contains('|'))
        })
        .map(|(paragraph_index, block)| TableView {
            paragraph_index,
            rows: block
                .lines()
                .map(|line| {
                    line.trim_matches('|').split('|').map(|cell| cell.trim().to_string()).collect()
                })
                .collect(),
        })
        .collect()
}
