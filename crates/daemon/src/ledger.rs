// Idempotency ledger: client-supplied key → recorded apply outcome.
//
// `begin` is an atomic check-and-reserve. A key seen for the first time is
// reserved for the in-flight apply; a key with a recorded outcome replays
// it; a key whose apply is still running reports contention. Outcomes are
// recorded once execution starts and are never overwritten — a retried
// request gets the stored result, success or failure, without re-running
// the mutation. Gate failures happen before execution and release the
// reservation instead, so the caller can fix the request and retry with
// the same key.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use redline_common::types::ApplyOutcome;
use tracing::debug;

/// What the ledger remembers for a completed apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedOutcome {
    Success(ApplyOutcome),
    Failure { code: String, message: String },
}

#[derive(Debug)]
enum LedgerEntry {
    InFlight,
    Completed(RecordedOutcome),
}

#[derive(Debug, Default)]
pub struct IdempotencyLedger {
    entries: Mutex<HashMap<String, LedgerEntry>>,
}

/// Result of the check-and-reserve step.
pub enum Reservation {
    /// The key already has an outcome; return it without executing.
    Replay(RecordedOutcome),
    /// The key is now reserved for this apply.
    Reserved(ReservationGuard),
    /// Another apply holds the key right now; transient, retry later.
    Contended,
}

impl IdempotencyLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Atomically look up `key`, reserving it when absent.
    pub fn begin(self: &Arc<Self>, key: &str) -> Reservation {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some(LedgerEntry::Completed(outcome)) => {
                debug!(key, "idempotency key replayed");
                Reservation::Replay(outcome.clone())
            }
            Some(LedgerEntry::InFlight) => Reservation::Contended,
            None => {
                entries.insert(key.to_string(), LedgerEntry::InFlight);
                Reservation::Reserved(ReservationGuard {
                    ledger: Arc::clone(self),
                    key: key.to_string(),
                    completed: false,
                })
            }
        }
    }

    /// Recorded outcome for a key, if any.
    pub fn outcome(&self, key: &str) -> Option<RecordedOutcome> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some(LedgerEntry::Completed(outcome)) => Some(outcome.clone()),
            _ => None,
        }
    }
}

/// Holds a key reservation. `complete` records the outcome permanently;
/// dropping without completing releases the key for a fresh attempt.
pub struct ReservationGuard {
    ledger: Arc<IdempotencyLedger>,
    key: String,
    completed: bool,
}

impl ReservationGuard {
    pub fn complete(mut self, outcome: RecordedOutcome) {
        let mut entries = self.ledger.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(self.key.clone(), LedgerEntry::Completed(outcome));
        self.completed = true;
    }
}

impl Drop for ReservationGuard {
    fn drop(&mut self) {
        if !self.completed {
            let mut entries = self.ledger.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries.remove(&self.key);
        }
    }
}
