//! Sync status reporting types
//!
//! `StatusSnapshot` is the daemon's published view of the buffer: state
//! counts plus sync session bookkeeping. It is recomputed and republished
//! after every record transition, so readers always get the last complete
//! picture without touching the store.
//!
//! `SyncReport` is the per-session summary handed back to whoever
//! triggered the pass.

use serde::{Deserialize, Serialize};

/// Number of buffered records in each state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounts {
    pub pending: u64,
    pub in_flight: u64,
    pub failed: u64,
}

impl StateCounts {
    /// Records still owed to the upstream service
    pub fn backlog(&self) -> u64 {
        self.pending + self.in_flight + self.failed
    }
}

/// Published view of the buffer and the sync machinery
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Records waiting for the next pass
    pub pending: u64,
    /// Records claimed by the running pass
    pub in_flight: u64,
    /// Records parked after exhausting retries or a permanent rejection
    pub failed: u64,
    /// Orders accepted upstream since the buffer was created
    pub synced_total: u64,
    /// Last observed reachability of the ingestion endpoint
    pub online: bool,
    /// Whether a sync pass is running right now
    pub sync_active: bool,
    /// Start of the most recent pass, epoch milliseconds
    pub last_sync_started_at: Option<i64>,
    /// End of the most recent completed pass, epoch milliseconds
    pub last_sync_finished_at: Option<i64>,
    /// When scheduled passes resume after a transient failure backoff
    pub next_retry_at: Option<i64>,
    /// Most recent submission failure, cleared by a clean pass
    pub last_error: Option<String>,
}

/// What started a sync pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncTrigger {
    /// Daemon startup with a non-empty backlog
    Startup,
    /// Explicit request on the local API
    Manual,
    /// Debounced offline-to-online transition
    Reconnect,
    /// Periodic backlog rescan
    Rescan,
    /// A new order was buffered while online
    Intake,
}

/// Result of one submission attempt within a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncOutcome {
    /// Accepted upstream and removed from the buffer
    Synced,
    /// Retryable failure; the record stays pending
    TransientFailure,
    /// Rejected outright; the record is parked as failed
    PermanentFailure,
    /// Claimed but never attempted (pass aborted first)
    Skipped,
}

/// Per-order line item in a sync report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderOutcome {
    pub uid: String,
    pub outcome: SyncOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary of one sync pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub session_id: String,
    pub trigger: SyncTrigger,
    pub started_at: i64,
    pub finished_at: i64,
    pub synced: u32,
    pub transient_failures: u32,
    pub permanent_failures: u32,
    pub skipped: u32,
    /// True when the pass stopped before draining its claimed set
    /// (transient failure, session budget, or a storage error)
    pub aborted: bool,
    pub outcomes: Vec<OrderOutcome>,
}

impl SyncReport {
    /// Build a report from per-order outcomes, tallying the counters
    pub fn from_outcomes(
        session_id: String,
        trigger: SyncTrigger,
        started_at: i64,
        finished_at: i64,
        outcomes: Vec<OrderOutcome>,
        aborted: bool,
    ) -> Self {
        let mut synced = 0;
        let mut transient_failures = 0;
        let mut permanent_failures = 0;
        let mut skipped = 0;
        for entry in &outcomes {
            match entry.outcome {
                SyncOutcome::Synced => synced += 1,
                SyncOutcome::TransientFailure => transient_failures += 1,
                SyncOutcome::PermanentFailure => permanent_failures += 1,
                SyncOutcome::Skipped => skipped += 1,
            }
        }
        Self {
            session_id,
            trigger,
            started_at,
            finished_at,
            synced,
            transient_failures,
            permanent_failures,
            skipped,
            aborted,
            outcomes,
        }
    }

    /// Submission attempts actually made during the pass
    pub fn attempted(&self) -> u32 {
        self.synced + self.transient_failures + self.permanent_failures
    }
}

/// Response to a manual sync trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncTriggerResponse {
    /// True when the request joined a pass that was already running
    pub joined: bool,
    pub report: SyncReport,
}

/// Response to a discard request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscardResponse {
    pub uid: String,
    /// False when the uid was not buffered (discard is idempotent)
    pub removed: bool,
}

/// Response to a recover request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoverResponse {
    /// Failed records returned to pending
    pub recovered: u64,
}
