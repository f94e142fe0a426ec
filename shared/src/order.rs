//! Buffered order records and their sync state machine
//!
//! An order enters the buffer as `PENDING`, is claimed `IN_FLIGHT` for the
//! duration of one submission attempt, and either leaves the buffer on
//! success or returns to `PENDING` (transient failure) / parks as `FAILED`
//! (retry ceiling reached or permanent rejection).
//!
//! ```text
//!             claim                submit ok
//! PENDING ───────────► IN_FLIGHT ────────────► (removed, counted)
//!    ▲                     │
//!    │   transient error   │  permanent error / ceiling
//!    └─────────────────────┼──────────────────► FAILED
//!                          │                       │
//!                          └── release (skipped)   │ recover
//!                                                  ▼
//!                                               PENDING
//! ```

use serde::{Deserialize, Serialize};

use crate::util::now_millis;

/// Where a buffered order sits in its submission lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncState {
    /// Waiting for the next sync pass
    Pending,
    /// Claimed by the running sync pass
    InFlight,
    /// Accepted upstream (synced orders leave the buffer, so this state
    /// is only ever observed in reports, never in stored records)
    Synced,
    /// Parked: retry ceiling reached or rejected outright
    Failed,
}

impl SyncState {
    /// Wire name of the state, as used in query strings and JSON
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Pending => "PENDING",
            SyncState::InFlight => "IN_FLIGHT",
            SyncState::Synced => "SYNCED",
            SyncState::Failed => "FAILED",
        }
    }
}

/// One order waiting in the durable buffer
///
/// `uid` doubles as the idempotency key upstream: a record resubmitted
/// after a crash or a lost acknowledgement carries the same uid, so the
/// ingestion service can deduplicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOrder {
    /// Client-assigned unique order id
    pub uid: String,
    /// Opaque order document, forwarded verbatim to the ingestion service
    pub payload: serde_json::Value,
    /// Buffer entry time in epoch milliseconds; submission order follows it
    pub created_at: i64,
    /// Current lifecycle state
    pub state: SyncState,
    /// Failed submission attempts so far
    pub retry_count: u32,
    /// Message from the most recent failed attempt
    pub last_error: Option<String>,
}

impl PendingOrder {
    /// Fresh pending record stamped with the current time
    pub fn new(uid: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            uid: uid.into(),
            payload,
            created_at: now_millis(),
            state: SyncState::Pending,
            retry_count: 0,
            last_error: None,
        }
    }
}

/// Intake request: buffer one finalized order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferOrderRequest {
    pub uid: String,
    pub payload: serde_json::Value,
}

/// Intake result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferOrderResponse {
    pub uid: String,
    /// False when the uid was already buffered (duplicate intake is a no-op)
    pub buffered: bool,
    /// Pending records after this intake
    pub pending: u64,
}
