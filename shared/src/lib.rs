//! Shared types for the Spool order buffer
//!
//! Types used on both sides of the daemon's local API: buffered order
//! records, sync state machine, status snapshots, sync reports, and the
//! response envelope.

pub mod order;
pub mod response;
pub mod status;
pub mod util;

// Re-export the common types
pub use order::{BufferOrderRequest, BufferOrderResponse, PendingOrder, SyncState};
pub use response::ApiResponse;
pub use status::{
    DiscardResponse, OrderOutcome, RecoverResponse, StateCounts, StatusSnapshot, SyncOutcome,
    SyncReport, SyncTrigger, SyncTriggerResponse,
};
