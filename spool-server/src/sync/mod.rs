//! Background synchronization of the order buffer
//!
//! ```text
//! ┌─────────────┐  triggers   ┌─────────────────┐  submit   ┌───────────────┐
//! │ SyncWorker  │ ──────────► │ SyncCoordinator │ ────────► │ OrderSubmitter│
//! │ (schedule)  │             │ (single-flight) │           │ (HTTP seam)   │
//! └─────────────┘             └─────────────────┘           └───────────────┘
//!        ▲                            │ transitions
//!        │ reachability               ▼
//! ┌─────────────┐             ┌─────────────────┐
//! │Connectivity │             │   OrderStore    │
//! │  Monitor    │             │  (redb buffer)  │
//! └─────────────┘             └─────────────────┘
//! ```

mod backoff;
mod coordinator;
mod submitter;
mod worker;

pub use backoff::Backoff;
pub use coordinator::{SessionHandle, SyncCoordinator};
pub use submitter::{HttpSubmitter, OrderSubmitter, SubmitError};
pub use worker::SyncWorker;
