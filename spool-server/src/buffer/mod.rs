//! Local durable store for orders awaiting submission
//!
//! The buffer is the source of truth while the terminal is offline:
//! finalized orders land here first and only leave once the upstream
//! ingestion service has accepted them.

mod store;

pub use store::{OrderStore, StoreError, StoreResult};
