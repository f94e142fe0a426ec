//! Spool client: typed HTTP SDK for the spool daemon
//!
//! The surface a till or back-office UI needs: buffer orders, trigger a
//! sync pass, poll the status snapshot, and manage parked records.
//!
//! ```no_run
//! use spool_client::{ClientConfig, SpoolClient};
//!
//! # async fn example() -> Result<(), spool_client::ClientError> {
//! let client = SpoolClient::new(&ClientConfig::new("http://127.0.0.1:3050"));
//! client.buffer_order("order-42", serde_json::json!({"total": 18.0})).await?;
//! let status = client.status().await?;
//! println!("pending: {}", status.pending);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod http;

pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use http::SpoolClient;

// Re-export the shared types callers handle
pub use shared::order::{BufferOrderResponse, PendingOrder, SyncState};
pub use shared::status::{
    DiscardResponse, RecoverResponse, StatusSnapshot, SyncOutcome, SyncReport, SyncTriggerResponse,
};
