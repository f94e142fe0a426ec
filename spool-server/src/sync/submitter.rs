//! Order submission to the upstream ingestion service
//!
//! Failures are classified at this seam and nowhere else:
//!
//! * `Transient` - the endpoint was unreachable, timed out, or answered
//!   with a retryable status (5xx, 429). Worth trying again later.
//! * `Permanent` - the endpoint understood the order and said no (other
//!   4xx). Retrying the same payload cannot change the verdict.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use shared::order::PendingOrder;
use std::time::Duration;
use thiserror::Error;

use crate::utils::AppError;

/// Classified submission failure
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("transient submission failure: {0}")]
    Transient(String),

    #[error("permanent submission rejection: {0}")]
    Permanent(String),
}

/// Upstream submission seam
///
/// The sync coordinator only sees this trait; tests swap in scripted
/// implementations.
#[async_trait]
pub trait OrderSubmitter: Send + Sync {
    /// Submit one buffered order.
    ///
    /// The order's uid is the idempotency key: resubmitting after a lost
    /// acknowledgement must be safe for implementations.
    async fn submit(&self, order: &PendingOrder) -> Result<(), SubmitError>;

    /// Cheap reachability probe against the same endpoint
    async fn ping(&self) -> bool;
}

/// HTTP submitter posting orders to the ingestion API
pub struct HttpSubmitter {
    client: Client,
    ingest_url: String,
    probe_timeout: Duration,
}

impl HttpSubmitter {
    pub fn new(
        ingest_url: String,
        timeout: Duration,
        probe_timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, ingest_url, probe_timeout })
    }
}

#[async_trait]
impl OrderSubmitter for HttpSubmitter {
    async fn submit(&self, order: &PendingOrder) -> Result<(), SubmitError> {
        let url = format!("{}/api/orders/ingest", self.ingest_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "uid": order.uid,
            "payload": order.payload,
            "created_at": order.created_at,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SubmitError::Transient(format!("ingest request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
            Err(SubmitError::Permanent(format!("ingest rejected order ({status}): {text}")))
        } else {
            Err(SubmitError::Transient(format!("ingest unavailable ({status}): {text}")))
        }
    }

    async fn ping(&self) -> bool {
        let url = format!("{}/health", self.ingest_url.trim_end_matches('/'));
        match self.client.get(&url).timeout(self.probe_timeout).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}
