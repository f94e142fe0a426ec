//! HTTP client for the spool daemon API

use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::order::{BufferOrderRequest, BufferOrderResponse, PendingOrder, SyncState};
use shared::response::ApiResponse;
use shared::status::{
    DiscardResponse, RecoverResponse, StatusSnapshot, SyncTriggerResponse,
};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Typed client over the daemon's local API
#[derive(Debug, Clone)]
pub struct SpoolClient {
    client: Client,
    base_url: String,
}

impl SpoolClient {
    pub fn new(config: &ClientConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout))
            .build()
            .expect("Failed to build HTTP client");

        Self { client, base_url: config.base_url.clone() }
    }

    // ========== Order Buffer ==========

    /// Buffer a finalized order for background submission.
    ///
    /// Durable once this returns; buffering the same uid twice is a no-op
    /// reported through `buffered: false`.
    pub async fn buffer_order(
        &self,
        uid: &str,
        payload: serde_json::Value,
    ) -> ClientResult<BufferOrderResponse> {
        let request = BufferOrderRequest { uid: uid.to_string(), payload };
        let response: ApiResponse<BufferOrderResponse> =
            self.post("api/orders", &request).await?;
        Self::unwrap_data(response, "buffer result")
    }

    /// List buffered orders oldest first, optionally filtered by state
    pub async fn list_orders(&self, state: Option<SyncState>) -> ClientResult<Vec<PendingOrder>> {
        let path = match state {
            Some(state) => format!("api/orders?state={}", state.as_str()),
            None => "api/orders".to_string(),
        };
        let response: ApiResponse<Vec<PendingOrder>> = self.get(&path).await?;
        Self::unwrap_data(response, "order list")
    }

    /// Fetch one buffered order
    pub async fn get_order(&self, uid: &str) -> ClientResult<PendingOrder> {
        let response: ApiResponse<PendingOrder> =
            self.get(&format!("api/orders/{uid}")).await?;
        Self::unwrap_data(response, "order")
    }

    /// Discard a buffered order; idempotent
    pub async fn discard_order(&self, uid: &str) -> ClientResult<DiscardResponse> {
        let response: ApiResponse<DiscardResponse> =
            self.delete(&format!("api/orders/{uid}")).await?;
        Self::unwrap_data(response, "discard result")
    }

    // ========== Sync Control ==========

    /// Trigger a sync pass and wait for its report (the sync button)
    pub async fn trigger_sync(&self) -> ClientResult<SyncTriggerResponse> {
        let response: ApiResponse<SyncTriggerResponse> = self.post_empty("api/sync").await?;
        Self::unwrap_data(response, "sync report")
    }

    /// Last published status snapshot; cheap, never blocked by a pass
    pub async fn status(&self) -> ClientResult<StatusSnapshot> {
        let response: ApiResponse<StatusSnapshot> = self.get("api/sync/status").await?;
        Self::unwrap_data(response, "status snapshot")
    }

    /// Requeue permanently failed orders for a fresh set of retries
    pub async fn recover_failed(&self) -> ClientResult<RecoverResponse> {
        let response: ApiResponse<RecoverResponse> =
            self.post_empty("api/sync/recover").await?;
        Self::unwrap_data(response, "recover result")
    }

    // ========== Internals ==========

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let response = self.client.get(self.url(path)).send().await?;
        self.handle_response(response).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        self.handle_response(response).await
    }

    async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let response = self.client.post(self.url(path)).send().await?;
        self.handle_response(response).await
    }

    async fn delete<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let response = self.client.delete(self.url(path)).send().await?;
        self.handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> ClientResult<T> {
        let status = response.status();
        if status.is_success() {
            return response.json::<T>().await.map_err(Into::into);
        }

        // Error responses still carry the envelope; fall back to the raw
        // body when they do not parse
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiResponse<()>>(&body)
            .map(|envelope| envelope.message)
            .unwrap_or(body);

        Err(match status {
            StatusCode::NOT_FOUND => ClientError::NotFound(message),
            StatusCode::BAD_REQUEST => ClientError::Validation(message),
            _ => ClientError::Internal(message),
        })
    }

    fn unwrap_data<T>(response: ApiResponse<T>, what: &str) -> ClientResult<T> {
        response
            .data
            .ok_or_else(|| ClientError::InvalidResponse(format!("Missing {what} in response")))
    }
}
