//! HTTP server lifecycle
//!
//! Binds the local API, spawns the background tasks, and tears both down
//! on ctrl-c. The buffer database is opened before the listener so a
//! corrupt store fails the boot instead of surfacing per request.

use std::net::SocketAddr;

use tokio_util::sync::CancellationToken;

use crate::api;
use crate::core::{AppState, Config};
use crate::utils::{AppError, AppResult};

pub struct Server {
    config: Config,
    state: Option<AppState>,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self { config, state: None }
    }

    /// Use pre-assembled state instead of initializing from the config
    pub fn with_state(config: Config, state: AppState) -> Self {
        Self { config, state: Some(state) }
    }

    pub async fn run(&self) -> AppResult<()> {
        let state = match &self.state {
            Some(state) => state.clone(),
            None => AppState::initialize(&self.config)?,
        };

        let shutdown = CancellationToken::new();
        let tasks = state.start_background_tasks(shutdown.clone());

        let app = api::build_app(state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;
        tracing::info!(port = self.config.http_port, "Spool daemon listening");

        let signal_token = shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("Shutdown signal received");
                signal_token.cancel();
            })
            .await
            .map_err(|e| AppError::internal(format!("HTTP server error: {e}")))?;

        // The HTTP side is down; stop the workers and let the final
        // flush finish
        shutdown.cancel();
        for task in tasks {
            let _ = task.await;
        }
        tracing::info!("Spool daemon stopped");

        Ok(())
    }
}
