//! Spool: offline order spooler for point-of-sale terminals
//!
//! Finalized orders are written to a durable local buffer first and
//! drained to the upstream ingestion service in the background. When the
//! link is down the terminal keeps selling; when it comes back the
//! backlog is submitted in the order it was taken.
//!
//! # Module structure
//!
//! ```text
//! spool-server/src/
//! ├── core/          # Config, shared state, HTTP server lifecycle
//! ├── buffer/        # redb-backed durable order buffer
//! ├── sync/          # Coordinator, submitter seam, backoff, worker
//! ├── connectivity/  # Reachability monitor and prober
//! ├── api/           # Local HTTP API (intake, sync control, health)
//! └── utils/         # Error mapping, logging
//! ```

pub mod api;
pub mod buffer;
pub mod connectivity;
pub mod core;
pub mod sync;
pub mod utils;

pub use buffer::{OrderStore, StoreError};
pub use connectivity::{ConnectivityMonitor, ConnectivityProber};
pub use core::{AppState, Config, Server};
pub use sync::{HttpSubmitter, OrderSubmitter, SubmitError, SyncCoordinator, SyncWorker};
pub use utils::{AppError, AppResult};

use utils::logger;

/// Load `.env`, build the config, prepare the work directory, and
/// initialize logging. Returns the config the rest of boot runs on.
pub fn setup_environment() -> AppResult<Config> {
    // A .env file is optional; deployments set real environment variables
    dotenv::dotenv().ok();

    let config = Config::from_env();

    std::fs::create_dir_all(&config.work_dir).map_err(|e| {
        AppError::internal(format!("Failed to create work dir {}: {e}", config.work_dir))
    })?;

    logger::init_logger_with_file(Some(&config.log_level), config.log_dir.as_deref());

    if let Some(log_dir) = &config.log_dir {
        match logger::cleanup_old_logs(log_dir, 30) {
            Ok(0) => {}
            Ok(count) => tracing::info!(count, "Removed old log files"),
            Err(e) => tracing::warn!(error = %e, "Log cleanup failed"),
        }
    }

    api::health::mark_started();

    Ok(config)
}

/// Startup banner
pub fn print_banner() {
    println!(
        r#"
   _____ ____  ____  ____  __
  / ___// __ \/ __ \/ __ \/ /
  \__ \/ /_/ / / / / / / / /
 ___/ / ____/ /_/ / /_/ / /___
/____/_/    \____/\____/_____/
"#
    );
    println!("  Spool daemon v{}", env!("CARGO_PKG_VERSION"));
    println!();
}
