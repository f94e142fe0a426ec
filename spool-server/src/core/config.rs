//! Server configuration
//!
//! Everything comes from environment variables (a `.env` file is loaded
//! at startup when present):
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `WORK_DIR` | `/var/lib/spool` | Buffer database and runtime files |
//! | `HTTP_PORT` | `3050` | Local API port |
//! | `INGEST_URL` | `http://localhost:9800` | Upstream ingestion service base URL |
//! | `INGEST_TIMEOUT_MS` | `10000` | Per-submission request timeout |
//! | `RETRY_CEILING` | `3` | Transient failures per order before parking it |
//! | `BACKOFF_BASE_MS` | `5000` | First retry delay after a failed pass |
//! | `BACKOFF_MAX_MS` | `60000` | Retry delay cap |
//! | `SUBMIT_PACING_MS` | `2000` | Gap between consecutive submissions in a pass |
//! | `SESSION_BUDGET_MS` | `150000` | Wall-clock cap for one sync pass |
//! | `RESCAN_INTERVAL_SECS` | `60` | Periodic backlog rescan |
//! | `PROBE_INTERVAL_SECS` | `15` | Connectivity probe period |
//! | `PROBE_TIMEOUT_MS` | `3000` | Connectivity probe timeout |
//! | `ONLINE_DEBOUNCE_MS` | `500` | Settle window after coming back online |
//! | `ENVIRONMENT` | `development` | `development` or `production` |
//! | `LOG_LEVEL` | `info` | trace / debug / info / warn / error |
//! | `LOG_DIR` | unset | When set, log to daily-rolled files there |

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::sync::Backoff;

/// Runtime configuration, assembled once at startup
#[derive(Debug, Clone)]
pub struct Config {
    pub work_dir: String,
    pub http_port: u16,
    pub ingest_url: String,
    pub ingest_timeout_ms: u64,
    pub retry_ceiling: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub submit_pacing_ms: u64,
    pub session_budget_ms: u64,
    pub rescan_interval_secs: u64,
    pub probe_interval_secs: u64,
    pub probe_timeout_ms: u64,
    pub online_debounce_ms: u64,
    pub environment: String,
    pub log_level: String,
    pub log_dir: Option<String>,
}

impl Config {
    /// Read configuration from the environment
    pub fn from_env() -> Self {
        Self {
            work_dir: env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/spool".to_string()),
            http_port: env_parse("HTTP_PORT", 3050),
            ingest_url: env::var("INGEST_URL")
                .unwrap_or_else(|_| "http://localhost:9800".to_string()),
            ingest_timeout_ms: env_parse("INGEST_TIMEOUT_MS", 10_000),
            retry_ceiling: env_parse("RETRY_CEILING", 3),
            backoff_base_ms: env_parse("BACKOFF_BASE_MS", 5_000),
            backoff_max_ms: env_parse("BACKOFF_MAX_MS", 60_000),
            submit_pacing_ms: env_parse("SUBMIT_PACING_MS", 2_000),
            session_budget_ms: env_parse("SESSION_BUDGET_MS", 150_000),
            rescan_interval_secs: env_parse("RESCAN_INTERVAL_SECS", 60),
            probe_interval_secs: env_parse("PROBE_INTERVAL_SECS", 15),
            probe_timeout_ms: env_parse("PROBE_TIMEOUT_MS", 3_000),
            online_debounce_ms: env_parse("ONLINE_DEBOUNCE_MS", 500),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_dir: env::var("LOG_DIR").ok(),
        }
    }

    /// Configuration for tests: defaults with the fields that matter
    /// overridden, no environment involved
    pub fn with_overrides(work_dir: &str, http_port: u16, ingest_url: &str) -> Self {
        Self {
            work_dir: work_dir.to_string(),
            http_port,
            ingest_url: ingest_url.to_string(),
            ingest_timeout_ms: 10_000,
            retry_ceiling: 3,
            backoff_base_ms: 5_000,
            backoff_max_ms: 60_000,
            submit_pacing_ms: 2_000,
            session_budget_ms: 150_000,
            rescan_interval_secs: 60,
            probe_interval_secs: 15,
            probe_timeout_ms: 3_000,
            online_debounce_ms: 500,
            environment: "development".to_string(),
            log_level: "info".to_string(),
            log_dir: None,
        }
    }

    /// Path of the buffer database file
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("orders.redb")
    }

    /// Backoff schedule derived from the configured delays
    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.backoff_base_ms),
            Duration::from_millis(self.backoff_max_ms),
        )
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        !self.is_production()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
