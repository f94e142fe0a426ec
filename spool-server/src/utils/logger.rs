//! Logging initialization
//!
//! Console logging by default; when a log directory is supplied (and
//! exists) output goes to a daily-rolled file instead.

use std::path::Path;
use std::time::{Duration, SystemTime};

/// Initialize console logging with defaults
pub fn init_logger() {
    init_logger_with_file(None, None);
}

/// Initialize logging, optionally writing to a daily-rolled file
///
/// * `log_level` - "trace" | "debug" | "info" | "warn" | "error" (default "info")
/// * `log_dir` - when set and the directory exists, log to `<dir>/spool-server.<date>`
pub fn init_logger_with_file(log_level: Option<&str>, log_dir: Option<&str>) {
    let level = log_level.unwrap_or("info");

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level.parse().unwrap_or(tracing::Level::INFO))
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(false);

    if let Some(dir) = log_dir {
        let log_path = Path::new(dir);
        if log_path.exists()
            && let Some(dir_str) = log_path.to_str()
        {
            let file_appender = tracing_appender::rolling::daily(dir_str, "spool-server");
            subscriber.with_writer(file_appender).init();
            return;
        }
    }

    subscriber.init();
}

/// Remove rolled log files older than `days`; returns how many were deleted
pub fn cleanup_old_logs(log_dir: &str, days: u64) -> std::io::Result<usize> {
    let cutoff = SystemTime::now() - Duration::from_secs(days * 24 * 60 * 60);
    let mut removed = 0;

    for entry in std::fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if !entry.file_name().to_string_lossy().starts_with("spool-server") {
            continue;
        }
        if let Ok(modified) = entry.metadata()?.modified()
            && modified < cutoff
        {
            std::fs::remove_file(&path)?;
            removed += 1;
        }
    }

    Ok(removed)
}
