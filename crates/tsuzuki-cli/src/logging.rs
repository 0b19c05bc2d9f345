use std::path::Path;
use std::time::{Duration, SystemTime};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tsuzuki_core::config::AppConfig;

const LOG_FILE: &str = "tsuzuki.log";
const KEEP_DAYS: u64 = 7;

/// Console + daily file logging. Keep the guard alive until exit or the file
/// layer stops flushing.
pub fn init_logging() -> WorkerGuard {
    let log_dir = AppConfig::log_dir();
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: failed to create log directory: {e}");
    }

    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tsuzuki=debug"));

    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::debug!(dir = %log_dir.display(), version = env!("CARGO_PKG_VERSION"), "Logging initialized");

    cleanup_old_logs(&log_dir, KEEP_DAYS);
    guard
}

fn cleanup_old_logs(log_dir: &Path, keep_days: u64) {
    let cutoff = SystemTime::now() - Duration::from_secs(keep_days * 24 * 60 * 60);

    let entries = match std::fs::read_dir(log_dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read log directory for cleanup");
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let rotated = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.starts_with(LOG_FILE) && name != LOG_FILE);
        if !rotated {
            continue;
        }

        let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
            continue;
        };
        if modified < cutoff {
            match std::fs::remove_file(&path) {
                Ok(()) => tracing::debug!(path = %path.display(), "Removed old log file"),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove old log file"),
            }
        }
    }
}
