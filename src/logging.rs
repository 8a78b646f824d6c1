//! Console + daily rolling file logging.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError, EnvFilter,
};

/// Rolling log files kept in the log directory.
pub const MAX_LOG_FILES: usize = 10;

const LOG_FILE_PREFIX: &str = "pos-offline";
const DEFAULT_FILTER: &str = "info,pos_offline=debug";

/// Install the global subscriber. Keep the returned guard alive for the
/// lifetime of the process; dropping it flushes and closes the file writer.
pub fn init_logging(log_dir: &Path) -> Result<WorkerGuard, TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    prune_old_logs(log_dir);
    if let Err(e) = fs::create_dir_all(log_dir) {
        eprintln!("failed to create log dir {}: {e}", log_dir.display());
    }

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);
    let console_layer = fmt::layer().with_target(true);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

/// Remove all but the newest [`MAX_LOG_FILES`] log files in `log_dir`.
pub fn prune_old_logs(log_dir: &Path) {
    if !log_dir.exists() {
        return;
    }

    let mut log_files: Vec<(PathBuf, SystemTime)> = Vec::new();
    if let Ok(entries) = fs::read_dir(log_dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            let is_log = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| name.starts_with(LOG_FILE_PREFIX));
            if path.is_file() && is_log {
                let modified = entry
                    .metadata()
                    .ok()
                    .and_then(|m| m.modified().ok())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                log_files.push((path, modified));
            }
        }
    }

    // Newest first
    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    for (path, _) in log_files.iter().skip(MAX_LOG_FILES) {
        if let Err(e) = fs::remove_file(path) {
            warn!("Failed to prune log file {}: {e}", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn temp_log_dir() -> PathBuf {
        std::env::temp_dir().join(format!("pos-offline-logs-{}", uuid::Uuid::new_v4()))
    }

    fn count_logs(dir: &Path) -> usize {
        fs::read_dir(dir)
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with(LOG_FILE_PREFIX))
            .count()
    }

    #[test]
    fn test_prune_keeps_newest_and_ignores_other_files() {
        let dir = temp_log_dir();
        fs::create_dir_all(&dir).unwrap();
        for day in 1..=MAX_LOG_FILES + 3 {
            fs::write(dir.join(format!("{LOG_FILE_PREFIX}.2026-01-{day:02}")), "x").unwrap();
        }
        fs::write(dir.join("offline.db"), "").unwrap();

        prune_old_logs(&dir);

        assert_eq!(count_logs(&dir), MAX_LOG_FILES);
        assert!(dir.join("offline.db").exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_prune_missing_dir_is_noop() {
        prune_old_logs(&temp_log_dir());
    }

    #[test]
    #[serial]
    fn test_init_logging_installs_once() {
        let dir = temp_log_dir();

        let guard = init_logging(&dir);
        assert!(guard.is_ok());
        assert!(dir.is_dir());
        assert!(init_logging(&dir).is_err());

        drop(guard);
        let _ = fs::remove_dir_all(&dir);
    }
}
