//! Log file retention management
//!
//! Old log files are deleted at startup based on their modification time.

use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use anyhow::Result;

use super::LOG_FILE_PREFIX;

/// Default retention period in days
pub const DEFAULT_RETENTION_DAYS: u64 = 7;

/// Clean up log files older than the retention period
///
/// Returns the number of files deleted.
pub fn cleanup_old_logs(logs_dir: &Path) -> Result<usize> {
    cleanup_old_logs_with_retention(logs_dir, DEFAULT_RETENTION_DAYS)
}

/// Clean up log files older than the specified number of days
///
/// Files that cannot be inspected or removed are skipped. Returns the number
/// of files deleted.
pub fn cleanup_old_logs_with_retention(logs_dir: &Path, retention_days: u64) -> Result<usize> {
    if !logs_dir.exists() {
        return Ok(0);
    }

    let cutoff = SystemTime::now()
        .checked_sub(Duration::from_secs(retention_days * 24 * 60 * 60))
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let mut deleted = 0;
    for entry in fs::read_dir(logs_dir)? {
        let path = entry?.path();
        if !is_log_file(&path) {
            continue;
        }

        let expired = fs::metadata(&path)
            .and_then(|m| m.modified())
            .map_or(false, |modified| modified < cutoff);
        if expired && fs::remove_file(&path).is_ok() {
            tracing::debug!(path = %path.display(), "Removed old log file");
            deleted += 1;
        }
    }

    Ok(deleted)
}

/// Only our own timestamped logs are ever deleted
fn is_log_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |name| name.starts_with(LOG_FILE_PREFIX) && name.ends_with(".log"))
}
