//! Logging for pomotrack
//!
//! File-based logging with retention. Nothing is written to the terminal, which
//! belongs to the line-command driver.

mod file_writer;
mod retention;

pub use file_writer::{init_file_logging, LogFileInfo, LoggingGuard};
pub use retention::cleanup_old_logs;

/// Every log file name starts with this
pub(crate) const LOG_FILE_PREFIX: &str = "pomotrack-";
