//! File-based logging with tracing integration
//!
//! One timestamped file per run. Every event is flushed as it is written so the
//! file stays useful if the process is killed mid-phase.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::Local;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use super::LOG_FILE_PREFIX;

/// Filter used when `RUST_LOG` is not set
const DEFAULT_FILTER: &str = "pomotrack=info";

/// Information about the current log file
#[derive(Debug, Clone)]
pub struct LogFileInfo {
    /// Full path to the log file
    pub path: PathBuf,
}

/// Generate a timestamped log file path
pub fn create_log_file_path(logs_dir: &Path) -> PathBuf {
    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    logs_dir.join(format!("{}{}.log", LOG_FILE_PREFIX, timestamp))
}

/// Writes straight through to the shared log file
struct FlushingWriter {
    file: Arc<Mutex<File>>,
}

impl Write for FlushingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Ok(mut file) = self.file.lock() {
            file.write_all(buf)?;
            file.flush()?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self.file.lock() {
            Ok(mut file) => file.flush(),
            Err(_) => Ok(()),
        }
    }
}

/// Writer factory for tracing-subscriber
struct FlushingWriterMaker {
    file: Arc<Mutex<File>>,
}

impl<'a> MakeWriter<'a> for FlushingWriterMaker {
    type Writer = FlushingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        FlushingWriter {
            file: Arc::clone(&self.file),
        }
    }
}

/// Guard that keeps the log file open
pub struct LoggingGuard {
    _file: Arc<Mutex<File>>,
}

fn env_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into())
}

/// Initialize file logging
///
/// Returns the log file info and a guard that must be kept alive for the duration of logging.
pub fn init_file_logging(logs_dir: &Path) -> Result<(LogFileInfo, LoggingGuard)> {
    fs::create_dir_all(logs_dir).context("Failed to create logs directory")?;

    let log_path = create_log_file_path(logs_dir);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .context("Failed to open log file")?;
    let file = Arc::new(Mutex::new(file));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(FlushingWriterMaker {
            file: Arc::clone(&file),
        })
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(file_layer)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    Ok((LogFileInfo { path: log_path }, LoggingGuard { _file: file }))
}
