//! Session ledger
//!
//! Append-style record of every timer phase that was started, with its
//! outcome. The timer writes to it on a best-effort basis: a failed write is
//! logged by the caller and never affects timing.

pub mod background;
pub mod memory;
pub mod stats;
pub mod store;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::timer::{ActivePhase, Millis};

pub use background::BackgroundLedger;
pub use memory::MemoryLedger;
pub use store::JsonLedger;

/// Unique identifier for a ledger entry
pub type SessionId = Uuid;

/// Unique identifier for a task a focus phase is attributed to
pub type TaskId = Uuid;

/// Stable task id for a free-form task label
///
/// Labels are trimmed and compared case-insensitively, so `Report` and
/// ` report ` name the same task across runs.
pub fn task_id_for(label: &str) -> TaskId {
    let normalized = label.trim().to_lowercase();
    Uuid::new_v5(&Uuid::NAMESPACE_OID, normalized.as_bytes())
}

/// Errors raised by ledger implementations
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("ledger data is malformed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no session with id {0}")]
    NotFound(SessionId),
    #[error("ledger write queue is full")]
    QueueFull,
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Convenience alias for ledger results
pub type LedgerResult<T> = Result<T, LedgerError>;

/// One recorded timer phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEntry {
    pub id: SessionId,
    /// Task the focus phase was attributed to
    #[serde(default)]
    pub task_id: Option<TaskId>,
    pub kind: ActivePhase,
    /// Configured phase length
    pub duration_secs: u64,
    /// Milliseconds since the Unix epoch
    pub start_time: Millis,
    /// Set when the entry is closed
    #[serde(default)]
    pub end_time: Option<Millis>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub interrupted: bool,
}

impl SessionEntry {
    /// A freshly opened entry
    pub fn open(
        id: SessionId,
        kind: ActivePhase,
        task_id: Option<TaskId>,
        duration_secs: u64,
        start_time: Millis,
    ) -> Self {
        Self {
            id,
            task_id,
            kind,
            duration_secs,
            start_time,
            end_time: None,
            completed: false,
            interrupted: false,
        }
    }

    /// Phase length in whole minutes, rounded up
    pub fn duration_minutes(&self) -> u64 {
        self.duration_secs.div_ceil(60)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.start_time as i64)
    }

    /// Record how the phase ended
    pub fn close(&mut self, close: &SessionClose) {
        self.end_time = Some(close.end_time);
        self.completed = close.outcome == SessionOutcome::Completed;
        self.interrupted = close.outcome == SessionOutcome::Interrupted;
    }
}

/// How a phase ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    /// Ran to natural expiry
    Completed,
    /// Stopped, reset or replaced before expiry
    Interrupted,
}

/// Closing record for an open entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionClose {
    pub outcome: SessionOutcome,
    pub end_time: Millis,
}

impl SessionClose {
    pub fn completed(end_time: Millis) -> Self {
        Self {
            outcome: SessionOutcome::Completed,
            end_time,
        }
    }

    pub fn interrupted(end_time: Millis) -> Self {
        Self {
            outcome: SessionOutcome::Interrupted,
            end_time,
        }
    }
}

/// A single ledger mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerOp {
    Open(SessionEntry),
    Close(SessionId, SessionClose),
}

impl LedgerOp {
    /// Apply this mutation to a ledger
    pub fn apply(&self, ledger: &dyn SessionLedger) -> LedgerResult<()> {
        match self {
            LedgerOp::Open(entry) => ledger.open(entry),
            LedgerOp::Close(id, close) => ledger.close(*id, *close),
        }
    }

    /// Id of the entry this mutation targets
    pub fn session_id(&self) -> SessionId {
        match self {
            LedgerOp::Open(entry) => entry.id,
            LedgerOp::Close(id, _) => *id,
        }
    }
}

/// Storage backend for session entries
///
/// `open` and `close` are the only mutations, each keyed by a single id.
pub trait SessionLedger: Send + Sync {
    /// Record a newly started phase
    fn open(&self, entry: &SessionEntry) -> LedgerResult<()>;

    /// Close a previously opened entry
    fn close(&self, id: SessionId, close: SessionClose) -> LedgerResult<()>;

    /// All recorded entries, oldest first
    fn entries(&self) -> LedgerResult<Vec<SessionEntry>>;
}
