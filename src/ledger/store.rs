//! File-backed session ledger
//!
//! Stores every session entry as a JSON array for history and statistics.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use crate::config::config_dir;
use crate::timer::Millis;

use super::{LedgerError, LedgerResult, SessionClose, SessionEntry, SessionId, SessionLedger};

const SESSIONS_FILE: &str = "sessions.json";

/// Ledger persisted to `~/.pomotrack/sessions.json`
#[derive(Debug)]
pub struct JsonLedger {
    store_path: PathBuf,
    /// Serializes read-modify-write cycles on the file
    io_lock: Mutex<()>,
}

impl JsonLedger {
    /// Ledger at the default location
    pub fn new() -> Self {
        Self::with_path(config_dir().join(SESSIONS_FILE))
    }

    /// Ledger at a custom path (for testing)
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            store_path: path,
            io_lock: Mutex::new(()),
        }
    }

    /// Get the path to the store file
    pub fn path(&self) -> &Path {
        &self.store_path
    }

    /// Drop closed entries that ended more than `retention_days` ago
    ///
    /// Returns the number of entries removed.
    pub fn prune_older_than(&self, retention_days: u64) -> LedgerResult<usize> {
        let _guard = self.lock();
        let mut entries = self.load()?;
        let cutoff = Utc::now() - chrono::Duration::days(retention_days as i64);
        let cutoff_ms = cutoff.timestamp_millis().max(0) as u64;
        let original_count = entries.len();

        entries.retain(|e| e.end_time.map_or(true, |end| end >= cutoff_ms));

        let pruned = original_count - entries.len();
        if pruned > 0 {
            self.save(&entries)?;
        }

        Ok(pruned)
    }

    /// Close every entry still open, as interrupted at `now`
    ///
    /// Only one phase runs at a time, so at startup any open entry belongs to
    /// a previous run that ended without closing it. Returns the number closed.
    pub fn close_abandoned(&self, now: Millis) -> LedgerResult<usize> {
        let _guard = self.lock();
        let mut entries = self.load()?;
        let close = SessionClose::interrupted(now);

        let mut closed = 0;
        for entry in entries.iter_mut().filter(|e| e.is_open()) {
            tracing::info!(session_id = %entry.id, "Closing session abandoned by a previous run");
            entry.close(&close);
            closed += 1;
        }

        if closed > 0 {
            self.save(&entries)?;
        }
        Ok(closed)
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.io_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn load(&self) -> LedgerResult<Vec<SessionEntry>> {
        if !self.store_path.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&self.store_path)?;

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, entries: &[SessionEntry]) -> LedgerResult<()> {
        if let Some(parent) = self.store_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.store_path, content)?;
        Ok(())
    }
}

impl Default for JsonLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionLedger for JsonLedger {
    fn open(&self, entry: &SessionEntry) -> LedgerResult<()> {
        let _guard = self.lock();
        let mut entries = self.load()?;
        entries.push(entry.clone());
        self.save(&entries)
    }

    fn close(&self, id: SessionId, close: SessionClose) -> LedgerResult<()> {
        let _guard = self.lock();
        let mut entries = self.load()?;
        let entry = entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(LedgerError::NotFound(id))?;
        entry.close(&close);
        self.save(&entries)
    }

    fn entries(&self) -> LedgerResult<Vec<SessionEntry>> {
        let _guard = self.lock();
        self.load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::ActivePhase;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn test_ledger(temp_dir: &TempDir) -> JsonLedger {
        JsonLedger::with_path(temp_dir.path().join(SESSIONS_FILE))
    }

    fn focus_entry(start_time: u64) -> SessionEntry {
        SessionEntry::open(
            Uuid::new_v4(),
            ActivePhase::Focus,
            Some(Uuid::new_v4()),
            1500,
            start_time,
        )
    }

    #[test]
    fn test_load_empty() {
        let temp_dir = TempDir::new().unwrap();
        let ledger = test_ledger(&temp_dir);

        assert!(ledger.entries().unwrap().is_empty());
    }

    #[test]
    fn test_blank_file_reads_as_empty() {
        let temp_dir = TempDir::new().unwrap();
        let ledger = test_ledger(&temp_dir);
        std::fs::write(ledger.path(), "  \n").unwrap();

        assert!(ledger.entries().unwrap().is_empty());
    }

    #[test]
    fn test_open_then_close() {
        let temp_dir = TempDir::new().unwrap();
        let ledger = test_ledger(&temp_dir);
        let entry = focus_entry(1_000);

        ledger.open(&entry).unwrap();
        ledger
            .close(entry.id, SessionClose::completed(1_501_000))
            .unwrap();

        let loaded = ledger.entries().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, entry.id);
        assert_eq!(loaded[0].task_id, entry.task_id);
        assert!(loaded[0].completed);
        assert_eq!(loaded[0].end_time, Some(1_501_000));
    }

    #[test]
    fn test_close_unknown_id() {
        let temp_dir = TempDir::new().unwrap();
        let ledger = test_ledger(&temp_dir);
        ledger.open(&focus_entry(0)).unwrap();

        let result = ledger.close(Uuid::new_v4(), SessionClose::interrupted(10));
        assert!(matches!(result, Err(LedgerError::NotFound(_))));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let ledger = test_ledger(&temp_dir);
        std::fs::write(ledger.path(), "{not json").unwrap();

        assert!(matches!(ledger.entries(), Err(LedgerError::Json(_))));
    }

    #[test]
    fn test_creates_missing_parent_directory() {
        let temp_dir = TempDir::new().unwrap();
        let ledger = JsonLedger::with_path(temp_dir.path().join("nested").join(SESSIONS_FILE));

        ledger.open(&focus_entry(0)).unwrap();
        assert_eq!(ledger.entries().unwrap().len(), 1);
    }

    #[test]
    fn test_prune_keeps_open_and_recent_entries() {
        let temp_dir = TempDir::new().unwrap();
        let ledger = test_ledger(&temp_dir);
        let now_ms = Utc::now().timestamp_millis() as u64;
        let day_ms = 24 * 60 * 60 * 1000;

        let old = focus_entry(now_ms - 40 * day_ms);
        let recent = focus_entry(now_ms - day_ms);
        let still_open = focus_entry(now_ms - 50 * day_ms);

        ledger.open(&old).unwrap();
        ledger.open(&recent).unwrap();
        ledger.open(&still_open).unwrap();
        ledger
            .close(old.id, SessionClose::completed(now_ms - 40 * day_ms + 1))
            .unwrap();
        ledger
            .close(recent.id, SessionClose::interrupted(now_ms - day_ms + 1))
            .unwrap();

        assert_eq!(ledger.prune_older_than(30).unwrap(), 1);

        let remaining: Vec<_> = ledger.entries().unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(remaining, vec![recent.id, still_open.id]);
    }

    #[test]
    fn test_close_abandoned_only_touches_open_entries() {
        let temp_dir = TempDir::new().unwrap();
        let ledger = test_ledger(&temp_dir);

        let finished = focus_entry(1_000);
        let abandoned = focus_entry(2_000_000);
        ledger.open(&finished).unwrap();
        ledger
            .close(finished.id, SessionClose::completed(1_501_000))
            .unwrap();
        ledger.open(&abandoned).unwrap();

        assert_eq!(ledger.close_abandoned(9_000_000).unwrap(), 1);

        let entries = ledger.entries().unwrap();
        let finished_now = entries.iter().find(|e| e.id == finished.id).unwrap();
        assert!(finished_now.completed);
        assert_eq!(finished_now.end_time, Some(1_501_000));

        let abandoned_now = entries.iter().find(|e| e.id == abandoned.id).unwrap();
        assert!(abandoned_now.interrupted);
        assert!(!abandoned_now.completed);
        assert_eq!(abandoned_now.end_time, Some(9_000_000));

        // Nothing left to close on a second pass
        assert_eq!(ledger.close_abandoned(9_500_000).unwrap(), 0);
    }

    #[test]
    fn test_close_abandoned_without_file() {
        let temp_dir = TempDir::new().unwrap();
        let ledger = test_ledger(&temp_dir);

        assert_eq!(ledger.close_abandoned(0).unwrap(), 0);
        assert!(!ledger.path().exists());
    }
}
