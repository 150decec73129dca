//! In-process session ledger
//!
//! Keeps entries in memory and records every write it receives. Writes can be
//! made to fail on demand, which is how the timer's best-effort handling is
//! exercised.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::{
    LedgerError, LedgerOp, LedgerResult, SessionClose, SessionEntry, SessionId, SessionLedger,
};

#[derive(Debug, Default)]
struct Inner {
    entries: Vec<SessionEntry>,
    ops: Vec<LedgerOp>,
}

/// Ledger held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryLedger {
    inner: Mutex<Inner>,
    fail_writes: AtomicBool,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `open`/`close` calls fail (the attempt is still logged)
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Every write attempt received so far, in order
    pub fn ops(&self) -> Vec<LedgerOp> {
        self.lock().ops.clone()
    }

    /// Entries currently open
    pub fn open_entries(&self) -> Vec<SessionEntry> {
        self.lock()
            .entries
            .iter()
            .filter(|e| e.is_open())
            .cloned()
            .collect()
    }

    /// Look up one entry
    pub fn get(&self, id: SessionId) -> Option<SessionEntry> {
        self.lock().entries.iter().find(|e| e.id == id).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_writable(&self) -> LedgerResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(LedgerError::Unavailable("writes disabled".to_string()))
        } else {
            Ok(())
        }
    }
}

impl SessionLedger for MemoryLedger {
    fn open(&self, entry: &SessionEntry) -> LedgerResult<()> {
        let mut inner = self.lock();
        inner.ops.push(LedgerOp::Open(entry.clone()));
        self.check_writable()?;
        inner.entries.push(entry.clone());
        Ok(())
    }

    fn close(&self, id: SessionId, close: SessionClose) -> LedgerResult<()> {
        let mut inner = self.lock();
        inner.ops.push(LedgerOp::Close(id, close));
        self.check_writable()?;
        let entry = inner
            .entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(LedgerError::NotFound(id))?;
        entry.close(&close);
        Ok(())
    }

    fn entries(&self) -> LedgerResult<Vec<SessionEntry>> {
        Ok(self.lock().entries.clone())
    }
}
