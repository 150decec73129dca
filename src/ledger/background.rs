//! Non-blocking ledger adapter
//!
//! Queues ledger writes on a bounded channel and applies them, in order, on a
//! background task. `open`/`close` return as soon as the write is queued, so a
//! slow disk never holds up a timer transition.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::{
    LedgerError, LedgerOp, LedgerResult, SessionClose, SessionEntry, SessionId, SessionLedger,
};

/// Default number of writes that may be queued before new ones are dropped
pub const DEFAULT_QUEUE_SIZE: usize = 64;

enum Command {
    Write(LedgerOp),
    Flush(oneshot::Sender<()>),
}

/// Ledger that forwards writes to another ledger on a background task
#[derive(Clone)]
pub struct BackgroundLedger {
    sender: mpsc::Sender<Command>,
    inner: Arc<dyn SessionLedger>,
}

impl BackgroundLedger {
    /// Start the writer task
    ///
    /// Must be called from within a tokio runtime. The task exits once every
    /// clone of the returned ledger has been dropped.
    pub fn spawn(inner: Arc<dyn SessionLedger>, queue_size: usize) -> Self {
        let (sender, receiver) = mpsc::channel(queue_size.max(1));
        tokio::spawn(run_writer(Arc::clone(&inner), receiver));
        Self { sender, inner }
    }

    /// Wait until every write queued before this call has been applied
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.sender.send(Command::Flush(tx)).await.is_ok() {
            rx.await.ok();
        }
    }

    fn enqueue(&self, op: LedgerOp) -> LedgerResult<()> {
        match self.sender.try_send(Command::Write(op)) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(LedgerError::QueueFull),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(LedgerError::Unavailable(
                "ledger writer stopped".to_string(),
            )),
        }
    }
}

impl SessionLedger for BackgroundLedger {
    fn open(&self, entry: &SessionEntry) -> LedgerResult<()> {
        self.enqueue(LedgerOp::Open(entry.clone()))
    }

    fn close(&self, id: SessionId, close: SessionClose) -> LedgerResult<()> {
        self.enqueue(LedgerOp::Close(id, close))
    }

    /// Reads go straight to the wrapped ledger; call [`flush`](Self::flush)
    /// first to observe queued writes
    fn entries(&self) -> LedgerResult<Vec<SessionEntry>> {
        self.inner.entries()
    }
}

async fn run_writer(ledger: Arc<dyn SessionLedger>, mut receiver: mpsc::Receiver<Command>) {
    while let Some(command) = receiver.recv().await {
        match command {
            Command::Write(op) => {
                let session_id = op.session_id();
                let target = Arc::clone(&ledger);
                match tokio::task::spawn_blocking(move || op.apply(target.as_ref())).await {
                    Ok(Ok(())) => debug!(%session_id, "Ledger write applied"),
                    Ok(Err(e)) => warn!(%session_id, "Ledger write failed: {}", e),
                    Err(e) => warn!(%session_id, "Ledger write task aborted: {}", e),
                }
            }
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("Ledger writer stopped");
}
