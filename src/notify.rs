//! Phase completion notifications
//!
//! The timer calls a [`PhaseNotifier`] once when a phase expires without
//! auto-chaining, while it holds its own lock. [`ChannelNotifier`] only queues
//! the completion; [`deliver_completions`] rings the bell or logs it from its
//! own task. Failures are logged by the timer and otherwise ignored.

use anyhow::{anyhow, Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use crate::ledger::TaskId;
use crate::timer::ActivePhase;

/// Side channel invoked when a phase completes
pub trait PhaseNotifier: Send + Sync {
    fn notify_phase_complete(&self, phase: ActivePhase, task_id: Option<TaskId>) -> Result<()>;
}

/// A phase that ran to completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseCompletion {
    pub phase: ActivePhase,
    pub task_id: Option<TaskId>,
}

/// Forwards completions to an unbounded channel without blocking
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<PhaseCompletion>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PhaseCompletion>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl PhaseNotifier for ChannelNotifier {
    fn notify_phase_complete(&self, phase: ActivePhase, task_id: Option<TaskId>) -> Result<()> {
        self.sender
            .send(PhaseCompletion { phase, task_id })
            .map_err(|_| anyhow!("completion receiver dropped"))
    }
}

/// Does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentNotifier;

impl PhaseNotifier for SilentNotifier {
    fn notify_phase_complete(&self, _phase: ActivePhase, _task_id: Option<TaskId>) -> Result<()> {
        Ok(())
    }
}

/// How a completion reaches the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotificationMethod {
    /// Ring the terminal bell
    #[default]
    Bell,
    /// Log the completion only
    Log,
    None,
}

impl NotificationMethod {
    /// Parse the configured method name
    ///
    /// Unknown names disable notifications.
    pub fn from_config(method: &str) -> Self {
        match method {
            "bell" => Self::Bell,
            "log" => Self::Log,
            "none" => Self::None,
            other => {
                tracing::warn!("Unknown notification method '{}', notifications disabled", other);
                Self::None
            }
        }
    }
}

/// Deliver queued completions until every sender is gone
pub async fn deliver_completions(
    mut completions: mpsc::UnboundedReceiver<PhaseCompletion>,
    method: NotificationMethod,
) {
    while let Some(completion) = completions.recv().await {
        tracing::info!(
            task_id = ?completion.task_id,
            "{} complete",
            completion.phase.label()
        );
        if method == NotificationMethod::Bell {
            if let Err(e) = ring_bell().await {
                tracing::warn!("{:#}", e);
            }
        }
    }
}

async fn ring_bell() -> Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(b"\x07")
        .await
        .context("Failed to ring terminal bell")?;
    stdout.flush().await.context("Failed to ring terminal bell")
}
