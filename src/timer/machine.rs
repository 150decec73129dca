//! Pomodoro timer state machine
//!
//! `PomodoroTimer` owns the single authoritative [`TimerState`]. Every
//! transition is applied synchronously, published to subscribers, and only then
//! written to the session ledger. Ledger and notifier failures are logged and
//! never surface to the caller.
//!
//! The machine does not own a real timer. It tracks whether its tick scheduler
//! should be running (`is_ticking`); whoever drives it calls [`PomodoroTimer::tick`]
//! about once a second while that is true. Remaining time is always derived
//! from the clock, so missed or late ticks cost nothing but display latency.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ledger::{LedgerOp, SessionClose, SessionEntry, SessionId, SessionLedger, TaskId};
use crate::notify::PhaseNotifier;

use super::{ActivePhase, Clock, ConfigError, ConfigUpdate, Millis, Phase, TimerConfig, TimerState};

/// The Pomodoro timer
pub struct PomodoroTimer {
    state: TimerState,
    clock: Arc<dyn Clock>,
    ledger: Arc<dyn SessionLedger>,
    notifier: Box<dyn PhaseNotifier>,
    publisher: watch::Sender<TimerState>,
    /// Whether the tick scheduler should be running
    ticking: bool,
    /// Task of the most recent focus phase, reused when a break auto-chains into focus
    last_focus_task: Option<TaskId>,
    /// Ledger writes produced by the transition in progress
    pending: Vec<LedgerOp>,
}

impl PomodoroTimer {
    /// Create an idle timer
    pub fn new(
        config: TimerConfig,
        clock: Arc<dyn Clock>,
        ledger: Arc<dyn SessionLedger>,
        notifier: Box<dyn PhaseNotifier>,
    ) -> Self {
        let state = TimerState::idle(config);
        let (publisher, _) = watch::channel(state.clone());
        Self {
            state,
            clock,
            ledger,
            notifier,
            publisher,
            ticking: false,
            last_focus_task: None,
            pending: Vec::new(),
        }
    }

    /// Current state
    pub fn state(&self) -> &TimerState {
        &self.state
    }

    /// Receive a snapshot on every state change
    pub fn subscribe(&self) -> watch::Receiver<TimerState> {
        self.publisher.subscribe()
    }

    /// Whether the tick scheduler should currently be running
    pub fn is_ticking(&self) -> bool {
        self.ticking
    }

    pub fn config(&self) -> &TimerConfig {
        &self.state.config
    }

    pub fn progress_percent(&self) -> f64 {
        self.state.progress_percent()
    }

    pub fn formatted_remaining(&self) -> String {
        self.state.formatted_remaining()
    }

    /// Start a focus phase, replacing whatever is running
    ///
    /// `override_secs` replaces the configured focus length for this phase only.
    pub fn start_focus(&mut self, task_id: Option<TaskId>, override_secs: Option<u64>) -> SessionId {
        let duration = override_secs.unwrap_or_else(|| self.state.config.focus_secs());
        let now = self.clock.now_ms();
        self.start_phase(ActivePhase::Focus, task_id, duration, now)
    }

    /// Start a short or long break, replacing whatever is running
    pub fn start_break(&mut self, is_long: bool) -> SessionId {
        let duration = self.state.config.break_secs(is_long);
        let now = self.clock.now_ms();
        self.start_phase(ActivePhase::break_phase(is_long), None, duration, now)
    }

    /// Suspend the running phase
    ///
    /// Returns false (and changes nothing) unless a phase is running.
    pub fn pause(&mut self) -> bool {
        let Some(active) = self.state.phase.active() else {
            debug!(phase = ?self.state.phase, "Ignoring pause: no running phase");
            return false;
        };

        let now = self.clock.now_ms();
        self.refresh_remaining(now);
        self.state.phase = Phase::Paused { resume_to: active };
        self.state.started_at = None;
        self.ticking = false;

        info!(
            phase = active.label(),
            remaining = self.state.remaining_seconds,
            "Timer paused"
        );
        self.commit();
        true
    }

    /// Continue the paused phase from where it stopped
    ///
    /// Returns false (and changes nothing) unless the timer is paused.
    pub fn resume(&mut self) -> bool {
        let Phase::Paused { resume_to } = self.state.phase else {
            debug!(phase = ?self.state.phase, "Ignoring resume: timer not paused");
            return false;
        };

        let now = self.clock.now_ms();

        if self.state.remaining_seconds == 0 {
            // Paused exactly at expiry: nothing left to run
            info!(phase = resume_to.label(), "Resumed with no time left, going idle");
            self.interrupt_open_session(now);
            self.go_idle(self.state.completed_focus_count);
            self.commit();
            return true;
        }

        let elapsed_ms = (self.state.total_seconds - self.state.remaining_seconds) * 1000;
        self.state.started_at = Some(now.saturating_sub(elapsed_ms));
        self.state.phase = resume_to.into();
        self.ticking = true;

        info!(
            phase = resume_to.label(),
            remaining = self.state.remaining_seconds,
            "Timer resumed"
        );
        self.commit();
        true
    }

    /// Abandon the current phase
    ///
    /// The open ledger entry is closed as interrupted. The completed focus
    /// count and config survive. Returns false when already idle.
    pub fn stop(&mut self) -> bool {
        if self.state.phase.is_idle() {
            debug!("Ignoring stop: timer already idle");
            return false;
        }

        let now = self.clock.now_ms();
        info!(phase = self.state.phase.label(), "Timer stopped");
        self.interrupt_open_session(now);
        self.last_focus_task = None;
        self.go_idle(self.state.completed_focus_count);
        self.commit();
        true
    }

    /// Stop and also clear the completed focus count
    ///
    /// Allowed from idle, where it only clears the count.
    pub fn reset(&mut self) {
        let now = self.clock.now_ms();
        info!(phase = self.state.phase.label(), "Timer reset");
        self.interrupt_open_session(now);
        self.last_focus_task = None;
        self.go_idle(0);
        self.commit();
    }

    /// Merge configuration changes
    ///
    /// A running phase keeps its length; the new values apply from the next
    /// phase start. A rejected batch changes nothing.
    pub fn update_config<I>(&mut self, updates: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = ConfigUpdate>,
    {
        self.state.config.merge(updates)?;
        info!(config = ?self.state.config, "Timer config updated");
        self.commit();
        Ok(())
    }

    /// Scheduler callback
    ///
    /// Recomputes remaining time from the clock, publishes it and handles
    /// natural expiry. Also the catch-up hook after the host was suspended:
    /// calling it at any time is safe, and it does nothing unless ticking.
    pub fn tick(&mut self) {
        if !self.ticking {
            return;
        }
        let Some(active) = self.state.phase.active() else {
            self.ticking = false;
            return;
        };

        let now = self.clock.now_ms();
        self.refresh_remaining(now);

        if self.state.remaining_seconds == 0 {
            self.expire(active, now);
        } else {
            self.commit();
        }
    }

    fn start_phase(
        &mut self,
        phase: ActivePhase,
        task_id: Option<TaskId>,
        duration_secs: u64,
        now: Millis,
    ) -> SessionId {
        self.interrupt_open_session(now);

        let session_id = Uuid::new_v4();
        self.state = TimerState {
            phase: phase.into(),
            total_seconds: duration_secs,
            remaining_seconds: duration_secs,
            started_at: Some(now),
            task_id,
            active_session_id: Some(session_id),
            completed_focus_count: self.state.completed_focus_count,
            config: self.state.config.clone(),
        };
        if phase == ActivePhase::Focus {
            self.last_focus_task = task_id;
        }
        self.ticking = true;

        self.pending.push(LedgerOp::Open(SessionEntry::open(
            session_id,
            phase,
            task_id,
            duration_secs,
            now,
        )));

        info!(
            phase = phase.label(),
            duration_secs,
            %session_id,
            task_id = ?task_id,
            "Phase started"
        );
        self.commit();
        session_id
    }

    /// Natural expiry of the running phase
    fn expire(&mut self, phase: ActivePhase, now: Millis) {
        self.ticking = false;
        let task_id = self.state.task_id;

        if let Some(id) = self.state.active_session_id.take() {
            self.pending
                .push(LedgerOp::Close(id, SessionClose::completed(now)));
        }
        if phase == ActivePhase::Focus {
            self.state.completed_focus_count += 1;
        }

        info!(
            phase = phase.label(),
            completed_focus = self.state.completed_focus_count,
            "Phase complete"
        );

        let config = self.state.config.clone();
        match phase {
            ActivePhase::Focus if config.auto_start_breaks => {
                let is_long = config.is_long_break_due(self.state.completed_focus_count);
                self.start_phase(
                    ActivePhase::break_phase(is_long),
                    None,
                    config.break_secs(is_long),
                    now,
                );
            }
            ActivePhase::ShortBreak | ActivePhase::LongBreak if config.auto_start_focus => {
                self.start_phase(
                    ActivePhase::Focus,
                    self.last_focus_task,
                    config.focus_secs(),
                    now,
                );
            }
            _ => {
                self.go_idle(self.state.completed_focus_count);
                self.commit();
                if let Err(e) = self.notifier.notify_phase_complete(phase, task_id) {
                    warn!("Phase completion notification failed: {:#}", e);
                }
            }
        }
    }

    fn go_idle(&mut self, completed_focus_count: u32) {
        self.ticking = false;
        self.state = TimerState {
            completed_focus_count,
            ..TimerState::idle(self.state.config.clone())
        };
    }

    /// Queue an interrupted close for the open ledger entry, if any
    fn interrupt_open_session(&mut self, now: Millis) {
        if let Some(id) = self.state.active_session_id.take() {
            self.pending
                .push(LedgerOp::Close(id, SessionClose::interrupted(now)));
        }
    }

    fn refresh_remaining(&mut self, now: Millis) {
        if let Some(started_at) = self.state.started_at {
            // A clock reading before the start counts as no time elapsed
            let elapsed_secs = now.saturating_sub(started_at) / 1000;
            self.state.remaining_seconds = self.state.total_seconds.saturating_sub(elapsed_secs);
        }
    }

    /// Publish the state, then hand queued writes to the ledger
    fn commit(&mut self) {
        let state = &self.state;
        self.publisher.send_if_modified(|current| {
            if current == state {
                false
            } else {
                *current = state.clone();
                true
            }
        });

        for op in std::mem::take(&mut self.pending) {
            if let Err(e) = op.apply(self.ledger.as_ref()) {
                warn!(
                    session_id = %op.session_id(),
                    "Session ledger write failed, continuing without it: {}",
                    e
                );
            }
        }
    }
}
