//! Pomodoro timer
//!
//! This module provides:
//! - The phase model (`Phase`, `ActivePhase`) and the `TimerState` snapshot
//! - Derived read-only views (progress, `mm:ss` display)
//! - The `PomodoroTimer` state machine and its async `TimerService` driver

pub mod clock;
pub mod config;
pub mod machine;
pub mod service;

use serde::{Deserialize, Serialize};

use crate::ledger::{SessionId, TaskId};

pub use clock::{Clock, FakeClock, Millis, SystemClock};
pub use config::{ConfigError, ConfigUpdate, TimerConfig};
pub use machine::PomodoroTimer;
pub use service::TimerService;

/// A running leg of the Pomodoro cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivePhase {
    Focus,
    ShortBreak,
    LongBreak,
}

impl ActivePhase {
    /// Break phase for the given length
    pub fn break_phase(is_long: bool) -> Self {
        if is_long {
            ActivePhase::LongBreak
        } else {
            ActivePhase::ShortBreak
        }
    }

    pub fn is_break(&self) -> bool {
        !matches!(self, ActivePhase::Focus)
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            ActivePhase::Focus => "Focus",
            ActivePhase::ShortBreak => "Short break",
            ActivePhase::LongBreak => "Long break",
        }
    }
}

/// Current phase of the timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Phase {
    /// Nothing running
    #[default]
    Idle,
    Focus,
    ShortBreak,
    LongBreak,
    /// Suspended; `resume_to` is the phase that was running at pause time
    Paused { resume_to: ActivePhase },
}

impl Phase {
    /// The running phase, if any
    pub fn active(&self) -> Option<ActivePhase> {
        match self {
            Phase::Focus => Some(ActivePhase::Focus),
            Phase::ShortBreak => Some(ActivePhase::ShortBreak),
            Phase::LongBreak => Some(ActivePhase::LongBreak),
            Phase::Idle | Phase::Paused { .. } => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Phase::Idle)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, Phase::Paused { .. })
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Idle => "Idle",
            Phase::Paused { .. } => "Paused",
            Phase::Focus => ActivePhase::Focus.label(),
            Phase::ShortBreak => ActivePhase::ShortBreak.label(),
            Phase::LongBreak => ActivePhase::LongBreak.label(),
        }
    }
}

impl From<ActivePhase> for Phase {
    fn from(phase: ActivePhase) -> Self {
        match phase {
            ActivePhase::Focus => Phase::Focus,
            ActivePhase::ShortBreak => Phase::ShortBreak,
            ActivePhase::LongBreak => Phase::LongBreak,
        }
    }
}

/// Snapshot of the timer published to subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerState {
    pub phase: Phase,
    /// Length of the current phase, fixed when it started
    pub total_seconds: u64,
    /// Derived from the clock while running, frozen while paused
    pub remaining_seconds: u64,
    /// Clock reading the elapsed-time math is measured from; unset unless running
    pub started_at: Option<Millis>,
    /// Task the focus phase is attributed to
    pub task_id: Option<TaskId>,
    /// Ledger entry opened for the current phase
    pub active_session_id: Option<SessionId>,
    /// Focus phases that ran to completion
    pub completed_focus_count: u32,
    pub config: TimerConfig,
}

impl TimerState {
    /// Idle state carrying the given config
    pub fn idle(config: TimerConfig) -> Self {
        Self {
            phase: Phase::Idle,
            total_seconds: 0,
            remaining_seconds: 0,
            started_at: None,
            task_id: None,
            active_session_id: None,
            completed_focus_count: 0,
            config,
        }
    }

    /// Percentage of the current phase already elapsed (0-100)
    pub fn progress_percent(&self) -> f64 {
        if self.total_seconds == 0 {
            return 0.0;
        }
        let elapsed = self.total_seconds.saturating_sub(self.remaining_seconds);
        elapsed as f64 / self.total_seconds as f64 * 100.0
    }

    /// Remaining time as `mm:ss`
    ///
    /// While idle the configured focus length is shown instead of `00:00`.
    pub fn formatted_remaining(&self) -> String {
        if self.phase.is_idle() {
            return format!("{:02}:00", self.config.focus_minutes);
        }
        format_clock(self.remaining_seconds)
    }
}

impl Default for TimerState {
    fn default() -> Self {
        Self::idle(TimerConfig::default())
    }
}

/// Format seconds as zero-padded `mm:ss`
pub fn format_clock(total_secs: u64) -> String {
    let mins = total_secs / 60;
    let secs = total_secs % 60;
    format!("{:02}:{:02}", mins, secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(65), "01:05");
        assert_eq!(format_clock(1500), "25:00");
        assert_eq!(format_clock(100 * 60), "100:00");
    }

    #[test]
    fn test_idle_shows_focus_length() {
        let state = TimerState::default();
        assert_eq!(state.formatted_remaining(), "25:00");

        let mut config = TimerConfig::default();
        config.focus_minutes = 5;
        assert_eq!(TimerState::idle(config).formatted_remaining(), "05:00");
    }

    #[test]
    fn test_running_shows_remaining() {
        let state = TimerState {
            phase: Phase::Focus,
            total_seconds: 1500,
            remaining_seconds: 754,
            ..TimerState::default()
        };
        assert_eq!(state.formatted_remaining(), "12:34");
    }

    #[test]
    fn test_progress_percent() {
        assert_eq!(TimerState::default().progress_percent(), 0.0);

        let state = TimerState {
            phase: Phase::Paused {
                resume_to: ActivePhase::Focus,
            },
            total_seconds: 1500,
            remaining_seconds: 375,
            ..TimerState::default()
        };
        assert_eq!(state.progress_percent(), 75.0);
    }

    #[test]
    fn test_phase_active() {
        assert_eq!(Phase::Focus.active(), Some(ActivePhase::Focus));
        assert_eq!(Phase::LongBreak.active(), Some(ActivePhase::LongBreak));
        assert_eq!(Phase::Idle.active(), None);
        assert_eq!(
            Phase::Paused {
                resume_to: ActivePhase::ShortBreak
            }
            .active(),
            None
        );
        assert_eq!(Phase::from(ActivePhase::ShortBreak), Phase::ShortBreak);
    }

    #[test]
    fn test_break_phase() {
        assert_eq!(ActivePhase::break_phase(true), ActivePhase::LongBreak);
        assert_eq!(ActivePhase::break_phase(false), ActivePhase::ShortBreak);
        assert!(ActivePhase::ShortBreak.is_break());
        assert!(!ActivePhase::Focus.is_break());
    }

    #[test]
    fn test_snapshot_serialization() {
        let state = TimerState {
            phase: Phase::Paused {
                resume_to: ActivePhase::LongBreak,
            },
            ..TimerState::default()
        };
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains(r#""kind":"paused""#));
        assert!(json.contains(r#""resume_to":"long_break""#));

        let parsed: TimerState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, state);
    }
}
