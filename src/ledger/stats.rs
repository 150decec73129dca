//! Statistics over recorded sessions
//!
//! Counts and totals shown next to tasks and in the history summary.

use std::collections::HashMap;
use std::time::Duration;

use crate::timer::ActivePhase;

use super::{SessionEntry, TaskId};

/// Number of completed focus sessions attributed to `task_id`
pub fn count_focus_sessions(entries: &[SessionEntry], task_id: TaskId) -> usize {
    entries
        .iter()
        .filter(|e| e.kind == ActivePhase::Focus && e.completed && e.task_id == Some(task_id))
        .count()
}

/// Completed focus sessions per task
///
/// Entries without a task are skipped.
pub fn focus_sessions_by_task(entries: &[SessionEntry]) -> HashMap<TaskId, usize> {
    let mut counts: HashMap<TaskId, usize> = HashMap::new();

    for entry in entries {
        if entry.kind != ActivePhase::Focus || !entry.completed {
            continue;
        }
        if let Some(task_id) = entry.task_id {
            *counts.entry(task_id).or_default() += 1;
        }
    }

    counts
}

/// Aggregated statistics over a set of sessions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStats {
    /// Focus sessions that ran to completion
    pub focus_completed: u32,
    /// Focus sessions that were stopped early
    pub focus_interrupted: u32,
    /// Breaks (short or long) that ran to completion
    pub breaks_completed: u32,
    /// Total configured length of completed focus sessions
    pub total_focus: Duration,
    /// Completed / (completed + interrupted) focus sessions, as a percentage
    pub completion_rate: f64,
}

impl SessionStats {
    /// Add a session to the aggregation
    ///
    /// Open entries are ignored.
    pub fn add_session(&mut self, entry: &SessionEntry) {
        if entry.is_open() {
            return;
        }

        match (entry.kind, entry.completed) {
            (ActivePhase::Focus, true) => {
                self.focus_completed += 1;
                self.total_focus += entry.duration();
            }
            (ActivePhase::Focus, false) => self.focus_interrupted += 1,
            (_, true) => self.breaks_completed += 1,
            (_, false) => {}
        }

        // Recalculate rate
        let attempted = self.focus_completed + self.focus_interrupted;
        if attempted > 0 {
            self.completion_rate = f64::from(self.focus_completed) / f64::from(attempted) * 100.0;
        }
    }

    /// Format the total focus time as a human-readable string
    pub fn format_total_focus(&self) -> String {
        format_duration(self.total_focus)
    }

    /// Format the completion rate
    pub fn format_completion_rate(&self) -> String {
        format!("{:.0}%", self.completion_rate)
    }
}

/// Calculate statistics over all entries
pub fn calculate_stats(entries: &[SessionEntry]) -> SessionStats {
    let mut stats = SessionStats::default();
    for entry in entries {
        stats.add_session(entry);
    }
    stats
}

/// Format a duration as MM:SS or HH:MM:SS
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{:02}:{:02}", mins, secs)
    }
}
