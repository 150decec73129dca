//! Terminal driver
//!
//! Applies parsed line commands to a [`TimerService`] and renders the replies
//! printed back to the user. Phase changes are printed separately by
//! [`print_phase_changes`], which follows the service's state channel.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::watch;

use crate::command::{Command, HELP};
use crate::config::Config;
use crate::ledger::stats::{calculate_stats, count_focus_sessions, focus_sessions_by_task};
use crate::ledger::{
    task_id_for, BackgroundLedger, LedgerResult, SessionEntry, SessionLedger, TaskId,
};
use crate::timer::{ConfigUpdate, Phase, TimerService, TimerState};

/// Sessions listed by `history`
const HISTORY_LEN: usize = 10;

pub struct App {
    service: TimerService,
    ledger: BackgroundLedger,
    config: Config,
    /// Where `set` persists the config; `None` keeps changes in memory
    config_path: Option<PathBuf>,
    /// Labels typed during this run, keyed by their task id
    task_labels: HashMap<TaskId, String>,
}

impl App {
    pub fn new(
        service: TimerService,
        ledger: BackgroundLedger,
        config: Config,
        config_path: Option<PathBuf>,
    ) -> Self {
        Self {
            service,
            ledger,
            config,
            config_path,
            task_labels: HashMap::new(),
        }
    }

    pub fn service(&self) -> &TimerService {
        &self.service
    }

    /// Read commands until `quit` or end of input
    pub async fn run<R>(&mut self, input: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();

        while let Some(line) = lines.next_line().await.context("Failed to read input")? {
            let command = match Command::parse(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(e) => {
                    println!("{}", e);
                    continue;
                }
            };
            if command == Command::Quit {
                break;
            }
            if let Some(reply) = self.handle(command).await {
                println!("{}", reply);
            }
        }

        Ok(())
    }

    /// Apply one command, returning the text to show the user
    pub async fn handle(&mut self, command: Command) -> Option<String> {
        tracing::debug!(?command, "Command received");

        match command {
            Command::Focus { minutes, task } => {
                let task_id = task.map(|label| self.remember_task(&label));
                let override_secs = minutes.map(|m| u64::from(m) * 60);
                self.service.start_focus(task_id, override_secs).await;
                None
            }
            Command::ShortBreak => {
                self.service.start_break(false).await;
                None
            }
            Command::LongBreak => {
                self.service.start_break(true).await;
                None
            }
            Command::Pause => refusal(self.service.pause().await, "nothing is running"),
            Command::Resume => refusal(self.service.resume().await, "timer is not paused"),
            Command::Stop => refusal(self.service.stop().await, "timer is already idle"),
            Command::Reset => {
                self.service.reset().await;
                None
            }
            Command::Status => Some(self.status().await),
            Command::Stats => Some(self.stats().await),
            Command::History => Some(self.history().await),
            Command::Set(update) => self.apply_setting(update).await,
            Command::Help => Some(HELP.to_string()),
            Command::Quit => None,
        }
    }

    /// Abandon the running phase and drain queued ledger writes
    pub async fn shutdown(&self) {
        if self.service.stop().await {
            tracing::info!("Running phase abandoned on exit");
        }
        self.service.shutdown().await;
        self.ledger.flush().await;
    }

    fn remember_task(&mut self, label: &str) -> TaskId {
        let task_id = task_id_for(label);
        self.task_labels
            .entry(task_id)
            .or_insert_with(|| label.trim().to_string());
        task_id
    }

    /// Label typed for the task, or a short id for tasks from earlier runs
    fn task_label(&self, task_id: TaskId) -> String {
        self.task_labels
            .get(&task_id)
            .cloned()
            .unwrap_or_else(|| task_id.simple().to_string()[..8].to_string())
    }

    async fn entries(&self) -> LedgerResult<Vec<SessionEntry>> {
        self.ledger.flush().await;
        self.ledger.entries()
    }

    async fn status(&self) -> String {
        self.service.sync().await;
        let state = self.service.snapshot();
        let line = status_line(&state);

        let Some(task_id) = state.task_id else {
            return line;
        };
        let label = self.task_label(task_id);
        match self.entries().await {
            Ok(entries) => format!(
                "{} | task {} ({} done)",
                line,
                label,
                count_focus_sessions(&entries, task_id)
            ),
            Err(e) => {
                tracing::warn!("Failed to read session ledger: {}", e);
                format!("{} | task {}", line, label)
            }
        }
    }

    async fn stats(&self) -> String {
        let entries = match self.entries().await {
            Ok(entries) => entries,
            Err(e) => return format!("could not read session history: {}", e),
        };

        let stats = calculate_stats(&entries);
        let mut report = format!(
            "focus: {} completed, {} interrupted ({}), {} total; breaks: {} completed",
            stats.focus_completed,
            stats.focus_interrupted,
            stats.format_completion_rate(),
            stats.format_total_focus(),
            stats.breaks_completed,
        );

        let mut per_task: Vec<(String, usize)> = focus_sessions_by_task(&entries)
            .into_iter()
            .map(|(task_id, count)| (self.task_label(task_id), count))
            .collect();
        per_task.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        for (label, count) in per_task {
            report.push_str(&format!("\n  {}: {} completed", label, count));
        }

        report
    }

    async fn history(&self) -> String {
        let entries = match self.entries().await {
            Ok(entries) => entries,
            Err(e) => return format!("could not read session history: {}", e),
        };
        if entries.is_empty() {
            return "no sessions recorded".to_string();
        }

        let recent = &entries[entries.len().saturating_sub(HISTORY_LEN)..];
        recent
            .iter()
            .map(|entry| self.history_line(entry))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn history_line(&self, entry: &SessionEntry) -> String {
        let started = entry
            .started_at()
            .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "unknown time".to_string());
        let outcome = if entry.completed {
            "completed"
        } else if entry.interrupted {
            "interrupted"
        } else {
            "open"
        };

        let mut line = format!(
            "{} {} {} min {}",
            started,
            entry.kind.label(),
            entry.duration_minutes(),
            outcome
        );
        if let Some(task_id) = entry.task_id {
            line.push_str(&format!(" [{}]", self.task_label(task_id)));
        }
        line
    }

    async fn apply_setting(&mut self, update: ConfigUpdate) -> Option<String> {
        if let Err(e) = self.service.update_config(vec![update]).await {
            return Some(e.to_string());
        }
        self.config.timer = self.service.snapshot().config;

        let path = self.config_path.as_ref()?;
        match self.config.save_to(path) {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!("Failed to save config: {:#}", e);
                Some(format!("setting applied but not saved: {:#}", e))
            }
        }
    }
}

/// Reply shown when a command had nothing to act on
fn refusal(applied: bool, reply: &str) -> Option<String> {
    (!applied).then(|| reply.to_string())
}

/// Print a status line whenever the phase changes
pub async fn print_phase_changes(mut updates: watch::Receiver<TimerState>) {
    let mut last_phase = updates.borrow().phase;

    while updates.changed().await.is_ok() {
        let state = updates.borrow_and_update().clone();
        if state.phase == last_phase {
            continue;
        }
        last_phase = state.phase;
        println!("{}", status_line(&state));
    }
}

pub fn status_line(state: &TimerState) -> String {
    match state.phase {
        Phase::Idle => format!(
            "idle | next focus {} | {} focus sessions completed",
            state.formatted_remaining(),
            state.completed_focus_count
        ),
        phase => format!(
            "{} | {} left | {:.0}% | {} focus sessions completed",
            phase.label(),
            state.formatted_remaining(),
            state.progress_percent(),
            state.completed_focus_count
        ),
    }
}
