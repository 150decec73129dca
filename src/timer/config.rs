//! Timer configuration
//!
//! Durations and auto-chain flags used when a phase starts. Changes are merged
//! through [`ConfigUpdate`] so an invalid field name cannot exist.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when a configuration update is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A phase duration of zero minutes was requested
    #[error("{field} must be at least one minute")]
    ZeroDuration { field: &'static str },
    /// A long break cycle of zero focus sessions was requested
    #[error("sessions before long break must be at least 1")]
    ZeroSessionsBeforeLongBreak,
}

/// Pomodoro timer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Focus phase length in minutes (default: 25)
    #[serde(default = "default_focus_minutes")]
    pub focus_minutes: u32,

    /// Short break length in minutes (default: 5)
    #[serde(default = "default_short_break_minutes")]
    pub short_break_minutes: u32,

    /// Long break length in minutes (default: 15)
    #[serde(default = "default_long_break_minutes")]
    pub long_break_minutes: u32,

    /// Completed focus phases between long breaks (default: 4)
    #[serde(default = "default_sessions_before_long_break")]
    pub sessions_before_long_break: u32,

    /// Start a break automatically when a focus phase completes
    #[serde(default)]
    pub auto_start_breaks: bool,

    /// Start a focus phase automatically when a break completes
    #[serde(default)]
    pub auto_start_focus: bool,
}

fn default_focus_minutes() -> u32 {
    25
}

fn default_short_break_minutes() -> u32 {
    5
}

fn default_long_break_minutes() -> u32 {
    15
}

fn default_sessions_before_long_break() -> u32 {
    4
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            focus_minutes: default_focus_minutes(),
            short_break_minutes: default_short_break_minutes(),
            long_break_minutes: default_long_break_minutes(),
            sessions_before_long_break: default_sessions_before_long_break(),
            auto_start_breaks: false,
            auto_start_focus: false,
        }
    }
}

/// A single field change to merge into a [`TimerConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigUpdate {
    FocusMinutes(u32),
    ShortBreakMinutes(u32),
    LongBreakMinutes(u32),
    SessionsBeforeLongBreak(u32),
    AutoStartBreaks(bool),
    AutoStartFocus(bool),
}

impl TimerConfig {
    /// Focus duration in seconds
    pub fn focus_secs(&self) -> u64 {
        u64::from(self.focus_minutes) * 60
    }

    /// Break duration in seconds
    pub fn break_secs(&self, is_long: bool) -> u64 {
        let minutes = if is_long {
            self.long_break_minutes
        } else {
            self.short_break_minutes
        };
        u64::from(minutes) * 60
    }

    /// Whether the `completed`-th focus completion earns a long break
    pub fn is_long_break_due(&self, completed: u32) -> bool {
        completed > 0 && completed % self.sessions_before_long_break.max(1) == 0
    }

    /// Check that every field holds a usable value
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.focus_minutes == 0 {
            return Err(ConfigError::ZeroDuration {
                field: "focus_minutes",
            });
        }
        if self.short_break_minutes == 0 {
            return Err(ConfigError::ZeroDuration {
                field: "short_break_minutes",
            });
        }
        if self.long_break_minutes == 0 {
            return Err(ConfigError::ZeroDuration {
                field: "long_break_minutes",
            });
        }
        if self.sessions_before_long_break == 0 {
            return Err(ConfigError::ZeroSessionsBeforeLongBreak);
        }
        Ok(())
    }

    /// Merge a batch of updates
    ///
    /// The batch is applied to a copy and only committed if the result
    /// validates, so a rejected batch leaves `self` untouched.
    pub fn merge<I>(&mut self, updates: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = ConfigUpdate>,
    {
        let mut next = self.clone();
        for update in updates {
            next.apply(update);
        }
        next.validate()?;
        *self = next;
        Ok(())
    }

    fn apply(&mut self, update: ConfigUpdate) {
        match update {
            ConfigUpdate::FocusMinutes(v) => self.focus_minutes = v,
            ConfigUpdate::ShortBreakMinutes(v) => self.short_break_minutes = v,
            ConfigUpdate::LongBreakMinutes(v) => self.long_break_minutes = v,
            ConfigUpdate::SessionsBeforeLongBreak(v) => self.sessions_before_long_break = v,
            ConfigUpdate::AutoStartBreaks(v) => self.auto_start_breaks = v,
            ConfigUpdate::AutoStartFocus(v) => self.auto_start_focus = v,
        }
    }
}

impl ConfigUpdate {
    /// Parse a `field value` pair as typed on the command line
    ///
    /// Field names match the TOML keys of [`TimerConfig`].
    pub fn parse(field: &str, value: &str) -> Option<Self> {
        let number = || value.parse::<u32>().ok();
        let flag = || match value {
            "true" | "on" | "yes" => Some(true),
            "false" | "off" | "no" => Some(false),
            _ => None,
        };
        match field {
            "focus_minutes" => number().map(ConfigUpdate::FocusMinutes),
            "short_break_minutes" => number().map(ConfigUpdate::ShortBreakMinutes),
            "long_break_minutes" => number().map(ConfigUpdate::LongBreakMinutes),
            "sessions_before_long_break" => number().map(ConfigUpdate::SessionsBeforeLongBreak),
            "auto_start_breaks" => flag().map(ConfigUpdate::AutoStartBreaks),
            "auto_start_focus" => flag().map(ConfigUpdate::AutoStartFocus),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TimerConfig::default();
        assert_eq!(config.focus_minutes, 25);
        assert_eq!(config.short_break_minutes, 5);
        assert_eq!(config.long_break_minutes, 15);
        assert_eq!(config.sessions_before_long_break, 4);
        assert!(!config.auto_start_breaks);
        assert!(!config.auto_start_focus);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_durations_in_seconds() {
        let config = TimerConfig::default();
        assert_eq!(config.focus_secs(), 1500);
        assert_eq!(config.break_secs(false), 300);
        assert_eq!(config.break_secs(true), 900);
    }

    #[test]
    fn test_long_break_due() {
        let config = TimerConfig::default();
        assert!(!config.is_long_break_due(0));
        assert!(!config.is_long_break_due(3));
        assert!(config.is_long_break_due(4));
        assert!(!config.is_long_break_due(5));
        assert!(config.is_long_break_due(8));
    }

    #[test]
    fn test_merge_partial_updates() {
        let mut config = TimerConfig::default();
        config
            .merge([
                ConfigUpdate::FocusMinutes(50),
                ConfigUpdate::AutoStartBreaks(true),
            ])
            .unwrap();

        assert_eq!(config.focus_minutes, 50);
        assert!(config.auto_start_breaks);
        // Untouched fields keep their values
        assert_eq!(config.short_break_minutes, 5);
    }

    #[test]
    fn test_merge_rejects_invalid_batch_atomically() {
        let mut config = TimerConfig::default();
        let result = config.merge([
            ConfigUpdate::FocusMinutes(30),
            ConfigUpdate::SessionsBeforeLongBreak(0),
        ]);

        assert_eq!(result, Err(ConfigError::ZeroSessionsBeforeLongBreak));
        assert_eq!(config, TimerConfig::default());
    }

    #[test]
    fn test_zero_duration_rejected() {
        let mut config = TimerConfig::default();
        let err = config.merge([ConfigUpdate::ShortBreakMinutes(0)]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::ZeroDuration {
                field: "short_break_minutes"
            }
        );
        assert_eq!(err.to_string(), "short_break_minutes must be at least one minute");
    }

    #[test]
    fn test_parse_update() {
        assert_eq!(
            ConfigUpdate::parse("focus_minutes", "45"),
            Some(ConfigUpdate::FocusMinutes(45))
        );
        assert_eq!(
            ConfigUpdate::parse("auto_start_focus", "on"),
            Some(ConfigUpdate::AutoStartFocus(true))
        );
        assert_eq!(ConfigUpdate::parse("focus_minutes", "abc"), None);
        assert_eq!(ConfigUpdate::parse("volume", "3"), None);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: TimerConfig = toml::from_str("focus_minutes = 40").unwrap();
        assert_eq!(config.focus_minutes, 40);
        assert_eq!(config.long_break_minutes, 15);
        assert_eq!(config.sessions_before_long_break, 4);
    }
}
