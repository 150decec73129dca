//! Line commands for the terminal driver

use thiserror::Error;

use crate::timer::ConfigUpdate;

/// One parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start focus, optionally for a custom number of minutes and on a named task
    Focus {
        minutes: Option<u32>,
        task: Option<String>,
    },
    ShortBreak,
    LongBreak,
    Pause,
    Resume,
    Stop,
    Reset,
    Status,
    Stats,
    History,
    Set(ConfigUpdate),
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command '{0}' (type 'help')")]
    Unknown(String),
    #[error("'{0}' is not a number of minutes")]
    BadMinutes(String),
    #[error("usage: set <field> <value>")]
    SetUsage,
    #[error("cannot set '{field}' to '{value}'")]
    BadSetting { field: String, value: String },
}

/// Help text listing every command
pub const HELP: &str = "\
commands:
  focus [minutes] [task]
                      start a focus phase, optionally on a named task
  short | long        start a short or long break
  pause | resume      suspend or continue the running phase
  stop                abandon the current phase
  reset               stop and clear the completed focus count
  status              show the current phase
  stats               summarise recorded sessions and focus per task
  history             list the most recent sessions
  set <field> <value> change a setting (focus_minutes, short_break_minutes,
                      long_break_minutes, sessions_before_long_break,
                      auto_start_breaks, auto_start_focus)
  quit";

impl Command {
    /// Parse a line; blank lines yield `None`
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let command = match name.to_ascii_lowercase().as_str() {
            "focus" | "f" => {
                // A leading number is the length; anything else names the task
                let (minutes, label) = match args.split_first() {
                    Some((first, rest)) if first.chars().all(|c| c.is_ascii_digit()) => {
                        (Some(parse_minutes(first)?), rest)
                    }
                    _ => (None, args.as_slice()),
                };
                let task = (!label.is_empty()).then(|| label.join(" "));
                Command::Focus { minutes, task }
            }
            "short" | "s" => Command::ShortBreak,
            "long" | "l" => Command::LongBreak,
            "pause" | "p" => Command::Pause,
            "resume" | "r" => Command::Resume,
            "stop" => Command::Stop,
            "reset" => Command::Reset,
            "status" | "st" => Command::Status,
            "stats" => Command::Stats,
            "history" | "h" => Command::History,
            "set" => match args.as_slice() {
                [field, value] => ConfigUpdate::parse(field, value)
                    .map(Command::Set)
                    .ok_or_else(|| CommandError::BadSetting {
                        field: field.to_string(),
                        value: value.to_string(),
                    })?,
                _ => return Err(CommandError::SetUsage),
            },
            "help" | "?" => Command::Help,
            "quit" | "q" | "exit" => Command::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }
}

fn parse_minutes(arg: &str) -> Result<u32, CommandError> {
    match arg.parse::<u32>() {
        Ok(minutes) if minutes > 0 => Ok(minutes),
        _ => Err(CommandError::BadMinutes(arg.to_string())),
    }
}
