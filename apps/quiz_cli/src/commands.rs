//! Terminal input parsed into engine commands.

use client_core::{EngineCommand, EngineConfig};
use thiserror::Error;

pub const HELP: &str = "\
commands:
  <n> | answer <n>          answer option n (1-based)
  refresh                   fetch the latest state
  config <seconds> <rounds> store quiz settings (admin)
  start [seconds] [rounds]  store settings and start the quiz (admin)
  next                      move to the next question (admin)
  force                     start without waiting for everyone (admin)
  end                       end the quiz (admin)
  rematch                   join or leave the next game
  restart                   start the next game (admin)
  help                      show this text
  quit                      leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Command(EngineCommand),
    Help,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command `{0}`, type `help` for a list")]
    Unknown(String),
    #[error("`{command}` expects {expected}")]
    Usage {
        command: &'static str,
        expected: &'static str,
    },
    #[error("invalid number `{0}`")]
    InvalidNumber(String),
    #[error("options start at 1")]
    OptionOutOfRange,
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse_command(line: &str, defaults: &EngineConfig) -> Result<Option<Input>, CommandError> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match head.to_ascii_lowercase().as_str() {
        "help" | "?" => return Ok(Some(Input::Help)),
        "quit" | "exit" | "q" => EngineCommand::Shutdown,
        "refresh" | "r" => no_args("refresh", &args, EngineCommand::Refresh)?,
        "answer" | "a" => match args.as_slice() {
            [option] => answer(option)?,
            _ => {
                return Err(CommandError::Usage {
                    command: "answer",
                    expected: "one option number",
                })
            }
        },
        "config" => match args.as_slice() {
            [seconds, rounds] => EngineCommand::Configure {
                timer_seconds: number(seconds)?,
                rounds_total: number(rounds)?,
            },
            _ => {
                return Err(CommandError::Usage {
                    command: "config",
                    expected: "<seconds> <rounds>",
                })
            }
        },
        "start" => {
            let (timer_seconds, rounds_total) = match args.as_slice() {
                [] => (defaults.default_timer_seconds, defaults.default_rounds_total),
                [seconds] => (number(seconds)?, defaults.default_rounds_total),
                [seconds, rounds] => (number(seconds)?, number(rounds)?),
                _ => {
                    return Err(CommandError::Usage {
                        command: "start",
                        expected: "at most <seconds> <rounds>",
                    })
                }
            };
            EngineCommand::StartQuiz {
                timer_seconds,
                rounds_total,
            }
        }
        "next" => no_args("next", &args, EngineCommand::NextQuestion)?,
        "force" => no_args("force", &args, EngineCommand::ForceStart)?,
        "end" => no_args("end", &args, EngineCommand::EndQuiz)?,
        "rematch" | "join" => no_args("rematch", &args, EngineCommand::ToggleRematch)?,
        "restart" => no_args("restart", &args, EngineCommand::StartRematch)?,
        other if args.is_empty() && other.chars().all(|c| c.is_ascii_digit()) => answer(other)?,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(Input::Command(command)))
}

/// Short name used in logs.
pub fn command_name(command: &EngineCommand) -> &'static str {
    match command {
        EngineCommand::Refresh => "refresh",
        EngineCommand::SubmitAnswer { .. } => "answer",
        EngineCommand::Configure { .. } => "config",
        EngineCommand::StartQuiz { .. } => "start",
        EngineCommand::NextQuestion => "next",
        EngineCommand::ForceStart => "force",
        EngineCommand::EndQuiz => "end",
        EngineCommand::ToggleRematch => "rematch",
        EngineCommand::StartRematch => "restart",
        EngineCommand::Shutdown => "quit",
    }
}

fn no_args(
    command: &'static str,
    args: &[&str],
    parsed: EngineCommand,
) -> Result<EngineCommand, CommandError> {
    if args.is_empty() {
        Ok(parsed)
    } else {
        Err(CommandError::Usage {
            command,
            expected: "no arguments",
        })
    }
}

fn answer(raw: &str) -> Result<EngineCommand, CommandError> {
    let shown: usize = number(raw)?;
    let option = shown.checked_sub(1).ok_or(CommandError::OptionOutOfRange)?;
    Ok(EngineCommand::SubmitAnswer { option })
}

fn number<T: std::str::FromStr>(raw: &str) -> Result<T, CommandError> {
    raw.parse()
        .map_err(|_| CommandError::InvalidNumber(raw.to_string()))
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
