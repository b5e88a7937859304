//! Line commands.
//!
//! The feed reads one command per line:
//!
//! - `symbol <SYM>` switches both streams to another symbol
//! - `interval <I>` switches the chart to another interval
//! - `status` logs the current connections and metrics
//! - `quit` stops the feed

use std::str::FromStr;

/// A parsed line command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Switch both roles to a new symbol.
    Symbol(String),
    /// Switch the chart to a new interval.
    Interval(String),
    /// Report connection status.
    Status,
    /// Stop the feed.
    Quit,
}

/// Command parse errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// Blank line.
    #[error("empty command")]
    Empty,

    /// Unknown command word.
    #[error("unknown command: {0}")]
    Unknown(String),

    /// Command requires an argument.
    #[error("`{0}` requires an argument")]
    MissingArgument(&'static str),

    /// Command got more arguments than it takes.
    #[error("`{0}` takes at most one argument")]
    TooManyArguments(&'static str),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or(CommandError::Empty)?.to_ascii_lowercase();
        let argument = words.next();

        let (name, command) = match verb.as_str() {
            "symbol" | "s" => {
                let symbol = argument.ok_or(CommandError::MissingArgument("symbol"))?;
                ("symbol", Self::Symbol(symbol.to_ascii_uppercase()))
            }
            "interval" | "i" => {
                let interval = argument.ok_or(CommandError::MissingArgument("interval"))?;
                ("interval", Self::Interval(interval.to_string()))
            }
            "status" => ("status", Self::Status),
            "quit" | "exit" | "q" => ("quit", Self::Quit),
            _ => return Err(CommandError::Unknown(verb)),
        };

        let extra = match command {
            Self::Symbol(_) | Self::Interval(_) => words.next(),
            Self::Status | Self::Quit => argument,
        };
        if extra.is_some() {
            return Err(CommandError::TooManyArguments(name));
        }

        Ok(command)
    }
}
