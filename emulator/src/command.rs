//! Command grammar for the emulator REPL.
//!
//! Keywords are case-insensitive; durations accept an optional `ms` or `s`
//! suffix and default to milliseconds.

use std::fmt;

use winnow::ascii::{Caseless, alpha1, dec_uint, space0, space1};
use winnow::combinator::{alt, eof, opt, preceded};
use winnow::error::{StrContext, StrContextValue};
use winnow::prelude::*;

/// Position of an `extra` pulse when none is given, in percent of a pitch.
pub const DEFAULT_EXTRA_PERCENT: u32 = 30;

/// Parsed REPL command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Command {
    /// Set wheel speed; `0` stops it.
    Rpm(u32),
    /// Turn the wheel for this many revolutions.
    Spin(u32),
    /// Advance simulated time, in milliseconds.
    Advance(u32),
    /// Stop the wheel, wait this many milliseconds, then poll.
    Stall(u32),
    /// Swallow the next tooth.
    Drop,
    /// Add a spurious pulse this many percent of a pitch after the next tooth.
    Extra(u32),
    Cam(bool),
    /// Move the clock so the timestamp counter wraps shortly.
    Wrap,
    Status,
    Angle,
    Reset,
    /// Print decoder events not yet shown.
    Log,
    Help(Option<String>),
    /// Close the session.
    Quit,
}

/// Syntax error with the byte offset it was detected at.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandError {
    pub offset: usize,
    pub message: String,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "unrecognized input at column {}", self.offset + 1)
        } else {
            write!(f, "{} at column {}", self.message, self.offset + 1)
        }
    }
}

impl std::error::Error for CommandError {}

/// Parses one REPL line.
///
/// # Errors
///
/// Returns the offset and expectation of the first syntax error.
pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    command.parse(line).map_err(|err| CommandError {
        offset: err.offset(),
        message: err.inner().to_string(),
    })
}

fn command(input: &mut &str) -> ModalResult<Command> {
    space0.parse_next(input)?;
    let parsed = alt((
        preceded((Caseless("rpm"), space1), dec_uint).map(Command::Rpm),
        preceded(Caseless("spin"), opt(preceded(space1, dec_uint)))
            .map(|revolutions| Command::Spin(revolutions.unwrap_or(1))),
        preceded((Caseless("advance"), space1), duration_millis).map(Command::Advance),
        preceded((Caseless("stall"), space1), duration_millis).map(Command::Stall),
        Caseless("drop").value(Command::Drop),
        preceded(Caseless("extra"), opt(preceded(space1, percent)))
            .map(|percent| Command::Extra(percent.unwrap_or(DEFAULT_EXTRA_PERCENT))),
        preceded((Caseless("cam"), space1), switch).map(Command::Cam),
        Caseless("wrap").value(Command::Wrap),
        Caseless("status").value(Command::Status),
        Caseless("angle").value(Command::Angle),
        Caseless("reset").value(Command::Reset),
        Caseless("log").value(Command::Log),
        preceded(Caseless("help"), opt(preceded(space1, alpha1)))
            .map(|topic: Option<&str>| Command::Help(topic.map(str::to_ascii_lowercase))),
        alt((Caseless("quit"), Caseless("exit"))).value(Command::Quit),
    ))
    .context(StrContext::Label("command"))
    .parse_next(input)?;
    (space0, eof)
        .context(StrContext::Expected(StrContextValue::Description(
            "end of line",
        )))
        .parse_next(input)?;
    Ok(parsed)
}

fn duration_millis(input: &mut &str) -> ModalResult<u32> {
    let value: u32 = dec_uint
        .context(StrContext::Expected(StrContextValue::Description(
            "duration",
        )))
        .parse_next(input)?;
    let scale = opt(alt((
        Caseless("ms").value(1_u32),
        Caseless("s").value(1_000_u32),
    )))
    .parse_next(input)?;
    Ok(value.saturating_mul(scale.unwrap_or(1)))
}

fn percent(input: &mut &str) -> ModalResult<u32> {
    let value: u32 = dec_uint
        .context(StrContext::Expected(StrContextValue::Description(
            "percent of a pitch",
        )))
        .parse_next(input)?;
    opt('%').parse_next(input)?;
    Ok(value)
}

fn switch(input: &mut &str) -> ModalResult<bool> {
    alt((Caseless("on").value(true), Caseless("off").value(false)))
        .context(StrContext::Expected(StrContextValue::Description(
            "on or off",
        )))
        .parse_next(input)
}
