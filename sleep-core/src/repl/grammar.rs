#![allow(clippy::module_name_repetitions)]

//! Parser for the diagnostic console.
//!
//! Lines are short and bounded, so the grammar runs `winnow` combinators
//! directly over the input `&str` without a separate token pass.
//!
//! ```text
//! cat <endpoint>
//! echo <payload> > <endpoint>
//! status
//! log
//! help [topic]
//! ```

use core::fmt;

use winnow::ascii::{space0, space1};
use winnow::combinator::{opt, preceded};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::{take_till, take_while};

use super::endpoints::Endpoint;

/// Parsed console command.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Command<'a> {
    Cat(Endpoint),
    Echo { payload: &'a str, endpoint: Endpoint },
    Status,
    Log,
    Help(Option<&'a str>),
}

/// Errors emitted by the console parser.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParseError<'a> {
    /// The line was blank.
    Empty,
    UnknownCommand(&'a str),
    UnknownEndpoint(&'a str),
    /// Arguments did not match the command's shape.
    Syntax(&'static str),
}

impl fmt::Display for ParseError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Empty => f.write_str("empty command"),
            ParseError::UnknownCommand(word) => write!(f, "unknown command `{word}`"),
            ParseError::UnknownEndpoint(word) => write!(f, "unknown endpoint `{word}`"),
            ParseError::Syntax(usage) => write!(f, "usage: {usage}"),
        }
    }
}

const CAT_USAGE: &str = "cat <endpoint>";
const ECHO_USAGE: &str = "echo <payload> > <endpoint>";

type Step<O> = Result<O, ErrMode<ContextError>>;

fn word<'a>(input: &mut &'a str) -> Step<&'a str> {
    preceded(
        space0,
        take_while(1.., |c: char| {
            c.is_ascii_alphanumeric() || c == '-' || c == '_'
        }),
    )
    .parse_next(input)
}

fn redirect<'a>(input: &mut &'a str) -> Step<(&'a str, char, &'a str)> {
    (take_till(0.., '>'), '>', word).parse_next(input)
}

fn endpoint(name: &str) -> Result<Endpoint, ParseError<'_>> {
    Endpoint::from_name(name).ok_or(ParseError::UnknownEndpoint(name))
}

fn finish<'a>(rest: &str, usage: &'static str) -> Result<(), ParseError<'a>> {
    if rest.trim().is_empty() {
        Ok(())
    } else {
        Err(ParseError::Syntax(usage))
    }
}

/// Parses a single console line.
///
/// # Errors
///
/// Returns a [`ParseError`] describing the first problem found.
pub fn parse(line: &str) -> Result<Command<'_>, ParseError<'_>> {
    let mut input = line.trim();
    if input.is_empty() {
        return Err(ParseError::Empty);
    }

    let keyword = word(&mut input).map_err(|_| ParseError::Syntax("<command> [args]"))?;

    if keyword.eq_ignore_ascii_case("cat") {
        let name = preceded(space1, word)
            .parse_next(&mut input)
            .map_err(|_| ParseError::Syntax(CAT_USAGE))?;
        let target = endpoint(name)?;
        finish(input, CAT_USAGE)?;
        Ok(Command::Cat(target))
    } else if keyword.eq_ignore_ascii_case("echo") {
        let (payload, _, name) =
            redirect(&mut input).map_err(|_| ParseError::Syntax(ECHO_USAGE))?;
        let target = endpoint(name)?;
        finish(input, ECHO_USAGE)?;
        Ok(Command::Echo {
            payload: payload.trim(),
            endpoint: target,
        })
    } else if keyword.eq_ignore_ascii_case("status") {
        finish(input, "status")?;
        Ok(Command::Status)
    } else if keyword.eq_ignore_ascii_case("log") {
        finish(input, "log")?;
        Ok(Command::Log)
    } else if keyword.eq_ignore_ascii_case("help") {
        let topic = opt(word)
            .parse_next(&mut input)
            .map_err(|_| ParseError::Syntax("help [topic]"))?;
        finish(input, "help [topic]")?;
        Ok(Command::Help(topic))
    } else {
        Err(ParseError::UnknownCommand(keyword))
    }
}
