//! Board-side commands understood by the emulator on top of the console.
//!
//! ```text
//! advance <n>[ms|s]      move the virtual clock
//! hostwake <0|1>         drive the host-wake input
//! send <bytes>           hand outbound HCI bytes to the UART
//! queue <bytes>          buffer bytes without reporting activity
//! flush                  transmit buffered bytes if the UART is powered
//! attach | detach        controller registration
//! irq <busy|free>        fail or allow the next interrupt registration
//! board                  dump simulated line and UART state
//! ```

use std::fmt;
use std::time::Duration;

use bluesleep_core::hal::IrqError;
use winnow::ascii::{digit1, space0, space1};
use winnow::combinator::{alt, opt, preceded};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::take_while;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SimCommand {
    Advance(Duration),
    HostWake(bool),
    Send(usize),
    Queue(usize),
    Flush,
    Attach,
    Detach,
    IrqFault(Option<IrqError>),
    Board,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SimParseError {
    pub usage: &'static str,
}

impl fmt::Display for SimParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "usage: {}", self.usage)
    }
}

const ADVANCE_USAGE: &str = "advance <n>[ms|s]";
const HOSTWAKE_USAGE: &str = "hostwake <0|1>";
const SEND_USAGE: &str = "send <bytes>";
const QUEUE_USAGE: &str = "queue <bytes>";
const IRQ_USAGE: &str = "irq <busy|free>";

pub const SIM_HELP: [&str; 8] = [
    "advance <n>[ms|s]         move the virtual clock",
    "hostwake <0|1>            drive the host-wake input",
    "send <bytes>              hand outbound HCI bytes to the UART",
    "queue <bytes>             buffer bytes without reporting activity",
    "flush                     transmit buffered bytes if the UART is powered",
    "attach | detach           register or drop the HCI controller",
    "irq <busy|free>           fail or allow the next irq registration",
    "board                     simulated line and UART state",
];

type Step<O> = Result<O, ErrMode<ContextError>>;

fn keyword<'a>(input: &mut &'a str) -> Step<&'a str> {
    preceded(space0, take_while(1.., |c: char| c.is_ascii_alphabetic())).parse_next(input)
}

fn count(input: &mut &str) -> Step<u64> {
    preceded(space1, digit1)
        .parse_next(input)
        .and_then(|digits: &str| {
            digits
                .parse::<u64>()
                .map_err(|_| ErrMode::Cut(ContextError::new()))
        })
}

fn duration(input: &mut &str) -> Step<Duration> {
    let amount = count(input)?;
    let unit: Step<Option<&str>> = opt(alt(("ms", "s"))).parse_next(input);
    Ok(match unit? {
        Some("s") => Duration::from_secs(amount),
        _ => Duration::from_millis(amount),
    })
}

fn level(input: &mut &str) -> Step<bool> {
    preceded(space1, alt(('0'.value(false), '1'.value(true)))).parse_next(input)
}

fn irq_fault(input: &mut &str) -> Step<Option<IrqError>> {
    preceded(
        space1,
        alt(("busy".value(Some(IrqError::InUse)), "free".value(None))),
    )
    .parse_next(input)
}

fn bytes(input: &mut &str) -> Step<usize> {
    let value = count(input)?;
    usize::try_from(value).map_err(|_| ErrMode::Cut(ContextError::new()))
}

fn finish<O>(result: Step<O>, rest: &str, usage: &'static str) -> Result<O, SimParseError> {
    match result {
        Ok(value) if rest.trim().is_empty() => Ok(value),
        _ => Err(SimParseError { usage }),
    }
}

/// Parses a board command.
///
/// Returns `None` when the line does not start with a board keyword so the
/// caller can hand it to the console instead.
pub fn parse(line: &str) -> Option<Result<SimCommand, SimParseError>> {
    let mut input = line.trim();
    let word = keyword(&mut input).ok()?.to_ascii_lowercase();

    let parsed = match word.as_str() {
        "advance" => {
            let result = duration(&mut input).map(SimCommand::Advance);
            finish(result, input, ADVANCE_USAGE)
        }
        "hostwake" => {
            let result = level(&mut input).map(SimCommand::HostWake);
            finish(result, input, HOSTWAKE_USAGE)
        }
        "send" => {
            let result = bytes(&mut input).map(SimCommand::Send);
            finish(result, input, SEND_USAGE)
        }
        "queue" => {
            let result = bytes(&mut input).map(SimCommand::Queue);
            finish(result, input, QUEUE_USAGE)
        }
        "irq" => {
            let result = irq_fault(&mut input).map(SimCommand::IrqFault);
            finish(result, input, IRQ_USAGE)
        }
        "flush" => finish(Ok(SimCommand::Flush), input, "flush"),
        "attach" => finish(Ok(SimCommand::Attach), input, "attach"),
        "detach" => finish(Ok(SimCommand::Detach), input, "detach"),
        "board" => finish(Ok(SimCommand::Board), input, "board"),
        _ => return None,
    };
    Some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_advance_units() {
        assert_eq!(
            parse("advance 6s"),
            Some(Ok(SimCommand::Advance(Duration::from_secs(6))))
        );
        assert_eq!(
            parse("advance 250ms"),
            Some(Ok(SimCommand::Advance(Duration::from_millis(250))))
        );
        assert_eq!(
            parse("ADVANCE 40"),
            Some(Ok(SimCommand::Advance(Duration::from_millis(40))))
        );
    }

    #[test]
    fn parses_line_and_traffic_commands() {
        assert_eq!(parse("hostwake 1"), Some(Ok(SimCommand::HostWake(true))));
        assert_eq!(parse("send 12"), Some(Ok(SimCommand::Send(12))));
        assert_eq!(parse("queue 3"), Some(Ok(SimCommand::Queue(3))));
        assert_eq!(
            parse("irq busy"),
            Some(Ok(SimCommand::IrqFault(Some(IrqError::InUse))))
        );
        assert_eq!(parse(" detach "), Some(Ok(SimCommand::Detach)));
    }

    #[test]
    fn malformed_board_commands_report_usage() {
        assert_eq!(parse("hostwake 2"), Some(Err(SimParseError { usage: HOSTWAKE_USAGE })));
        assert_eq!(parse("advance soon"), Some(Err(SimParseError { usage: ADVANCE_USAGE })));
        assert_eq!(parse("attach now"), Some(Err(SimParseError { usage: "attach" })));
    }

    #[test]
    fn console_lines_fall_through() {
        assert_eq!(parse("cat proto"), None);
        assert_eq!(parse("echo 1 > proto"), None);
        assert_eq!(parse(""), None);
    }
}
