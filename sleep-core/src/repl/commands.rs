//! High-level console command dispatcher.
//!
//! Glues parsed grammar commands to the diagnostic endpoints and status
//! formatter. Responses are written into any [`fmt::Write`] sink so the
//! firmware can stream into a fixed buffer and the emulator into stdout.

use core::fmt;

use crate::error::SleepError;

use super::SleepControl;
use super::endpoints::{self, Endpoint};
use super::grammar::{self, Command, ParseError};
use super::status::StatusFormatter;

const COMMAND_HELP: [(&str, &str); 5] = [
    ("cat", "cat <endpoint>            print an endpoint"),
    ("echo", "echo <value> > <endpoint>  write an endpoint"),
    ("status", "status                    link, line, and activity summary"),
    ("log", "log                       recent sleep events"),
    ("help", "help [topic]              this text, or details for a topic"),
];

/// Command execution successes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CommandOutcome {
    Read(Endpoint),
    Wrote { endpoint: Endpoint, consumed: usize },
    Status,
    Log { records: usize },
    Help,
}

/// Errors surfaced while executing a command.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CommandError<'a> {
    Parse(ParseError<'a>),
    Sleep(SleepError),
    UnknownTopic(&'a str),
    /// The response sink rejected output.
    Output,
}

impl fmt::Display for CommandError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Parse(err) => write!(f, "{err}"),
            CommandError::Sleep(err) => write!(f, "{err}"),
            CommandError::UnknownTopic(topic) => write!(f, "no help for `{topic}`"),
            CommandError::Output => f.write_str("response truncated"),
        }
    }
}

impl<'a> From<ParseError<'a>> for CommandError<'a> {
    fn from(error: ParseError<'a>) -> Self {
        Self::Parse(error)
    }
}

impl From<SleepError> for CommandError<'_> {
    fn from(error: SleepError) -> Self {
        Self::Sleep(error)
    }
}

impl From<fmt::Error> for CommandError<'_> {
    fn from(_: fmt::Error) -> Self {
        Self::Output
    }
}

/// Dispatches console commands onto a [`SleepControl`].
pub struct CommandExecutor<C> {
    control: C,
}

impl<C> CommandExecutor<C> {
    pub const fn new(control: C) -> Self {
        Self { control }
    }
}

impl<C> CommandExecutor<C>
where
    C: SleepControl,
{
    /// Parses and executes a console line, writing the response into `out`.
    ///
    /// # Errors
    ///
    /// Returns a [`CommandError`] for parse failures, rejected writes, and
    /// output overflow.
    pub fn execute<'a, W>(&self, line: &'a str, out: &mut W) -> Result<CommandOutcome, CommandError<'a>>
    where
        W: fmt::Write,
    {
        let command = grammar::parse(line)?;
        self.dispatch(command, out)
    }

    fn dispatch<'a, W>(&self, command: Command<'a>, out: &mut W) -> Result<CommandOutcome, CommandError<'a>>
    where
        W: fmt::Write,
    {
        match command {
            Command::Cat(endpoint) => {
                endpoints::read_endpoint(&self.control, endpoint, out)?;
                Ok(CommandOutcome::Read(endpoint))
            }
            Command::Echo { payload, endpoint } => {
                let consumed =
                    endpoints::write_endpoint(&self.control, endpoint, payload.as_bytes())?;
                Ok(CommandOutcome::Wrote { endpoint, consumed })
            }
            Command::Status => {
                let snapshot = self.control.snapshot();
                StatusFormatter::new(&snapshot).write_all(out)?;
                Ok(CommandOutcome::Status)
            }
            Command::Log => {
                let records = self.control.recent_records();
                for record in &records {
                    writeln!(out, "{record}")?;
                }
                Ok(CommandOutcome::Log {
                    records: records.len(),
                })
            }
            Command::Help(topic) => {
                write_help(topic, out)?;
                Ok(CommandOutcome::Help)
            }
        }
    }
}

fn write_help<'a, W>(topic: Option<&'a str>, out: &mut W) -> Result<(), CommandError<'a>>
where
    W: fmt::Write,
{
    let Some(topic) = topic else {
        for (_, usage) in COMMAND_HELP {
            writeln!(out, "{usage}")?;
        }
        out.write_str("endpoints:")?;
        for endpoint in Endpoint::ALL {
            write!(out, " {endpoint}")?;
        }
        out.write_char('\n')?;
        return Ok(());
    };

    if let Some(endpoint) = Endpoint::from_name(topic) {
        writeln!(out, "{endpoint}: {}", endpoint.summary())?;
        return Ok(());
    }

    match COMMAND_HELP
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(topic))
    {
        Some((_, usage)) => {
            writeln!(out, "{usage}")?;
            Ok(())
        }
        None => Err(CommandError::UnknownTopic(topic)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LOG_DRAIN_BATCH;
    use crate::machine::{Epoch, LinkState, SleepSnapshot};
    use crate::telemetry::{SleepEvent, SleepRecord};
    use core::cell::Cell;
    use heapless::{String, Vec};

    struct MockControl {
        enabled: Cell<bool>,
        ext_wake: Cell<bool>,
    }

    impl MockControl {
        fn new() -> Self {
            Self {
                enabled: Cell::new(false),
                ext_wake: Cell::new(false),
            }
        }
    }

    impl SleepControl for MockControl {
        fn snapshot(&self) -> SleepSnapshot {
            SleepSnapshot {
                state: if self.enabled.get() {
                    LinkState::ActiveAwake
                } else {
                    LinkState::Disabled
                },
                ext_wake: self.ext_wake.get(),
                host_wake: false,
                tx_frames: 0,
                timer_armed: self.enabled.get(),
                transport_attached: true,
                epoch: Epoch::from_raw(1),
            }
        }

        fn start(&self) -> Result<Epoch, SleepError> {
            if self.enabled.replace(true) {
                Err(SleepError::Busy)
            } else {
                Ok(Epoch::from_raw(1))
            }
        }

        fn stop(&self) -> bool {
            self.enabled.replace(false)
        }

        fn force_ext_wake(&self, asserted: bool) {
            self.ext_wake.set(asserted);
        }

        fn recent_records(&self) -> Vec<SleepRecord, LOG_DRAIN_BATCH> {
            let mut records = Vec::new();
            let _ = records.push(SleepRecord {
                id: 1,
                epoch: Epoch::from_raw(1),
                event: SleepEvent::Started,
            });
            records
        }
    }

    #[test]
    fn cat_renders_endpoint_lines() {
        let executor = CommandExecutor::new(MockControl::new());
        let mut out = String::<64>::new();

        let outcome = executor.execute("cat hostwake", &mut out);

        assert_eq!(outcome, Ok(CommandOutcome::Read(Endpoint::HostWake)));
        assert_eq!(out.as_str(), "hostwake: 0\n");
    }

    #[test]
    fn echo_to_proto_starts_and_reports_busy() {
        let executor = CommandExecutor::new(MockControl::new());
        let mut out = String::<64>::new();

        assert_eq!(
            executor.execute("echo 1 > proto", &mut out),
            Ok(CommandOutcome::Wrote {
                endpoint: Endpoint::Proto,
                consumed: 1,
            })
        );
        assert_eq!(
            executor.execute("echo 1 > proto", &mut out),
            Err(CommandError::Sleep(SleepError::Busy))
        );

        executor.execute("cat proto", &mut out).unwrap();
        assert_eq!(out.as_str(), "proto: 1\n");
    }

    #[test]
    fn echo_to_read_only_endpoint_fails() {
        let executor = CommandExecutor::new(MockControl::new());
        let mut out = String::<64>::new();

        assert!(matches!(
            executor.execute("echo 1 > asleep", &mut out),
            Err(CommandError::Sleep(SleepError::InvalidInput(_)))
        ));
    }

    #[test]
    fn btwake_write_forces_line() {
        let executor = CommandExecutor::new(MockControl::new());
        let mut out = String::<64>::new();

        executor.execute("echo 1 > btwake", &mut out).unwrap();
        executor.execute("cat btwake", &mut out).unwrap();

        assert_eq!(out.as_str(), "btwake:1\n");
    }

    #[test]
    fn log_and_help_render() {
        let executor = CommandExecutor::new(MockControl::new());
        let mut out = String::<512>::new();

        assert_eq!(
            executor.execute("log", &mut out),
            Ok(CommandOutcome::Log { records: 1 })
        );
        assert!(out.starts_with("#1 [epoch 1] started"));

        out.clear();
        executor.execute("help proto", &mut out).unwrap();
        assert!(out.starts_with("proto: sleep protocol enabled"));

        out.clear();
        assert_eq!(
            executor.execute("help nothing", &mut out),
            Err(CommandError::UnknownTopic("nothing"))
        );
    }

    #[test]
    fn small_buffers_report_output_errors() {
        let executor = CommandExecutor::new(MockControl::new());
        let mut out = String::<8>::new();

        assert_eq!(
            executor.execute("status", &mut out),
            Err(CommandError::Output)
        );
    }
}
