use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use bluesleep_core::config::SleepConfig;
use bluesleep_core::context::LOG_DRAIN_BATCH;
use bluesleep_core::hci::{ControllerEvent, RegistrationOutcome};
use bluesleep_core::machine::HostWakeOutcome;
use bluesleep_core::repl::commands::{CommandExecutor, CommandOutcome};
use bluesleep_core::telemetry::LogCursor;

use crate::board::{self, Deadline, SimBoard, SimContext};
use crate::sim::{self, SIM_HELP, SimCommand};

/// Interactive emulator session: console plus board commands over a
/// simulated board.
pub struct Session {
    board: SimBoard,
    ctx: SimContext,
    cursor: LogCursor,
    transcript: Option<TranscriptLogger>,
}

impl Session {
    pub fn new(board: SimBoard, config: SleepConfig) -> Self {
        let ctx = board::context(&board, config);
        Self {
            board,
            ctx,
            cursor: LogCursor::new(),
            transcript: None,
        }
    }

    /// Mirrors every exchange into `transcript`.
    #[must_use]
    pub fn with_transcript(mut self, transcript: TranscriptLogger) -> Self {
        self.transcript = Some(transcript);
        self
    }

    pub fn board(&self) -> &SimBoard {
        &self.board
    }

    pub fn context(&self) -> &SimContext {
        &self.ctx
    }

    /// Runs one input line and returns the response lines.
    ///
    /// # Errors
    ///
    /// Fails only when the transcript cannot be written.
    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        self.record(TranscriptRole::Host, trimmed)?;

        let mut lines = match sim::parse(trimmed) {
            Some(Ok(command)) => self.apply(command),
            Some(Err(err)) => vec![format!("ERR {err}")],
            None => self.console(trimmed),
        };
        lines.extend(self.run_worker());
        lines.extend(self.drain_events());

        for response in &lines {
            self.record(TranscriptRole::Emulator, response)?;
        }
        Ok(lines)
    }

    fn console(&self, line: &str) -> Vec<String> {
        let mut out = String::new();
        let executor = CommandExecutor::new(&self.ctx);
        match executor.execute(line, &mut out) {
            Ok(outcome) => {
                let mut lines: Vec<String> = out.lines().map(str::to_owned).collect();
                if let CommandOutcome::Wrote { endpoint, consumed } = outcome {
                    lines.push(format!("OK {endpoint} ({consumed} bytes)"));
                }
                if outcome == CommandOutcome::Help && !line.contains(' ') {
                    lines.push("board commands:".to_owned());
                    lines.extend(SIM_HELP.iter().map(|entry| format!("  {entry}")));
                }
                lines
            }
            Err(err) => vec![format!("ERR {err}")],
        }
    }

    fn apply(&mut self, command: SimCommand) -> Vec<String> {
        match command {
            SimCommand::Advance(by) => {
                self.advance(by);
                vec![format!("t={}ms", self.board.now().as_millis())]
            }
            SimCommand::HostWake(level) => {
                let changed = self.board.set_host_wake(level);
                let registered = self.board.state().irq_registered;
                if changed && registered {
                    self.ctx.on_host_wake_irq();
                    vec![format!("host_wake={} (edge delivered)", u8::from(level))]
                } else {
                    vec![format!("host_wake={}", u8::from(level))]
                }
            }
            SimCommand::Send(bytes) => {
                self.board.state().uart_queued += bytes;
                self.ctx.on_outgoing_data();
                let sent = self.board.drain_uart();
                vec![format!("uart sent {sent} bytes")]
            }
            SimCommand::Queue(bytes) => {
                let mut state = self.board.state();
                state.uart_queued += bytes;
                vec![format!("uart queued {} bytes", state.uart_queued)]
            }
            SimCommand::Flush => {
                let sent = self.board.drain_uart();
                vec![format!("uart sent {sent} bytes")]
            }
            SimCommand::Attach => {
                let event = ControllerEvent::Registered(self.board.uart());
                vec![describe_registration(&self.ctx.notify_controller(event))]
            }
            SimCommand::Detach => {
                let outcome = self.ctx.notify_controller(ControllerEvent::Unregistered);
                vec![describe_registration(&outcome)]
            }
            SimCommand::IrqFault(fault) => {
                self.board.state().irq_fault = fault;
                vec![match fault {
                    Some(err) => format!("next irq registration fails: {err}"),
                    None => "irq registration allowed".to_owned(),
                }]
            }
            SimCommand::Board => vec![self.board.to_string()],
        }
    }

    /// Moves the virtual clock forward, firing timer and power deadlines in order.
    pub fn advance(&mut self, by: Duration) {
        let target = self.board.now().saturating_add(by);
        while let Some(deadline) = self.board.next_deadline(target) {
            self.board.fire(deadline);
            if let Deadline::Timer(_, ticket) = deadline {
                self.ctx.on_timer_expiry(ticket);
            }
        }
        self.board.set_now(target);
    }

    /// Runs the deferred host-wake worker once.
    fn run_worker(&self) -> Option<String> {
        let outcome = self.ctx.service_host_wake()?;
        let label = match outcome {
            HostWakeOutcome::Woke => "woke link",
            HostWakeOutcome::AlreadyAwake => "link already awake",
            HostWakeOutcome::Stale => "discarded stale work",
        };
        Some(format!("worker: {label}"))
    }

    fn drain_events(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        loop {
            let batch = self.ctx.drain_log(&mut self.cursor);
            lines.extend(batch.iter().map(|record| format!("event {record}")));
            if batch.len() < LOG_DRAIN_BATCH {
                return lines;
            }
        }
    }

    fn record(&mut self, role: TranscriptRole, line: &str) -> io::Result<()> {
        let now = self.board.now();
        match self.transcript.as_mut() {
            Some(transcript) => transcript.append_line(now, role, line),
            None => Ok(()),
        }
    }
}

fn describe_registration<T>(outcome: &RegistrationOutcome<T>) -> String {
    match outcome {
        RegistrationOutcome::Attached => "controller attached".to_owned(),
        RegistrationOutcome::Rejected(_) => "controller rejected: transport already bound".to_owned(),
        RegistrationOutcome::Detached(_) => "controller detached".to_owned(),
        RegistrationOutcome::NotAttached => "no controller attached".to_owned(),
    }
}

/// Timestamped log of a session, keyed to the virtual clock.
pub struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    /// Creates (or truncates) the transcript at `path`.
    ///
    /// # Errors
    ///
    /// Propagates filesystem errors.
    pub fn create(path: &Path, title: &str) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };
        logger.write_header(title)?;
        Ok(logger)
    }

    fn write_header(&mut self, title: &str) -> io::Result<()> {
        writeln!(self.writer, "# Bluesleep emulator transcript: {title}")?;
        writeln!(self.writer, "# Timestamps are virtual milliseconds since power-on")?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(&mut self, now: Duration, role: TranscriptRole, line: &str) -> io::Result<()> {
        writeln!(self.writer, "{}", format_line(now, role, line))?;
        self.writer.flush()
    }
}

#[derive(Clone, Copy)]
enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

fn format_line(now: Duration, role: TranscriptRole, line: &str) -> String {
    let mut buffer = String::new();
    let _ = write!(buffer, "[+{:>6} ms] {} {}", now.as_millis(), role.prefix(), line);
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::PinMap;
    use bluesleep_core::LinkState;

    fn session() -> Session {
        let mut session = Session::new(SimBoard::new(PinMap::DEFAULT), SleepConfig::DEFAULT);
        session.handle_command("attach").expect("attach");
        session
    }

    fn run(session: &mut Session, line: &str) -> Vec<String> {
        session.handle_command(line).expect("no transcript")
    }

    #[test]
    fn idle_link_sleeps_after_one_interval() {
        let mut session = session();
        run(&mut session, "echo 1 > proto");

        let lines = run(&mut session, "advance 6s");

        assert_eq!(lines[0], "t=6000ms");
        assert!(lines.iter().any(|line| line.ends_with("entered-sleep")));
        assert_eq!(run(&mut session, "cat asleep"), ["asleep: 1"]);
        assert!(!session.board().state().uart_powered);
    }

    #[test]
    fn host_wake_edge_runs_worker() {
        let mut session = session();
        run(&mut session, "echo 1 > proto");
        run(&mut session, "advance 6s");

        let lines = run(&mut session, "hostwake 1");

        assert_eq!(lines[0], "host_wake=1 (edge delivered)");
        assert!(lines.contains(&"worker: woke link".to_owned()));
        assert_eq!(session.context().state(), LinkState::ActiveAwake);
    }

    #[test]
    fn queued_bytes_hold_the_link_awake() {
        let mut session = session();
        run(&mut session, "echo 1 > proto");
        run(&mut session, "queue 12");

        run(&mut session, "advance 6s");
        assert_eq!(session.context().state(), LinkState::ActiveAwake);

        run(&mut session, "flush");
        run(&mut session, "advance 6s");
        assert_eq!(session.context().state(), LinkState::ActiveAsleep);
    }

    #[test]
    fn power_reference_released_after_grace() {
        let mut session = session();
        run(&mut session, "echo 1 > proto");
        run(&mut session, "echo 0 > proto");
        assert!(session.board().state().power_held);

        run(&mut session, "advance 499ms");
        assert!(session.board().state().power_held);
        run(&mut session, "advance 1ms");
        assert!(!session.board().state().power_held);
    }

    #[test]
    fn irq_fault_fails_start() {
        let mut session = session();
        run(&mut session, "irq busy");

        let lines = run(&mut session, "echo 1 > proto");

        assert!(lines[0].starts_with("ERR resource unavailable"), "{lines:?}");
        assert_eq!(run(&mut session, "cat proto"), ["proto: 0"]);
        assert!(!session.board().state().ext_wake);
    }

    #[test]
    fn transcript_lines_are_timestamped() {
        assert_eq!(
            format_line(Duration::from_millis(6000), TranscriptRole::Host, "cat asleep"),
            "[+  6000 ms] HOST> cat asleep"
        );
    }
}
