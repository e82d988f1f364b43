//! CDC0 console session.
//!
//! Assembles bytes from the USB console port into lines, runs them through the
//! shared [`CommandExecutor`], and chunks the response back into USB-sized
//! frames. The grammar and endpoint semantics live in `bluesleep-core`.

use core::fmt::Write as _;
use core::str;

use bluesleep_core::repl::SleepControl;
use bluesleep_core::repl::commands::CommandExecutor;
use embassy_sync::channel::Channel;
use heapless::{String, Vec};

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;

#[cfg(target_os = "none")]
type ReplMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type ReplMutex = NoopRawMutex;

/// Maximum number of bytes accepted on a single console line (excluding terminator).
pub const MAX_LINE_LEN: usize = 96;

/// Size of a console frame exchanged with the USB task.
pub const REPL_FRAME_SIZE: usize = 64;

pub const REPL_QUEUE_DEPTH: usize = 8;

/// Room for the longest response (a full `log` batch).
pub const RESPONSE_CAPACITY: usize = 1024;

pub type ReplFrame = Vec<u8, REPL_FRAME_SIZE>;
pub type ReplChannel = Channel<ReplMutex, ReplFrame, REPL_QUEUE_DEPTH>;
pub type Response = String<RESPONSE_CAPACITY>;

/// Errors surfaced by the console session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplError {
    /// Encountered non-UTF-8 data in the assembled line buffer.
    InvalidUtf8,
    /// Input exceeded [`MAX_LINE_LEN`]; the line was discarded.
    LineOverflow,
}

/// Line-oriented console bound to a [`SleepControl`].
pub struct ReplSession<C> {
    executor: CommandExecutor<C>,
    buffer: Vec<u8, MAX_LINE_LEN>,
    discarding: bool,
}

impl<C> ReplSession<C>
where
    C: SleepControl,
{
    pub const fn new(control: C) -> Self {
        Self {
            executor: CommandExecutor::new(control),
            buffer: Vec::new(),
            discarding: false,
        }
    }

    /// Drops any partial line, e.g. after the host reconnects.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.discarding = false;
    }

    /// Feeds a single byte into the session.
    ///
    /// A line terminator executes the buffered line and appends the response
    /// (or an `error:` line) to `out`. Returns `true` when a line completed.
    ///
    /// # Errors
    ///
    /// Reports a discarded line as [`ReplError::LineOverflow`] or
    /// [`ReplError::InvalidUtf8`] once its terminator arrives.
    pub fn ingest(&mut self, byte: u8, out: &mut Response) -> Result<bool, ReplError> {
        match byte {
            b'\r' | b'\n' => self.finish_line(out),
            0x08 | 0x7f => {
                self.buffer.pop();
                Ok(false)
            }
            value => {
                if !self.discarding && self.buffer.push(value).is_err() {
                    self.discarding = true;
                }
                Ok(false)
            }
        }
    }

    fn finish_line(&mut self, out: &mut Response) -> Result<bool, ReplError> {
        if core::mem::take(&mut self.discarding) {
            self.buffer.clear();
            let _ = writeln!(out, "error: line longer than {MAX_LINE_LEN} bytes");
            return Err(ReplError::LineOverflow);
        }
        if self.buffer.is_empty() {
            return Ok(false);
        }

        let result = match str::from_utf8(&self.buffer) {
            Ok(line) => {
                let mark = out.len();
                if let Err(err) = self.executor.execute(line, out) {
                    out.truncate(mark);
                    let _ = writeln!(out, "error: {err}");
                }
                Ok(true)
            }
            Err(_) => {
                let _ = writeln!(out, "error: input is not UTF-8");
                Err(ReplError::InvalidUtf8)
            }
        };
        self.buffer.clear();
        result
    }
}

/// Splits `response` into frames no larger than [`REPL_FRAME_SIZE`].
pub fn frames(response: &str) -> impl Iterator<Item = ReplFrame> + '_ {
    response
        .as_bytes()
        .chunks(REPL_FRAME_SIZE)
        .filter_map(|chunk| ReplFrame::from_slice(chunk).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluesleep_core::error::SleepError;
    use bluesleep_core::machine::{Epoch, LinkState, SleepSnapshot};
    use bluesleep_core::telemetry::SleepRecord;
    use core::cell::Cell;

    #[derive(Default)]
    struct FakeControl {
        started: Cell<bool>,
    }

    impl SleepControl for FakeControl {
        fn snapshot(&self) -> SleepSnapshot {
            SleepSnapshot {
                state: if self.started.get() {
                    LinkState::ActiveAwake
                } else {
                    LinkState::Disabled
                },
                ext_wake: self.started.get(),
                host_wake: false,
                tx_frames: 0,
                timer_armed: self.started.get(),
                transport_attached: true,
                epoch: Epoch::INITIAL,
            }
        }

        fn start(&self) -> Result<Epoch, SleepError> {
            if self.started.replace(true) {
                return Err(SleepError::Busy);
            }
            Ok(Epoch::from_raw(1))
        }

        fn stop(&self) -> bool {
            self.started.replace(false)
        }

        fn force_ext_wake(&self, _asserted: bool) {}

        fn recent_records(&self) -> heapless::Vec<SleepRecord, 16> {
            heapless::Vec::new()
        }
    }

    fn feed(session: &mut ReplSession<FakeControl>, input: &[u8]) -> (Response, Vec<Result<bool, ReplError>, 8>) {
        let mut out = Response::new();
        let mut results = Vec::new();
        for &byte in input {
            let result = session.ingest(byte, &mut out);
            if matches!(result, Ok(true) | Err(_)) {
                results.push(result).expect("few lines per test");
            }
        }
        (out, results)
    }

    #[test]
    fn executes_completed_lines() {
        let mut session = ReplSession::new(FakeControl::default());

        let (out, results) = feed(&mut session, b"echo 1 > proto\ncat proto\r\n");

        assert_eq!(results.as_slice(), &[Ok(true), Ok(true)]);
        assert_eq!(out.as_str(), "proto: 1\n");
    }

    #[test]
    fn backspace_edits_the_line() {
        let mut session = ReplSession::new(FakeControl::default());

        let (out, _) = feed(&mut session, b"cat protp\x7fo\n");

        assert_eq!(out.as_str(), "proto: 0\n");
    }

    #[test]
    fn command_errors_become_error_lines() {
        let mut session = ReplSession::new(FakeControl::default());

        let (out, results) = feed(&mut session, b"echo 1 > proto\necho 1 > proto\n");

        assert_eq!(results.as_slice(), &[Ok(true), Ok(true)]);
        assert!(out.starts_with("error: "), "unexpected output: {out}");
    }

    #[test]
    fn overflow_discards_the_whole_line() {
        let mut session = ReplSession::new(FakeControl::default());
        let mut input: Vec<u8, 128> = Vec::new();
        input.resize(MAX_LINE_LEN + 4, b'a').expect("fits");
        input.push(b'\n').expect("fits");

        let (out, results) = feed(&mut session, &input);

        assert_eq!(results.as_slice(), &[Err(ReplError::LineOverflow)]);
        assert!(out.starts_with("error: line longer than"));

        let (out, _) = feed(&mut session, b"cat asleep\n");
        assert_eq!(out.as_str(), "asleep: 0\n");
    }

    #[test]
    fn reset_drops_partial_line_from_previous_connection() {
        let mut session = ReplSession::new(FakeControl::default());
        let (out, results) = feed(&mut session, b"echo 1 > pro");
        assert!(out.is_empty());
        assert!(results.is_empty());

        session.reset();
        let (out, results) = feed(&mut session, b"cat proto\n");

        assert_eq!(results.as_slice(), &[Ok(true)]);
        assert_eq!(out.as_str(), "proto: 0\n");
    }

    #[test]
    fn responses_split_into_usb_frames() {
        let text = "x".repeat(REPL_FRAME_SIZE * 2 + 3);

        let sizes: std::vec::Vec<usize> = frames(&text).map(|frame| frame.len()).collect();

        assert_eq!(sizes, [REPL_FRAME_SIZE, REPL_FRAME_SIZE, 3]);
    }
}
