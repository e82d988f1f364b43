//! Activity timer driven by an embassy task.
//!
//! [`SignalTimer`] only posts commands; the timer task in `runtime` owns the
//! actual `embassy_time::Timer` and reports expiries back to the coordinator
//! with the ticket of the arm that fired. A newer command always replaces an
//! older one that the task has not picked up yet.

use core::time::Duration;

use bluesleep_core::context::SleepMutex;
use bluesleep_core::hal::ActivityTimer;
use bluesleep_core::machine::TimerTicket;
use embassy_sync::signal::Signal;

/// Instruction for the timer task.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TimerCommand {
    Arm { after: Duration, ticket: TimerTicket },
    Cancel,
}

/// Single-slot command mailbox between the coordinator and the timer task.
pub type TimerCommands = Signal<SleepMutex, TimerCommand>;

/// [`ActivityTimer`] that forwards to the timer task.
pub struct SignalTimer {
    commands: &'static TimerCommands,
}

impl SignalTimer {
    pub const fn new(commands: &'static TimerCommands) -> Self {
        Self { commands }
    }
}

impl ActivityTimer for SignalTimer {
    fn arm(&mut self, after: Duration, ticket: TimerTicket) {
        self.commands.signal(TimerCommand::Arm { after, ticket });
    }

    fn cancel(&mut self) {
        self.commands.signal(TimerCommand::Cancel);
    }
}

/// Converts a core duration into embassy ticks, saturating on overflow.
pub fn to_embassy(duration: Duration) -> embassy_time::Duration {
    let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
    embassy_time::Duration::from_micros(micros)
}
