//! Collaborator traits implemented by board crates.
//!
//! The state machine never touches hardware directly. Firmware binds these
//! traits to GPIO pins, an embassy timer task, and the UART driver; tests and
//! the emulator bind them to simulated equivalents. Every call happens while
//! the coordinator lock is held, so implementations must not block.

use core::fmt;
use core::time::Duration;

use crate::machine::TimerTicket;

/// Wake lines shared between the host and the Bluetooth controller.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WakeLine {
    /// Input driven by the controller when it needs the host UART awake.
    HostWake,
    /// Output driven by the host while its UART is awake (bt-wake).
    ExtWake,
}

impl WakeLine {
    /// Returns the canonical lowercase identifier for the line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            WakeLine::HostWake => "host_wake",
            WakeLine::ExtWake => "ext_wake",
        }
    }
}

impl fmt::Display for WakeLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access to the two wake lines. Both lines are active high.
pub trait WakeGpio {
    /// Returns `true` when `line` is asserted.
    fn read(&self, line: WakeLine) -> bool;

    /// Drives the ext-wake output.
    fn set_ext_wake(&mut self, asserted: bool);
}

/// The UART transport currently bound to the controller.
pub trait UartTransport {
    /// Returns `true` when no outbound bytes are buffered.
    fn is_tx_empty(&mut self) -> bool;

    /// Gates the UART clock and line driver.
    fn set_power(&mut self, on: bool);
}

/// Restartable one-shot activity timer.
///
/// Expiry must be reported back through
/// [`crate::context::WakeContext::on_timer_expiry`] with the ticket passed to
/// the arm that fired.
pub trait ActivityTimer {
    /// Schedules an expiry after `after`, replacing any pending one.
    fn arm(&mut self, after: Duration, ticket: TimerTicket);

    /// Cancels the pending expiry, if any.
    fn cancel(&mut self);
}

/// Suspend-inhibiting power reference.
pub trait PowerReference {
    /// Holds the reference, superseding any pending timed release.
    fn acquire(&mut self);

    /// Drops the reference once `grace` has elapsed.
    fn release_after(&mut self, grace: Duration);
}

/// Reasons the host-wake interrupt could not be registered.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IrqError {
    /// Another handler already owns the line.
    InUse,
    /// The line cannot be mapped to an interrupt.
    Unmappable,
}

impl fmt::Display for IrqError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrqError::InUse => f.write_str("interrupt in use"),
            IrqError::Unmappable => f.write_str("line has no interrupt"),
        }
    }
}

/// Registration handle for the host-wake edge interrupt.
pub trait HostWakeIrq {
    /// Enables delivery of host-wake edges to the interrupt handler.
    ///
    /// # Errors
    ///
    /// Returns an [`IrqError`] when the interrupt cannot be claimed.
    fn register(&mut self) -> Result<(), IrqError>;

    /// Disables delivery of host-wake edges.
    fn unregister(&mut self);
}

/// Power reference for platforms without a suspend framework.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopPowerReference;

impl PowerReference for NoopPowerReference {
    fn acquire(&mut self) {}

    fn release_after(&mut self, _grace: Duration) {}
}

/// Interrupt handle for boards that poll the host-wake line.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHostWakeIrq;

impl HostWakeIrq for NoopHostWakeIrq {
    fn register(&mut self) -> Result<(), IrqError> {
        Ok(())
    }

    fn unregister(&mut self) {}
}
