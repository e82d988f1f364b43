//! Board bindings for the sleep coordinator collaborators.
//!
//! The coordinator lives in a `static`, so every collaborator here is a
//! zero-sized or `&'static` handle onto shared state. The tasks that own the
//! actual peripherals (EXTI input, embassy timer, UART) live in `runtime` and
//! observe that state through atomics and signals.

pub mod idle;
pub mod irq;
pub mod power;
pub mod timer;
pub mod uart;

use bluesleep_core::hal::{WakeGpio, WakeLine};
use portable_atomic::{AtomicBool, Ordering};

pub use idle::IdlePolicy;
pub use irq::{EdgeGate, ExtiHostWake};
pub use power::{PowerHandle, PowerLatch};
pub use timer::{SignalTimer, TimerCommand, TimerCommands};
pub use uart::{BridgeUart, UartGate};

/// Last level driven onto the ext-wake output.
pub struct LineMirror {
    ext_wake: AtomicBool,
}

impl LineMirror {
    pub const fn new() -> Self {
        Self {
            ext_wake: AtomicBool::new(false),
        }
    }

    pub fn ext_wake(&self) -> bool {
        self.ext_wake.load(Ordering::Acquire)
    }

    fn record_ext_wake(&self, asserted: bool) {
        self.ext_wake.store(asserted, Ordering::Release);
    }
}

impl Default for LineMirror {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads the current host-wake input level.
pub type HostWakeSampler = fn() -> bool;

/// Wake-line access for the coordinator.
///
/// `host_wake` is sampled from the pin on every read so the decision made
/// under the coordinator lock sees the live level even before the edge task
/// has run. On target the ext-wake output pin is driven synchronously from
/// [`WakeGpio::set_ext_wake`] once [`install_ext_wake`] has handed it over.
pub struct BoardGpio {
    lines: &'static LineMirror,
    sample_host_wake: HostWakeSampler,
}

impl BoardGpio {
    pub const fn new(lines: &'static LineMirror, sample_host_wake: HostWakeSampler) -> Self {
        Self {
            lines,
            sample_host_wake,
        }
    }
}

impl WakeGpio for BoardGpio {
    fn read(&self, line: WakeLine) -> bool {
        match line {
            WakeLine::HostWake => (self.sample_host_wake)(),
            WakeLine::ExtWake => self.lines.ext_wake(),
        }
    }

    fn set_ext_wake(&mut self, asserted: bool) {
        self.lines.record_ext_wake(asserted);
        drive_ext_wake(asserted);
    }
}

#[cfg(target_os = "none")]
mod pin {
    use core::cell::RefCell;

    use bluesleep_core::context::SleepMutex;
    use embassy_stm32::gpio::{Level, Output};
    use embassy_sync::blocking_mutex::Mutex;

    static EXT_WAKE_PIN: Mutex<SleepMutex, RefCell<Option<Output<'static>>>> =
        Mutex::new(RefCell::new(None));

    pub fn install(pin: Output<'static>) {
        EXT_WAKE_PIN.lock(|cell| {
            cell.borrow_mut().replace(pin);
        });
    }

    pub fn drive(asserted: bool) {
        EXT_WAKE_PIN.lock(|cell| {
            if let Some(pin) = cell.borrow_mut().as_mut() {
                pin.set_level(Level::from(asserted));
            }
        });
    }
}

/// Hands the ext-wake output pin to [`BoardGpio`].
#[cfg(target_os = "none")]
pub fn install_ext_wake(pin: embassy_stm32::gpio::Output<'static>) {
    pin::install(pin);
}

#[cfg(target_os = "none")]
fn drive_ext_wake(asserted: bool) {
    pin::drive(asserted);
}

#[cfg(not(target_os = "none"))]
fn drive_ext_wake(_asserted: bool) {}
