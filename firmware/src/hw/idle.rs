//! Idle depth selection.
//!
//! The thread executor parks the core with `WFE` whenever no task is ready.
//! With SLEEPDEEP set that wait becomes STOP mode, which halts the USB and
//! timer clocks until an EXTI line (host-wake included) fires. STOP is only
//! allowed while the USB host has suspended the bus and the sleep coordinator
//! has dropped its power reference.

use portable_atomic::{AtomicBool, Ordering};

use super::power::PowerLatch;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IdleMode {
    /// Plain sleep; peripherals stay clocked.
    Sleep,
    /// STOP mode on the next idle wait.
    Stop,
}

pub struct IdlePolicy {
    latch: &'static PowerLatch,
    bus_suspended: AtomicBool,
    stop_enabled: AtomicBool,
}

impl IdlePolicy {
    pub const fn new(latch: &'static PowerLatch) -> Self {
        Self {
            latch,
            bus_suspended: AtomicBool::new(false),
            stop_enabled: AtomicBool::new(false),
        }
    }

    pub fn latch(&self) -> &'static PowerLatch {
        self.latch
    }

    /// Mode the current votes allow.
    pub fn mode(&self) -> IdleMode {
        if !self.latch.is_held() && self.bus_suspended.load(Ordering::Acquire) {
            IdleMode::Stop
        } else {
            IdleMode::Sleep
        }
    }

    /// Mode last written to the core.
    pub fn applied(&self) -> IdleMode {
        if self.stop_enabled.load(Ordering::Acquire) {
            IdleMode::Stop
        } else {
            IdleMode::Sleep
        }
    }

    /// Records a USB bus suspend or resume and re-applies the idle mode.
    pub fn set_bus_suspended(&self, suspended: bool) {
        self.bus_suspended.store(suspended, Ordering::Release);
        self.refresh();
    }

    /// Re-applies the idle mode after a vote changed.
    pub fn refresh(&self) -> IdleMode {
        critical_section::with(|_| {
            let mode = self.mode();
            self.stop_enabled
                .store(mode == IdleMode::Stop, Ordering::Release);
            apply(mode);
            mode
        })
    }
}

#[cfg(target_os = "none")]
fn apply(mode: IdleMode) {
    // SAFETY: SCB.SCR is only written here, and only inside a critical section.
    let mut core = unsafe { cortex_m::Peripherals::steal() };
    match mode {
        IdleMode::Stop => core.SCB.set_sleepdeep(),
        IdleMode::Sleep => core.SCB.clear_sleepdeep(),
    }
}

#[cfg(not(target_os = "none"))]
fn apply(_mode: IdleMode) {}
