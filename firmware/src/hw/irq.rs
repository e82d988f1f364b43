//! Host-wake edge interrupt registration.
//!
//! The EXTI line is owned by the host-wake task for the lifetime of the
//! firmware. Registering with the coordinator just opens an [`EdgeGate`] so
//! that edges seen by the task are forwarded to the interrupt entry point.

use bluesleep_core::hal::{HostWakeIrq, IrqError};
use portable_atomic::{AtomicBool, Ordering};

pub struct EdgeGate {
    open: AtomicBool,
}

impl EdgeGate {
    pub const fn new() -> Self {
        Self {
            open: AtomicBool::new(false),
        }
    }

    /// Returns `true` when an observed edge should reach the coordinator.
    pub fn accepts(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

impl Default for EdgeGate {
    fn default() -> Self {
        Self::new()
    }
}

/// [`HostWakeIrq`] handle onto the EXTI [`EdgeGate`].
pub struct ExtiHostWake {
    gate: &'static EdgeGate,
}

impl ExtiHostWake {
    pub const fn new(gate: &'static EdgeGate) -> Self {
        Self { gate }
    }
}

impl HostWakeIrq for ExtiHostWake {
    fn register(&mut self) -> Result<(), IrqError> {
        if self.gate.open.swap(true, Ordering::AcqRel) {
            return Err(IrqError::InUse);
        }
        Ok(())
    }

    fn unregister(&mut self) {
        self.gate.open.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_registration_reports_in_use() {
        static GATE: EdgeGate = EdgeGate::new();
        let mut irq = ExtiHostWake::new(&GATE);

        assert_eq!(irq.register(), Ok(()));
        assert!(GATE.accepts());
        assert_eq!(irq.register(), Err(IrqError::InUse));

        irq.unregister();
        assert!(!GATE.accepts());
        assert_eq!(irq.register(), Ok(()));
    }
}
