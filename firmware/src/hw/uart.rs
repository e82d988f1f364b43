//! HCI UART transport seen by the sleep coordinator.
//!
//! The bridge task owns the `BufferedUart`; the coordinator only needs to know
//! whether outbound bytes are still queued and to gate the link while asleep.

use bluesleep_core::context::SleepMutex;
use bluesleep_core::hal::UartTransport;
use embassy_sync::signal::Signal;
use portable_atomic::{AtomicBool, AtomicU32, Ordering};

/// Shared accounting between the bridge task and [`BridgeUart`].
pub struct UartGate {
    queued: AtomicU32,
    powered: AtomicBool,
    power_changed: Signal<SleepMutex, bool>,
}

impl UartGate {
    pub const fn new() -> Self {
        Self {
            queued: AtomicU32::new(0),
            powered: AtomicBool::new(true),
            power_changed: Signal::new(),
        }
    }

    /// Counts `bytes` as accepted for transmission but not yet flushed.
    pub fn note_queued(&self, bytes: usize) {
        let bytes = u32::try_from(bytes).unwrap_or(u32::MAX);
        // Saturating add via CAS loop.
        let _ = self
            .queued
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_add(bytes))
            });
    }

    /// Removes `bytes` from the outstanding count once flushed or dropped.
    pub fn note_drained(&self, bytes: usize) {
        let bytes = u32::try_from(bytes).unwrap_or(u32::MAX);
        let _ = self
            .queued
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_sub(bytes))
            });
    }

    pub fn queued(&self) -> u32 {
        self.queued.load(Ordering::Acquire)
    }

    pub fn is_powered(&self) -> bool {
        self.powered.load(Ordering::Acquire)
    }

    /// Resolves once the link is powered, returning immediately if it already is.
    pub async fn wait_powered(&self) {
        while !self.is_powered() {
            if self.power_changed.wait().await {
                break;
            }
        }
    }

    fn set_powered(&self, on: bool) {
        self.powered.store(on, Ordering::Release);
        self.power_changed.signal(on);
    }
}

impl Default for UartGate {
    fn default() -> Self {
        Self::new()
    }
}

/// [`UartTransport`] handle registered with the coordinator while the HCI
/// bridge port is open.
pub struct BridgeUart {
    gate: &'static UartGate,
}

impl BridgeUart {
    pub const fn new(gate: &'static UartGate) -> Self {
        Self { gate }
    }
}

impl UartTransport for BridgeUart {
    fn is_tx_empty(&mut self) -> bool {
        self.gate.queued() == 0
    }

    fn set_power(&mut self, on: bool) {
        self.gate.set_powered(on);
    }
}
