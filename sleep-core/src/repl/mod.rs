//! Diagnostic console shared between firmware and emulator targets.
//!
//! The console grammar lives in [`grammar`]; [`commands`] dispatches parsed
//! commands against anything implementing [`SleepControl`], which
//! [`WakeContext`] does.

pub mod commands;
pub mod endpoints;
pub mod grammar;
pub mod status;

use heapless::Vec;

use crate::context::{LOG_DRAIN_BATCH, WakeContext};
use crate::error::SleepError;
use crate::hal::{ActivityTimer, HostWakeIrq, PowerReference, UartTransport, WakeGpio};
use crate::machine::{Epoch, SleepSnapshot};
use crate::telemetry::SleepRecord;

/// Operations the diagnostic surface needs from the coordinator.
pub trait SleepControl {
    fn snapshot(&self) -> SleepSnapshot;

    /// # Errors
    ///
    /// Propagates lifecycle errors such as [`SleepError::Busy`].
    fn start(&self) -> Result<Epoch, SleepError>;

    fn stop(&self) -> bool;

    fn force_ext_wake(&self, asserted: bool);

    fn recent_records(&self) -> Vec<SleepRecord, LOG_DRAIN_BATCH>;
}

impl<G, Tm, P, T, I> SleepControl for WakeContext<G, Tm, P, T, I>
where
    G: WakeGpio,
    Tm: ActivityTimer,
    P: PowerReference,
    T: UartTransport,
    I: HostWakeIrq,
{
    fn snapshot(&self) -> SleepSnapshot {
        WakeContext::snapshot(self)
    }

    fn start(&self) -> Result<Epoch, SleepError> {
        WakeContext::start(self)
    }

    fn stop(&self) -> bool {
        WakeContext::stop(self)
    }

    fn force_ext_wake(&self, asserted: bool) {
        WakeContext::force_ext_wake(self, asserted);
    }

    fn recent_records(&self) -> Vec<SleepRecord, LOG_DRAIN_BATCH> {
        WakeContext::recent_records(self)
    }
}

impl<C> SleepControl for &C
where
    C: SleepControl + ?Sized,
{
    fn snapshot(&self) -> SleepSnapshot {
        (**self).snapshot()
    }

    fn start(&self) -> Result<Epoch, SleepError> {
        (**self).start()
    }

    fn stop(&self) -> bool {
        (**self).stop()
    }

    fn force_ext_wake(&self, asserted: bool) {
        (**self).force_ext_wake(asserted);
    }

    fn recent_records(&self) -> Vec<SleepRecord, LOG_DRAIN_BATCH> {
        (**self).recent_records()
    }
}
