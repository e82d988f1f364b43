//! Suspend-inhibiting power reference.
//!
//! The MCU has no suspend framework, so the reference is a latch that
//! [`IdlePolicy`] consults before allowing STOP mode. Timed releases are
//! carried out by the power task; an acquire in the meantime bumps the
//! generation and voids the pending release.

use core::time::Duration;

use bluesleep_core::context::SleepMutex;
use bluesleep_core::hal::PowerReference;
use embassy_sync::signal::Signal;
use portable_atomic::{AtomicBool, AtomicU32, Ordering};

use super::idle::IdlePolicy;

/// Deferred release handed to the power task.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PendingRelease {
    pub after: Duration,
    pub generation: u32,
}

pub struct PowerLatch {
    held: AtomicBool,
    generation: AtomicU32,
    releases: Signal<SleepMutex, PendingRelease>,
}

impl PowerLatch {
    pub const fn new() -> Self {
        Self {
            held: AtomicBool::new(false),
            generation: AtomicU32::new(0),
            releases: Signal::new(),
        }
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    fn acquire(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.held.store(true, Ordering::Release);
    }

    fn schedule_release(&self, after: Duration) {
        let generation = self.generation.load(Ordering::Acquire);
        self.releases.signal(PendingRelease { after, generation });
    }

    /// Waits for the next scheduled release.
    pub async fn next_release(&self) -> PendingRelease {
        self.releases.wait().await
    }

    /// Drops the latch unless it was re-acquired after `release` was scheduled.
    pub fn complete(&self, release: PendingRelease) -> bool {
        if self.generation.load(Ordering::Acquire) != release.generation {
            return false;
        }
        self.held.store(false, Ordering::Release);
        true
    }
}

impl Default for PowerLatch {
    fn default() -> Self {
        Self::new()
    }
}

/// [`PowerReference`] handle onto the latch behind a static [`IdlePolicy`].
///
/// Acquiring re-applies the idle mode before returning, so STOP is already
/// ruled out by the time the coordinator powers the UART back up.
pub struct PowerHandle {
    idle: &'static IdlePolicy,
}

impl PowerHandle {
    pub const fn new(idle: &'static IdlePolicy) -> Self {
        Self { idle }
    }
}

impl PowerReference for PowerHandle {
    fn acquire(&mut self) {
        self.idle.latch().acquire();
        self.idle.refresh();
    }

    fn release_after(&mut self, grace: Duration) {
        self.idle.latch().schedule_release(grace);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::idle::IdleMode;
    use embassy_futures::block_on;

    #[test]
    fn release_completes_after_grace() {
        static LATCH: PowerLatch = PowerLatch::new();
        static IDLE: IdlePolicy = IdlePolicy::new(&LATCH);
        let mut power = PowerHandle::new(&IDLE);

        power.acquire();
        power.release_after(Duration::from_millis(500));
        let release = block_on(LATCH.next_release());

        assert_eq!(release.after, Duration::from_millis(500));
        assert!(LATCH.is_held());
        assert!(LATCH.complete(release));
        assert!(!LATCH.is_held());
    }

    #[test]
    fn reacquire_voids_pending_release() {
        static LATCH: PowerLatch = PowerLatch::new();
        static IDLE: IdlePolicy = IdlePolicy::new(&LATCH);
        let mut power = PowerHandle::new(&IDLE);

        power.acquire();
        power.release_after(Duration::from_millis(500));
        let release = block_on(LATCH.next_release());
        power.acquire();

        assert!(!LATCH.complete(release));
        assert!(LATCH.is_held());
    }

    #[test]
    fn held_reference_keeps_the_core_out_of_stop() {
        static LATCH: PowerLatch = PowerLatch::new();
        static IDLE: IdlePolicy = IdlePolicy::new(&LATCH);
        let mut power = PowerHandle::new(&IDLE);
        IDLE.set_bus_suspended(true);
        assert_eq!(IDLE.applied(), IdleMode::Stop);

        power.acquire();
        assert_eq!(IDLE.applied(), IdleMode::Sleep);

        power.release_after(Duration::from_millis(500));
        let release = block_on(LATCH.next_release());
        assert_eq!(IDLE.applied(), IdleMode::Sleep);

        assert!(LATCH.complete(release));
        assert_eq!(IDLE.refresh(), IdleMode::Stop);
    }
}
