//! Shared coordinator context.
//!
//! [`WakeContext`] is the one object every execution context talks to: the
//! host-wake interrupt handler, the deferred host-wake worker, the activity
//! timer, the outgoing-data hook, and the diagnostic surface. All state lives
//! behind a single critical-section mutex. The interrupt path never takes that
//! lock; it only posts the current epoch into a single-slot signal that the
//! worker drains.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use heapless::Vec;
use portable_atomic::{AtomicBool, AtomicU32, Ordering};

use crate::config::SleepConfig;
use crate::error::SleepError;
use crate::hal::{ActivityTimer, HostWakeIrq, PowerReference, UartTransport, WakeGpio};
use crate::machine::{
    Epoch, HostWakeOutcome, LinkState, SleepSnapshot, TimerTicket, WakeStateMachine,
};
use crate::telemetry::{LogCursor, SleepRecord};

/// Raw mutex guarding the coordinator. Safe to share with interrupt handlers.
pub type SleepMutex = CriticalSectionRawMutex;

/// Maximum number of log records returned by a single drain.
pub const LOG_DRAIN_BATCH: usize = 16;

struct Shared<G, Tm, P, T, I> {
    machine: WakeStateMachine<G, Tm, P, T>,
    irq: I,
}

/// Owned coordinator instance shared by all execution contexts.
pub struct WakeContext<G, Tm, P, T, I> {
    shared: Mutex<SleepMutex, RefCell<Shared<G, Tm, P, T, I>>>,
    start_guard: AtomicBool,
    epoch: AtomicU32,
    host_wake_work: Signal<SleepMutex, Epoch>,
}

impl<G, Tm, P, T, I> WakeContext<G, Tm, P, T, I> {
    /// Creates a stopped context around the board collaborators.
    #[must_use]
    pub const fn new(gpio: G, timer: Tm, power: P, irq: I, config: SleepConfig) -> Self {
        Self {
            shared: Mutex::new(RefCell::new(Shared {
                machine: WakeStateMachine::new(gpio, timer, power, config),
                irq,
            })),
            start_guard: AtomicBool::new(false),
            epoch: AtomicU32::new(Epoch::INITIAL.raw()),
            host_wake_work: Signal::new(),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut Shared<G, Tm, P, T, I>) -> R) -> R {
        self.shared.lock(|cell| f(&mut cell.borrow_mut()))
    }

    /// Runs `f` against the machine and interrupt handle under the lock.
    pub fn inspect<R>(&self, f: impl FnOnce(&WakeStateMachine<G, Tm, P, T>, &I) -> R) -> R {
        self.with(|shared| f(&shared.machine, &shared.irq))
    }

    /// Returns `true` while the start guard is held.
    pub fn is_started(&self) -> bool {
        self.start_guard.load(Ordering::Acquire)
    }

    /// Epoch published to the interrupt path.
    pub fn current_epoch(&self) -> Epoch {
        Epoch::from_raw(self.epoch.load(Ordering::Acquire))
    }

    /// Interrupt-context entry point for a host-wake edge.
    ///
    /// Posts the current epoch into the single-slot work queue. A burst of
    /// edges collapses into one pending item.
    pub fn on_host_wake_irq(&self) {
        self.host_wake_work.signal(self.current_epoch());
    }

    /// Takes the pending host-wake item without waiting.
    pub fn take_host_wake(&self) -> Option<Epoch> {
        self.host_wake_work.try_take()
    }

    /// Waits for the next host-wake item.
    pub async fn next_host_wake(&self) -> Epoch {
        self.host_wake_work.wait().await
    }

    /// Returns `true` when a host-wake item is waiting for the worker.
    pub fn host_wake_pending(&self) -> bool {
        self.host_wake_work.signaled()
    }

    /// Copies records newer than `cursor` out of the event log.
    pub fn drain_log(&self, cursor: &mut LogCursor) -> Vec<SleepRecord, LOG_DRAIN_BATCH> {
        self.with(|shared| {
            let mut batch = Vec::new();
            let mut limited = *cursor;
            shared.machine.drain_log(&mut limited, |record| {
                if batch.push(*record).is_ok() {
                    *cursor = LogCursor::at(record.id);
                }
            });
            batch
        })
    }

    /// Returns the newest retained log records, oldest first.
    pub fn recent_records(&self) -> Vec<SleepRecord, LOG_DRAIN_BATCH> {
        self.with(|shared| {
            let log = shared.machine.log();
            let skip = log.len().saturating_sub(LOG_DRAIN_BATCH);
            log.oldest_first().skip(skip).copied().collect()
        })
    }
}

impl<G, Tm, P, T, I> WakeContext<G, Tm, P, T, I>
where
    G: WakeGpio,
    Tm: ActivityTimer,
    P: PowerReference,
    T: UartTransport,
    I: HostWakeIrq,
{
    /// Enables the sleep protocol.
    ///
    /// # Errors
    ///
    /// Returns [`SleepError::Busy`] while another start holds the guard or the
    /// protocol is already enabled, and [`SleepError::ResourceUnavailable`] if
    /// the host-wake interrupt cannot be registered.
    pub fn start(&self) -> Result<Epoch, SleepError> {
        if self
            .start_guard
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SleepError::Busy);
        }

        let result: Result<Epoch, SleepError> = self.with(|shared| {
            let Shared { machine, irq } = shared;
            let epoch = machine.start(|| irq.register())?;
            self.epoch.store(epoch.raw(), Ordering::Release);
            Ok(epoch)
        });

        if result.is_err() {
            self.start_guard.store(false, Ordering::Release);
        }
        result
    }

    /// Disables the sleep protocol. Returns `false` when it was not enabled.
    ///
    /// Once this returns, pending host-wake work and timer expiries from the
    /// previous epoch are discarded when they run.
    pub fn stop(&self) -> bool {
        let stopped = self.with(|shared| {
            if !shared.machine.stop() {
                return false;
            }
            shared.irq.unregister();
            self.epoch
                .store(shared.machine.epoch().raw(), Ordering::Release);
            self.host_wake_work.reset();
            true
        });

        if stopped {
            self.start_guard.store(false, Ordering::Release);
        }
        stopped
    }

    /// Worker-context handler for a host-wake item.
    pub fn handle_host_wake(&self, epoch: Epoch) -> HostWakeOutcome {
        self.with(|shared| shared.machine.on_host_wake(epoch))
    }

    /// Takes and handles the pending host-wake item, if any.
    pub fn service_host_wake(&self) -> Option<HostWakeOutcome> {
        self.take_host_wake().map(|epoch| self.handle_host_wake(epoch))
    }

    /// Timer-context handler for an activity timer expiry.
    pub fn on_timer_expiry(&self, ticket: TimerTicket) {
        self.with(|shared| shared.machine.on_timer_expiry(ticket));
    }

    /// Outgoing-data hook, called once per frame handed to the transport.
    pub fn on_outgoing_data(&self) {
        self.with(|shared| shared.machine.note_tx_activity());
    }

    pub fn evaluate_sleep(&self) {
        self.with(|shared| shared.machine.evaluate_sleep());
    }

    pub fn wake(&self) -> bool {
        self.with(|shared| shared.machine.wake())
    }

    pub fn can_sleep(&self) -> bool {
        self.with(|shared| shared.machine.can_sleep())
    }

    pub fn state(&self) -> LinkState {
        self.with(|shared| shared.machine.state())
    }

    pub fn snapshot(&self) -> SleepSnapshot {
        self.with(|shared| shared.machine.snapshot())
    }

    /// Drives ext-wake directly. Used by the `btwake` diagnostic endpoint.
    pub fn force_ext_wake(&self, asserted: bool) {
        self.with(|shared| shared.machine.force_ext_wake(asserted));
    }

    /// Binds the controller transport.
    ///
    /// # Errors
    ///
    /// Hands `transport` back when one is already attached.
    pub fn attach_transport(&self, transport: T) -> Result<(), T> {
        self.with(|shared| shared.machine.attach_transport(transport))
    }

    /// Unbinds the controller transport.
    pub fn detach_transport(&self) -> Option<T> {
        self.with(|shared| shared.machine.detach_transport())
    }
}
