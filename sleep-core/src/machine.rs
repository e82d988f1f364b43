//! Wake/sleep state machine.
//!
//! [`WakeStateMachine`] is the only component that drives the ext-wake line,
//! arms or cancels the activity timer, and gates UART power. It is not
//! synchronized on its own; [`crate::context::WakeContext`] wraps it in the
//! coordinator lock so every entry point below runs serialized.

use core::fmt;

use crate::config::SleepConfig;
use crate::error::{Resource, SleepError};
use crate::hal::{ActivityTimer, IrqError, PowerReference, UartTransport, WakeGpio, WakeLine};
use crate::telemetry::{LogCursor, RearmReason, SleepEvent, SleepLog, SleepRecord};

/// Operational state of the UART link.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LinkState {
    /// Sleep protocol off. No timer armed, ext-wake deasserted.
    Disabled,
    /// Protocol on and UART powered.
    ActiveAwake,
    /// Protocol on and UART powered down.
    ActiveAsleep,
}

impl LinkState {
    /// Returns `true` when the sleep protocol is enabled.
    #[must_use]
    pub const fn is_enabled(self) -> bool {
        !matches!(self, LinkState::Disabled)
    }

    /// Returns `true` when the UART is powered down.
    #[must_use]
    pub const fn is_asleep(self) -> bool {
        matches!(self, LinkState::ActiveAsleep)
    }

    /// `Disabled -> ActiveAwake`.
    ///
    /// # Errors
    ///
    /// Returns a [`TransitionError`] when the protocol is already enabled.
    pub const fn enable(self) -> Result<Self, TransitionError> {
        match self {
            LinkState::Disabled => Ok(LinkState::ActiveAwake),
            from => Err(TransitionError::new(from, LinkState::ActiveAwake)),
        }
    }

    /// `ActiveAwake -> ActiveAsleep`.
    ///
    /// # Errors
    ///
    /// Returns a [`TransitionError`] unless the link is awake.
    pub const fn sleep(self) -> Result<Self, TransitionError> {
        match self {
            LinkState::ActiveAwake => Ok(LinkState::ActiveAsleep),
            from => Err(TransitionError::new(from, LinkState::ActiveAsleep)),
        }
    }

    /// `ActiveAsleep -> ActiveAwake`.
    ///
    /// # Errors
    ///
    /// Returns a [`TransitionError`] unless the link is asleep.
    pub const fn wake(self) -> Result<Self, TransitionError> {
        match self {
            LinkState::ActiveAsleep => Ok(LinkState::ActiveAwake),
            from => Err(TransitionError::new(from, LinkState::ActiveAwake)),
        }
    }

    /// Any enabled state `-> Disabled`.
    ///
    /// # Errors
    ///
    /// Returns a [`TransitionError`] when the protocol is already disabled.
    pub const fn disable(self) -> Result<Self, TransitionError> {
        match self {
            LinkState::Disabled => Err(TransitionError::new(self, LinkState::Disabled)),
            _ => Ok(LinkState::Disabled),
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            LinkState::Disabled => "disabled",
            LinkState::ActiveAwake => "awake",
            LinkState::ActiveAsleep => "asleep",
        };
        f.write_str(text)
    }
}

/// Transition rejected by the link state rules.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TransitionError {
    pub from: LinkState,
    pub to: LinkState,
}

impl TransitionError {
    const fn new(from: LinkState, to: LinkState) -> Self {
        Self { from, to }
    }
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid link transition {} -> {}", self.from, self.to)
    }
}

/// Lifecycle generation, advanced on every start and stop.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Epoch(u32);

impl Epoch {
    pub const INITIAL: Self = Self(0);

    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// Generation of an activity timer arm.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TimerTicket(u32);

impl TimerTicket {
    pub const INITIAL: Self = Self(0);

    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// Result of running deferred host-wake work.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HostWakeOutcome {
    /// The link was asleep and has been powered up.
    Woke,
    /// The link was already awake.
    AlreadyAwake,
    /// The work was captured in an earlier epoch and was discarded.
    Stale,
}

/// Point-in-time view of the coordinator used by status reporting.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SleepSnapshot {
    pub state: LinkState,
    pub ext_wake: bool,
    pub host_wake: bool,
    pub tx_frames: u32,
    pub timer_armed: bool,
    pub transport_attached: bool,
    pub epoch: Epoch,
}

impl SleepSnapshot {
    #[must_use]
    pub const fn protocol_enabled(&self) -> bool {
        self.state.is_enabled()
    }

    #[must_use]
    pub const fn asleep(&self) -> bool {
        self.state.is_asleep()
    }
}

/// Link state, activity counter, and the collaborators it drives.
pub struct WakeStateMachine<G, Tm, P, T> {
    gpio: G,
    timer: Tm,
    power: P,
    transport: Option<T>,
    config: SleepConfig,
    state: LinkState,
    tx_frames: u32,
    timer_armed: bool,
    ticket: TimerTicket,
    epoch: Epoch,
    log: SleepLog,
}

impl<G, Tm, P, T> WakeStateMachine<G, Tm, P, T> {
    /// Creates a disabled machine with no transport attached.
    #[must_use]
    pub const fn new(gpio: G, timer: Tm, power: P, config: SleepConfig) -> Self {
        Self {
            gpio,
            timer,
            power,
            transport: None,
            config,
            state: LinkState::Disabled,
            tx_frames: 0,
            timer_armed: false,
            ticket: TimerTicket::INITIAL,
            epoch: Epoch::INITIAL,
            log: SleepLog::new(),
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Frames sent since the last timer evaluation.
    pub fn tx_frames(&self) -> u32 {
        self.tx_frames
    }

    pub fn timer_armed(&self) -> bool {
        self.timer_armed
    }

    pub fn has_transport(&self) -> bool {
        self.transport.is_some()
    }

    pub fn gpio(&self) -> &G {
        &self.gpio
    }

    pub fn timer(&self) -> &Tm {
        &self.timer
    }

    pub fn power(&self) -> &P {
        &self.power
    }

    pub fn transport(&self) -> Option<&T> {
        self.transport.as_ref()
    }

    pub fn log(&self) -> &SleepLog {
        &self.log
    }

    /// Forwards records newer than `cursor` to `sink`.
    pub fn drain_log<F>(&self, cursor: &mut LogCursor, sink: F) -> usize
    where
        F: FnMut(&SleepRecord),
    {
        self.log.drain_into(cursor, sink)
    }

    fn record(&mut self, event: SleepEvent) {
        self.log.record(self.epoch, event);
    }
}

impl<G, Tm, P, T> WakeStateMachine<G, Tm, P, T>
where
    G: WakeGpio,
    Tm: ActivityTimer,
    P: PowerReference,
    T: UartTransport,
{
    pub fn ext_wake(&self) -> bool {
        self.gpio.read(WakeLine::ExtWake)
    }

    pub fn host_wake_level(&self) -> bool {
        self.gpio.read(WakeLine::HostWake)
    }

    /// Both wake lines idle and a transport attached.
    pub fn can_sleep(&self) -> bool {
        !self.ext_wake() && !self.host_wake_level() && self.transport.is_some()
    }

    /// Decides whether the link may sleep, must stay awake, or must wake.
    ///
    /// The branches are evaluated in order and are mutually exclusive. A
    /// non-empty transmit queue always keeps the link awake.
    pub fn evaluate_sleep(&mut self) {
        if !self.state.is_enabled() {
            return;
        }

        if self.can_sleep() {
            if self.state.is_asleep() {
                self.record(SleepEvent::RedundantSleep);
            } else if self.transport.as_mut().is_some_and(UartTransport::is_tx_empty) {
                self.enter_sleep();
            } else {
                self.hold_awake(RearmReason::TxPending);
            }
        } else if self.ext_wake() && !self.state.is_asleep() {
            self.hold_awake(RearmReason::ExtWakeHeld);
        } else {
            self.wake();
        }

        self.ensure_timer_live();
    }

    /// Powers the link back up if it is asleep. Returns `true` when it woke.
    pub fn wake(&mut self) -> bool {
        let Ok(next) = self.state.wake() else {
            return false;
        };

        self.power.acquire();
        self.arm_timer();
        self.gpio.set_ext_wake(true);
        self.state = next;
        if let Some(transport) = self.transport.as_mut() {
            transport.set_power(true);
        }
        self.record(SleepEvent::Woke);
        true
    }

    /// Marks an outbound frame and makes sure the controller is listening.
    pub fn note_tx_activity(&mut self) {
        if !self.state.is_enabled() {
            return;
        }

        self.tx_frames = self.tx_frames.saturating_add(1);
        if self.ext_wake() {
            return;
        }

        if !self.wake() {
            // Awake link whose ext-wake was dropped by the last expiry.
            self.hold_awake(RearmReason::TxResumed);
        }
    }

    /// Handles an activity timer expiry for the arm identified by `ticket`.
    pub fn on_timer_expiry(&mut self, ticket: TimerTicket) {
        if !self.state.is_enabled() || !self.timer_armed || ticket != self.ticket {
            self.record(SleepEvent::StaleTimer(ticket));
            return;
        }

        self.timer_armed = false;
        if self.tx_frames == 0 {
            self.gpio.set_ext_wake(false);
            self.record(SleepEvent::TxIdle);
            self.evaluate_sleep();
        } else {
            self.arm_timer();
            self.record(SleepEvent::TimerRearmed(RearmReason::TxActivity));
        }
        self.tx_frames = 0;

        self.ensure_timer_live();
    }

    /// Runs the deferred host-wake work captured in `epoch`.
    pub fn on_host_wake(&mut self, epoch: Epoch) -> HostWakeOutcome {
        if epoch != self.epoch || !self.state.is_enabled() {
            self.record(SleepEvent::StaleHostWake(epoch));
            return HostWakeOutcome::Stale;
        }
        if self.wake() {
            HostWakeOutcome::Woke
        } else {
            HostWakeOutcome::AlreadyAwake
        }
    }

    /// Enables the protocol. `register_irq` runs after ext-wake is asserted
    /// and before the power reference is taken.
    ///
    /// # Errors
    ///
    /// Returns [`SleepError::Busy`] when already enabled and
    /// [`SleepError::ResourceUnavailable`] when `register_irq` fails. On
    /// failure the timer is cancelled and ext-wake deasserted.
    pub fn start<F>(&mut self, register_irq: F) -> Result<Epoch, SleepError>
    where
        F: FnOnce() -> Result<(), IrqError>,
    {
        let next = self.state.enable().map_err(|_| SleepError::Busy)?;

        self.arm_timer();
        self.gpio.set_ext_wake(true);
        if let Err(err) = register_irq() {
            self.cancel_timer();
            self.gpio.set_ext_wake(false);
            self.record(SleepEvent::StartFailed(err));
            return Err(Resource::HostWakeIrq(err).into());
        }

        self.power.acquire();
        self.tx_frames = 0;
        self.epoch = self.epoch.next();
        self.state = next;
        self.record(SleepEvent::Started);
        Ok(self.epoch)
    }

    /// Disables the protocol. Returns `false` when already disabled.
    pub fn stop(&mut self) -> bool {
        let was_asleep = self.state.is_asleep();
        let Ok(next) = self.state.disable() else {
            return false;
        };

        self.gpio.set_ext_wake(false);
        self.cancel_timer();
        if was_asleep && let Some(transport) = self.transport.as_mut() {
            transport.set_power(true);
        }
        self.state = next;
        self.tx_frames = 0;
        self.epoch = self.epoch.next();
        self.power.release_after(self.config.power_release_grace());
        self.record(SleepEvent::Stopped);
        true
    }

    /// Drives ext-wake directly, bypassing the transition rules.
    pub fn force_ext_wake(&mut self, asserted: bool) {
        self.gpio.set_ext_wake(asserted);
        self.record(SleepEvent::ExtWakeForced(asserted));
    }

    /// Binds the controller transport. Only the first registration is kept.
    ///
    /// # Errors
    ///
    /// Hands `transport` back when one is already attached.
    pub fn attach_transport(&mut self, transport: T) -> Result<(), T> {
        if self.transport.is_some() {
            self.record(SleepEvent::TransportRejected);
            return Err(transport);
        }
        self.transport = Some(transport);
        self.record(SleepEvent::TransportAttached);
        Ok(())
    }

    /// Unbinds the controller transport, waking the link first if it sleeps.
    pub fn detach_transport(&mut self) -> Option<T> {
        self.transport.as_ref()?;
        self.wake();
        let transport = self.transport.take();
        self.record(SleepEvent::TransportDetached);
        transport
    }

    pub fn snapshot(&self) -> SleepSnapshot {
        SleepSnapshot {
            state: self.state,
            ext_wake: self.ext_wake(),
            host_wake: self.host_wake_level(),
            tx_frames: self.tx_frames,
            timer_armed: self.timer_armed,
            transport_attached: self.transport.is_some(),
            epoch: self.epoch,
        }
    }

    fn enter_sleep(&mut self) {
        let Ok(next) = self.state.sleep() else {
            return;
        };

        self.cancel_timer();
        if let Some(transport) = self.transport.as_mut() {
            transport.set_power(false);
        }
        self.state = next;
        self.power.release_after(self.config.power_release_grace());
        self.record(SleepEvent::EnteredSleep);
    }

    fn hold_awake(&mut self, reason: RearmReason) {
        self.arm_timer();
        self.gpio.set_ext_wake(true);
        self.record(SleepEvent::TimerRearmed(reason));
    }

    fn ensure_timer_live(&mut self) {
        if self.state == LinkState::ActiveAwake && !self.timer_armed {
            self.arm_timer();
            self.record(SleepEvent::TimerRearmed(RearmReason::Liveness));
        }
    }

    fn arm_timer(&mut self) {
        self.ticket = self.ticket.next();
        self.timer.arm(self.config.tx_interval(), self.ticket);
        self.timer_armed = true;
    }

    fn cancel_timer(&mut self) {
        self.timer.cancel();
        self.timer_armed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::NoopPowerReference;
    use core::time::Duration;

    #[derive(Default)]
    struct Lines {
        host_wake: bool,
        ext_wake: bool,
    }

    impl WakeGpio for Lines {
        fn read(&self, line: WakeLine) -> bool {
            match line {
                WakeLine::HostWake => self.host_wake,
                WakeLine::ExtWake => self.ext_wake,
            }
        }

        fn set_ext_wake(&mut self, asserted: bool) {
            self.ext_wake = asserted;
        }
    }

    #[derive(Default)]
    struct Timer {
        pending: Option<(Duration, TimerTicket)>,
    }

    impl ActivityTimer for Timer {
        fn arm(&mut self, after: Duration, ticket: TimerTicket) {
            self.pending = Some((after, ticket));
        }

        fn cancel(&mut self) {
            self.pending = None;
        }
    }

    #[derive(Default)]
    struct Uart {
        queued: usize,
        powered: bool,
    }

    impl UartTransport for Uart {
        fn is_tx_empty(&mut self) -> bool {
            self.queued == 0
        }

        fn set_power(&mut self, on: bool) {
            self.powered = on;
        }
    }

    type Machine = WakeStateMachine<Lines, Timer, NoopPowerReference, Uart>;

    fn started() -> Machine {
        let mut machine = Machine::new(
            Lines::default(),
            Timer::default(),
            NoopPowerReference,
            SleepConfig::default(),
        );
        machine
            .attach_transport(Uart {
                queued: 0,
                powered: true,
            })
            .unwrap_or_else(|_| panic!("transport already attached"));
        machine.start(|| Ok(())).expect("start");
        machine
    }

    fn fire(machine: &mut Machine) {
        let (_, ticket) = machine.timer().pending.expect("timer armed");
        machine.on_timer_expiry(ticket);
    }

    #[test]
    fn transitions_follow_link_rules() {
        assert_eq!(LinkState::Disabled.enable(), Ok(LinkState::ActiveAwake));
        assert_eq!(LinkState::ActiveAwake.sleep(), Ok(LinkState::ActiveAsleep));
        assert_eq!(LinkState::ActiveAsleep.wake(), Ok(LinkState::ActiveAwake));
        assert_eq!(LinkState::ActiveAsleep.disable(), Ok(LinkState::Disabled));
        assert_eq!(
            LinkState::Disabled.sleep(),
            Err(TransitionError {
                from: LinkState::Disabled,
                to: LinkState::ActiveAsleep,
            })
        );
        assert!(LinkState::ActiveAwake.enable().is_err());
        assert!(LinkState::Disabled.disable().is_err());
        assert!(LinkState::ActiveAwake.wake().is_err());
    }

    #[test]
    fn start_asserts_ext_wake_and_arms_timer() {
        let machine = started();

        assert_eq!(machine.state(), LinkState::ActiveAwake);
        assert!(machine.ext_wake());
        assert_eq!(
            machine.timer().pending.map(|(after, _)| after),
            Some(Duration::from_secs(6))
        );
        assert_eq!(machine.epoch(), Epoch::from_raw(1));
    }

    #[test]
    fn idle_expiry_puts_link_to_sleep() {
        let mut machine = started();
        fire(&mut machine);

        assert_eq!(machine.state(), LinkState::ActiveAsleep);
        assert!(!machine.ext_wake());
        assert!(!machine.timer_armed());
        assert_eq!(machine.transport().map(|t| t.powered), Some(false));
        assert!(machine.log().contains(SleepEvent::EnteredSleep));
    }

    #[test]
    fn busy_interval_rearms_and_clears_counter() {
        let mut machine = started();
        machine.note_tx_activity();
        machine.note_tx_activity();
        assert_eq!(machine.tx_frames(), 2);

        fire(&mut machine);

        assert_eq!(machine.state(), LinkState::ActiveAwake);
        assert_eq!(machine.tx_frames(), 0);
        assert!(machine.timer_armed());
        assert!(machine.ext_wake());
    }

    #[test]
    fn stale_ticket_is_ignored() {
        let mut machine = started();
        let (_, stale) = machine.timer().pending.expect("armed");
        machine.note_tx_activity();
        fire(&mut machine);

        machine.on_timer_expiry(stale);

        assert_eq!(machine.state(), LinkState::ActiveAwake);
        assert!(machine.log().contains(SleepEvent::StaleTimer(stale)));
    }

    #[test]
    fn outgoing_data_after_idle_expiry_reasserts_ext_wake() {
        let mut machine = started();
        machine.gpio.host_wake = true;
        fire(&mut machine);
        assert_eq!(machine.state(), LinkState::ActiveAwake);
        assert!(!machine.ext_wake());

        machine.note_tx_activity();

        assert!(machine.ext_wake());
        assert!(machine.timer_armed());
        assert!(
            machine
                .log()
                .contains(SleepEvent::TimerRearmed(RearmReason::TxResumed))
        );
    }

    #[test]
    fn failed_irq_registration_unwinds() {
        let mut machine = Machine::new(
            Lines::default(),
            Timer::default(),
            NoopPowerReference,
            SleepConfig::default(),
        );

        let result = machine.start(|| Err(IrqError::InUse));

        assert_eq!(
            result,
            Err(SleepError::ResourceUnavailable(Resource::HostWakeIrq(
                IrqError::InUse
            )))
        );
        assert_eq!(machine.state(), LinkState::Disabled);
        assert!(!machine.ext_wake());
        assert!(machine.timer().pending.is_none());
        assert_eq!(machine.epoch(), Epoch::INITIAL);
    }

    #[test]
    fn second_transport_is_handed_back() {
        let mut machine = started();
        let rejected = machine.attach_transport(Uart::default());
        assert!(rejected.is_err());
        assert!(machine.log().contains(SleepEvent::TransportRejected));
    }
}
