//! Simulated board with a virtual clock.
//!
//! Every collaborator handle shares one [`BoardState`]. Time only moves when
//! the session advances it, which keeps transcripts reproducible.

use std::cell::{RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use bluesleep_core::config::SleepConfig;
use bluesleep_core::context::WakeContext;
use bluesleep_core::error::{Resource, SleepError};
use bluesleep_core::hal::{
    ActivityTimer, HostWakeIrq, IrqError, PowerReference, UartTransport, WakeGpio, WakeLine,
};
use bluesleep_core::machine::TimerTicket;

/// Highest GPIO number on the simulated bank.
pub const MAX_GPIO: u32 = 63;

/// GPIO assignment for the two wake lines.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PinMap {
    pub host_wake: u32,
    pub ext_wake: u32,
}

impl PinMap {
    pub const DEFAULT: Self = Self {
        host_wake: 20,
        ext_wake: 21,
    };

    /// Claims both pins, in host-wake then ext-wake order.
    ///
    /// # Errors
    ///
    /// Reports the line whose pin is missing or already claimed.
    pub fn claim(host_wake: u32, ext_wake: u32) -> Result<Self, SleepError> {
        if host_wake > MAX_GPIO {
            return Err(Resource::Line(WakeLine::HostWake).into());
        }
        if ext_wake > MAX_GPIO || ext_wake == host_wake {
            return Err(Resource::Line(WakeLine::ExtWake).into());
        }
        Ok(Self {
            host_wake,
            ext_wake,
        })
    }
}

impl Default for PinMap {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug)]
pub struct BoardState {
    pub now: Duration,
    pub pins: PinMap,
    pub host_wake: bool,
    pub ext_wake: bool,
    /// Deadline and ticket of the armed activity timer.
    pub timer: Option<(Duration, TimerTicket)>,
    pub power_held: bool,
    pub release_at: Option<Duration>,
    pub uart_queued: usize,
    pub uart_powered: bool,
    pub irq_registered: bool,
    /// Error returned by the next interrupt registration, if any.
    pub irq_fault: Option<IrqError>,
}

impl BoardState {
    fn new(pins: PinMap) -> Self {
        Self {
            now: Duration::ZERO,
            pins,
            host_wake: false,
            ext_wake: false,
            timer: None,
            power_held: false,
            release_at: None,
            uart_queued: 0,
            uart_powered: true,
            irq_registered: false,
            irq_fault: None,
        }
    }
}

/// Next scheduled board-side event.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Deadline {
    Timer(Duration, TimerTicket),
    PowerRelease(Duration),
}

impl Deadline {
    pub const fn at(self) -> Duration {
        match self {
            Deadline::Timer(at, _) | Deadline::PowerRelease(at) => at,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SimBoard {
    state: Rc<RefCell<BoardState>>,
}

impl SimBoard {
    pub fn new(pins: PinMap) -> Self {
        Self {
            state: Rc::new(RefCell::new(BoardState::new(pins))),
        }
    }

    pub fn state(&self) -> RefMut<'_, BoardState> {
        self.state.borrow_mut()
    }

    pub fn now(&self) -> Duration {
        self.state.borrow().now
    }

    pub fn gpio(&self) -> SimGpio {
        SimGpio(self.clone())
    }

    pub fn timer(&self) -> SimTimer {
        SimTimer(self.clone())
    }

    pub fn power(&self) -> SimPower {
        SimPower(self.clone())
    }

    pub fn uart(&self) -> SimUart {
        SimUart(self.clone())
    }

    pub fn irq(&self) -> SimIrq {
        SimIrq(self.clone())
    }

    /// Earliest pending deadline at or before `limit`.
    pub fn next_deadline(&self, limit: Duration) -> Option<Deadline> {
        let state = self.state.borrow();
        let timer = state
            .timer
            .map(|(at, ticket)| Deadline::Timer(at, ticket));
        let release = state.release_at.map(Deadline::PowerRelease);
        [timer, release]
            .into_iter()
            .flatten()
            .filter(|deadline| deadline.at() <= limit)
            .min_by_key(|deadline| deadline.at())
    }

    /// Moves the clock forward to `at` and clears the deadline that fired.
    pub fn fire(&self, deadline: Deadline) {
        let mut state = self.state.borrow_mut();
        state.now = state.now.max(deadline.at());
        match deadline {
            Deadline::Timer(..) => state.timer = None,
            Deadline::PowerRelease(_) => {
                state.release_at = None;
                state.power_held = false;
            }
        }
    }

    pub fn set_now(&self, now: Duration) {
        let mut state = self.state.borrow_mut();
        state.now = state.now.max(now);
    }

    /// Transmits everything queued while the UART is powered.
    pub fn drain_uart(&self) -> usize {
        let mut state = self.state.borrow_mut();
        if state.uart_powered {
            std::mem::take(&mut state.uart_queued)
        } else {
            0
        }
    }

    /// Drives the host-wake input, returning `true` on a level change.
    pub fn set_host_wake(&self, level: bool) -> bool {
        let mut state = self.state.borrow_mut();
        let changed = state.host_wake != level;
        state.host_wake = level;
        changed
    }
}

impl fmt::Display for SimBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        write!(
            f,
            "board t={}ms host_wake(gpio{})={} ext_wake(gpio{})={} uart={} queued={} power={}",
            state.now.as_millis(),
            state.pins.host_wake,
            u8::from(state.host_wake),
            state.pins.ext_wake,
            u8::from(state.ext_wake),
            if state.uart_powered { "on" } else { "off" },
            state.uart_queued,
            if state.power_held { "held" } else { "released" },
        )
    }
}

pub struct SimGpio(SimBoard);

impl WakeGpio for SimGpio {
    fn read(&self, line: WakeLine) -> bool {
        let state = self.0.state.borrow();
        match line {
            WakeLine::HostWake => state.host_wake,
            WakeLine::ExtWake => state.ext_wake,
        }
    }

    fn set_ext_wake(&mut self, asserted: bool) {
        self.0.state().ext_wake = asserted;
    }
}

pub struct SimTimer(SimBoard);

impl ActivityTimer for SimTimer {
    fn arm(&mut self, after: Duration, ticket: TimerTicket) {
        let mut state = self.0.state();
        let deadline = state.now.saturating_add(after);
        state.timer = Some((deadline, ticket));
    }

    fn cancel(&mut self) {
        self.0.state().timer = None;
    }
}

pub struct SimPower(SimBoard);

impl PowerReference for SimPower {
    fn acquire(&mut self) {
        let mut state = self.0.state();
        state.power_held = true;
        state.release_at = None;
    }

    fn release_after(&mut self, grace: Duration) {
        let mut state = self.0.state();
        state.release_at = Some(state.now.saturating_add(grace));
    }
}

pub struct SimUart(SimBoard);

impl UartTransport for SimUart {
    fn is_tx_empty(&mut self) -> bool {
        self.0.state().uart_queued == 0
    }

    fn set_power(&mut self, on: bool) {
        self.0.state().uart_powered = on;
    }
}

pub struct SimIrq(SimBoard);

impl HostWakeIrq for SimIrq {
    fn register(&mut self) -> Result<(), IrqError> {
        let mut state = self.0.state();
        if let Some(err) = state.irq_fault {
            return Err(err);
        }
        state.irq_registered = true;
        Ok(())
    }

    fn unregister(&mut self) {
        self.0.state().irq_registered = false;
    }
}

pub type SimContext = WakeContext<SimGpio, SimTimer, SimPower, SimUart, SimIrq>;

/// Builds a stopped coordinator wired to `board`.
pub fn context(board: &SimBoard, config: SleepConfig) -> SimContext {
    SimContext::new(board.gpio(), board.timer(), board.power(), board.irq(), config)
}
