#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bluesleep_core::config::SleepConfig;
use bluesleep_core::context::WakeContext;
use bluesleep_core::hal::{
    ActivityTimer, HostWakeIrq, IrqError, PowerReference, UartTransport, WakeGpio, WakeLine,
};
use bluesleep_core::machine::TimerTicket;

/// Observable collaborator call, in the order the core issued it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Call {
    ExtWake(bool),
    TimerArm(TimerTicket),
    TimerCancel,
    PowerAcquire,
    PowerRelease(Duration),
    UartPower(bool),
    IrqRegister,
    IrqUnregister,
}

#[derive(Debug, Default)]
pub struct BoardState {
    pub host_wake: bool,
    pub ext_wake: bool,
    pub pending_timer: Option<(Duration, TimerTicket)>,
    pub power_held: bool,
    pub pending_release: Option<Duration>,
    pub uart_queued: usize,
    pub uart_powered: bool,
    pub irq_registered: bool,
    pub irq_failure: Option<IrqError>,
    pub calls: Vec<Call>,
}

/// Simulated board shared by all mock collaborators.
#[derive(Clone, Debug, Default)]
pub struct Board(Arc<Mutex<BoardState>>);

impl Board {
    pub fn new() -> Self {
        let board = Self::default();
        board.state().uart_powered = true;
        board
    }

    pub fn state(&self) -> MutexGuard<'_, BoardState> {
        self.0.lock().expect("board poisoned")
    }

    pub fn gpio(&self) -> MockGpio {
        MockGpio(self.clone())
    }

    pub fn timer(&self) -> MockTimer {
        MockTimer(self.clone())
    }

    pub fn power(&self) -> MockPower {
        MockPower(self.clone())
    }

    pub fn uart(&self) -> MockUart {
        MockUart(self.clone())
    }

    pub fn irq(&self) -> MockIrq {
        MockIrq(self.clone())
    }

    pub fn ext_wake(&self) -> bool {
        self.state().ext_wake
    }

    pub fn set_host_wake(&self, level: bool) {
        self.state().host_wake = level;
    }

    pub fn set_queued(&self, bytes: usize) {
        self.state().uart_queued = bytes;
    }

    pub fn uart_powered(&self) -> bool {
        self.state().uart_powered
    }

    pub fn pending_ticket(&self) -> Option<TimerTicket> {
        self.state().pending_timer.map(|(_, ticket)| ticket)
    }

    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut self.state().calls)
    }

    fn log(&self, call: Call) {
        self.state().calls.push(call);
    }
}

pub struct MockGpio(Board);

impl WakeGpio for MockGpio {
    fn read(&self, line: WakeLine) -> bool {
        let state = self.0.state();
        match line {
            WakeLine::HostWake => state.host_wake,
            WakeLine::ExtWake => state.ext_wake,
        }
    }

    fn set_ext_wake(&mut self, asserted: bool) {
        self.0.state().ext_wake = asserted;
        self.0.log(Call::ExtWake(asserted));
    }
}

pub struct MockTimer(Board);

impl ActivityTimer for MockTimer {
    fn arm(&mut self, after: Duration, ticket: TimerTicket) {
        self.0.state().pending_timer = Some((after, ticket));
        self.0.log(Call::TimerArm(ticket));
    }

    fn cancel(&mut self) {
        self.0.state().pending_timer = None;
        self.0.log(Call::TimerCancel);
    }
}

pub struct MockPower(Board);

impl PowerReference for MockPower {
    fn acquire(&mut self) {
        let mut state = self.0.state();
        state.power_held = true;
        state.pending_release = None;
        drop(state);
        self.0.log(Call::PowerAcquire);
    }

    fn release_after(&mut self, grace: Duration) {
        self.0.state().pending_release = Some(grace);
        self.0.log(Call::PowerRelease(grace));
    }
}

#[derive(Debug)]
pub struct MockUart(Board);

impl PartialEq for MockUart {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&(self.0).0, &(other.0).0)
    }
}

impl UartTransport for MockUart {
    fn is_tx_empty(&mut self) -> bool {
        self.0.state().uart_queued == 0
    }

    fn set_power(&mut self, on: bool) {
        self.0.state().uart_powered = on;
        self.0.log(Call::UartPower(on));
    }
}

pub struct MockIrq(Board);

impl HostWakeIrq for MockIrq {
    fn register(&mut self) -> Result<(), IrqError> {
        let mut state = self.0.state();
        if let Some(err) = state.irq_failure {
            return Err(err);
        }
        state.irq_registered = true;
        drop(state);
        self.0.log(Call::IrqRegister);
        Ok(())
    }

    fn unregister(&mut self) {
        self.0.state().irq_registered = false;
        self.0.log(Call::IrqUnregister);
    }
}

pub type TestContext = WakeContext<MockGpio, MockTimer, MockPower, MockUart, MockIrq>;

/// Context wired to `board` with a transport attached and default timing.
pub fn attached_context(board: &Board) -> TestContext {
    let ctx = TestContext::new(
        board.gpio(),
        board.timer(),
        board.power(),
        board.irq(),
        SleepConfig::default(),
    );
    assert!(ctx.attach_transport(board.uart()).is_ok());
    ctx
}

/// Delivers the expiry for the currently armed timer.
pub fn fire_timer(board: &Board, ctx: &TestContext) {
    let ticket = board.pending_ticket().expect("timer not armed");
    board.state().pending_timer = None;
    ctx.on_timer_expiry(ticket);
}
