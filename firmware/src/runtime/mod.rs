use bluesleep_core::config::SleepConfig;
use bluesleep_core::context::{SleepMutex, WakeContext};
use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Level, Output, Pull, Speed};
use embassy_sync::signal::Signal;
use static_cell::StaticCell;

use crate::bridge::BridgeQueue;
use crate::hw::{
    self, BoardGpio, BridgeUart, EdgeGate, ExtiHostWake, IdlePolicy, LineMirror, PowerHandle,
    PowerLatch, SignalTimer, TimerCommands, UartGate,
};
use crate::repl::ReplChannel;
use crate::usb;

mod bridge_task;
mod hostwake_task;
mod power_task;
mod repl_task;
mod sleep_task;
mod timer_task;
mod usb_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

/// PA0 carries host-wake from the controller.
const HOST_WAKE_PIN: usize = 0;

/// Live host-wake level, read straight from the GPIOA input register.
fn sample_host_wake() -> bool {
    hal::pac::GPIOA.idr().read().idr(HOST_WAKE_PIN) == hal::pac::gpio::vals::Idr::HIGH
}

/// Coordinator bound to this board's collaborators.
pub(super) type BoardContext =
    WakeContext<BoardGpio, SignalTimer, PowerHandle, BridgeUart, ExtiHostWake>;

pub(super) static LINES: LineMirror = LineMirror::new();
pub(super) static TIMER_COMMANDS: TimerCommands = Signal::new();
pub(super) static POWER: PowerLatch = PowerLatch::new();
pub(super) static IDLE: IdlePolicy = IdlePolicy::new(&POWER);
pub(super) static UART_GATE: UartGate = UartGate::new();
pub(super) static HOST_WAKE_GATE: EdgeGate = EdgeGate::new();

pub(super) static CONTEXT: BoardContext = WakeContext::new(
    BoardGpio::new(&LINES, sample_host_wake),
    SignalTimer::new(&TIMER_COMMANDS),
    PowerHandle::new(&IDLE),
    ExtiHostWake::new(&HOST_WAKE_GATE),
    SleepConfig::DEFAULT,
);

pub(super) static BRIDGE_QUEUE: BridgeQueue = BridgeQueue::new();
pub(super) static REPL_RX_QUEUE: ReplChannel = ReplChannel::new();
pub(super) static REPL_TX_QUEUE: ReplChannel = ReplChannel::new();
pub(super) static CONSOLE_OPENED: Signal<SleepMutex, ()> = Signal::new();
pub(super) static USB_STORAGE: StaticCell<usb::UsbDeviceStorage> = StaticCell::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0,
        PA1,
        EXTI0,
        PB0,
        PB1,
        USB,
        PA11,
        PA12,
        USART5,
        ..
    } = hal::init(config);

    hw::install_ext_wake(Output::new(PA1, Level::Low, Speed::Low));
    let host_wake = ExtiInput::new(PA0, EXTI0, Pull::Down);

    spawner
        .spawn(hostwake_task::run(host_wake))
        .expect("failed to spawn host-wake task");
    spawner
        .spawn(sleep_task::run())
        .expect("failed to spawn sleep worker task");
    spawner
        .spawn(timer_task::run())
        .expect("failed to spawn activity timer task");
    spawner
        .spawn(power_task::run())
        .expect("failed to spawn power task");
    spawner
        .spawn(usb_task::run(USB, PA12, PA11))
        .expect("failed to spawn USB task");
    spawner
        .spawn(repl_task::run())
        .expect("failed to spawn REPL task");
    spawner
        .spawn(bridge_task::run(USART5, PB0, PB1))
        .expect("failed to spawn bridge task");

    core::future::pending::<()>().await;
}
