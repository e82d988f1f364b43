use embassy_futures::join::join;
use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_stm32::usart::{BufferedUart, Config as UartConfig, DataBits, Parity, StopBits};
use embassy_time::{Duration, Timer};
use embedded_io_async::{Read, Write};
use static_cell::StaticCell;

use super::{BRIDGE_QUEUE, CONTEXT, UART_GATE};
use crate::bridge::{BRIDGE_FRAME_SIZE, BRIDGE_QUEUE_DEPTH, frame_from};

const HCI_UART_BUFFER_SIZE: usize = BRIDGE_FRAME_SIZE * BRIDGE_QUEUE_DEPTH;
const HCI_UART_BAUD: u32 = 115_200;
const UART_RETRY_DELAY: Duration = Duration::from_millis(5);

static UART_TX_BUFFER: StaticCell<[u8; HCI_UART_BUFFER_SIZE]> = StaticCell::new();
static UART_RX_BUFFER: StaticCell<[u8; HCI_UART_BUFFER_SIZE]> = StaticCell::new();

embassy_stm32::bind_interrupts!(struct UartIrqs {
    USART3_4_5_6_LPUART1 => embassy_stm32::usart::BufferedInterruptHandler<hal::peripherals::USART5>;
});

/// Moves HCI frames between the USB bridge queues and the controller UART,
/// reporting outgoing traffic to the sleep coordinator.
#[embassy_executor::task]
pub async fn run(
    usart: Peri<'static, hal::peripherals::USART5>,
    tx_pin: Peri<'static, hal::peripherals::PB0>,
    rx_pin: Peri<'static, hal::peripherals::PB1>,
) -> ! {
    let mut config = UartConfig::default();
    config.baudrate = HCI_UART_BAUD;
    config.data_bits = DataBits::DataBits8;
    config.stop_bits = StopBits::STOP1;
    config.parity = Parity::ParityNone;

    let uart = match BufferedUart::new(
        usart,
        rx_pin,
        tx_pin,
        UART_TX_BUFFER.init([0; HCI_UART_BUFFER_SIZE]),
        UART_RX_BUFFER.init([0; HCI_UART_BUFFER_SIZE]),
        UartIrqs,
        config,
    ) {
        Ok(uart) => uart,
        Err(_) => defmt::panic!("bridge: HCI UART configuration rejected"),
    };

    let (mut uart_tx, mut uart_rx) = uart.split();

    let to_controller = BRIDGE_QUEUE.to_controller_receiver();
    let to_host = BRIDGE_QUEUE.to_host_sender();

    let host_to_controller = async move {
        loop {
            let frame = to_controller.receive().await;
            if frame.is_empty() {
                continue;
            }

            UART_GATE.note_queued(frame.len());
            CONTEXT.on_outgoing_data();
            UART_GATE.wait_powered().await;

            let data = frame.as_slice();
            let mut written = 0usize;
            while written < data.len() {
                match uart_tx.write(&data[written..]).await {
                    Ok(count) => written += count,
                    Err(_) => {
                        defmt::warn!("bridge: UART write error");
                        Timer::after(UART_RETRY_DELAY).await;
                        break;
                    }
                }
            }

            if written == data.len() && uart_tx.flush().await.is_err() {
                defmt::warn!("bridge: UART flush error");
                Timer::after(UART_RETRY_DELAY).await;
            }
            UART_GATE.note_drained(frame.len());
        }
    };

    let controller_to_host = async move {
        let mut ingress = [0u8; BRIDGE_FRAME_SIZE];
        loop {
            match uart_rx.read(&mut ingress).await {
                Ok(0) => {}
                Ok(count) => match frame_from(&ingress[..count]) {
                    Some(frame) => to_host.send(frame).await,
                    None => defmt::warn!("bridge: dropping controller frame len={}", count),
                },
                Err(_) => {
                    defmt::warn!("bridge: UART read error");
                    Timer::after(UART_RETRY_DELAY).await;
                }
            }
        }
    };

    join(host_to_controller, controller_to_host).await;
    loop {
        core::future::pending::<()>().await;
    }
}
