use bluesleep_core::hci::{ControllerEvent, RegistrationOutcome};
use embassy_futures::join::{join, join3};
use embassy_futures::select::{Either3, select3};
use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_sync::channel::{Receiver, Sender};
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_usb::class::cdc_acm::{ControlChanged, Receiver as CdcReceiver, Sender as CdcSender};
use embassy_usb::driver::{Driver, EndpointError};
use heapless::Vec;

use super::{BRIDGE_QUEUE, CONSOLE_OPENED, CONTEXT, IDLE, REPL_RX_QUEUE, REPL_TX_QUEUE, UART_GATE, USB_STORAGE};
use crate::bridge::{PortPresence, PresenceChange};
use crate::hw::BridgeUart;
use crate::usb::{self, UsbDeviceStrings};

embassy_stm32::bind_interrupts!(struct UsbIrqs {
    USB_UCPD1_2 => embassy_stm32::usb::InterruptHandler<hal::peripherals::USB>;
});

#[embassy_executor::task]
pub async fn run(
    usb: Peri<'static, hal::peripherals::USB>,
    dp: Peri<'static, hal::peripherals::PA12>,
    dm: Peri<'static, hal::peripherals::PA11>,
) -> ! {
    let storage = USB_STORAGE.init(usb::UsbDeviceStorage::new(&IDLE));
    let driver = embassy_stm32::usb::Driver::new(usb, UsbIrqs, dp, dm);

    let mut composite = usb::UsbComposite::new(driver, storage, UsbDeviceStrings::default());

    let Some(console) = composite.take_console() else {
        defmt::panic!("console CDC interface unavailable");
    };
    let Some(hci) = composite.take_hci() else {
        defmt::panic!("HCI CDC interface unavailable");
    };

    let mut device = composite.device;

    let console_future = run_port(
        "console",
        console.sender,
        console.receiver,
        console.control,
        REPL_RX_QUEUE.sender(),
        REPL_TX_QUEUE.receiver(),
        on_console_presence,
    );
    let hci_future = run_port(
        "hci",
        hci.sender,
        hci.receiver,
        hci.control,
        BRIDGE_QUEUE.to_controller_sender(),
        BRIDGE_QUEUE.to_host_receiver(),
        on_hci_presence,
    );

    join3(device.run(), console_future, hci_future).await;
    loop {
        core::future::pending::<()>().await;
    }
}

fn on_console_presence(change: PresenceChange) {
    if change == PresenceChange::Opened {
        CONSOLE_OPENED.signal(());
    }
}

/// Maps the HCI port's DTR edges onto controller registration.
fn on_hci_presence(change: PresenceChange) {
    let event = match change {
        PresenceChange::Opened => ControllerEvent::Registered(BridgeUart::new(&UART_GATE)),
        PresenceChange::Closed => ControllerEvent::Unregistered,
    };
    match CONTEXT.notify_controller(event) {
        RegistrationOutcome::Attached => defmt::info!("usb: HCI controller registered"),
        RegistrationOutcome::Detached(_) => defmt::info!("usb: HCI controller unregistered"),
        RegistrationOutcome::Rejected(_) => defmt::warn!("usb: HCI registration rejected"),
        RegistrationOutcome::NotAttached => {}
    }
}

async fn run_port<D, const FRAME: usize, const DEPTH: usize>(
    label: &'static str,
    mut sender: CdcSender<'static, D>,
    mut receiver: CdcReceiver<'static, D>,
    control: ControlChanged<'static>,
    ingress_queue: Sender<'static, ThreadModeRawMutex, Vec<u8, FRAME>, DEPTH>,
    egress_queue: Receiver<'static, ThreadModeRawMutex, Vec<u8, FRAME>, DEPTH>,
    mut on_presence: impl FnMut(PresenceChange),
) -> !
where
    D: Driver<'static>,
{
    let mut ingress = [0u8; usb::MAX_PACKET_SIZE as usize];
    let mut presence = PortPresence::new();
    let mut pending_tx: Option<Vec<u8, FRAME>> = None;

    loop {
        join(receiver.wait_connection(), sender.wait_connection()).await;
        wait_for_dtr(&control, &sender).await;
        pending_tx.take();
        if let Some(change) = presence.update(true) {
            on_presence(change);
        }

        defmt::info!("usb: {} interface connected", label);

        loop {
            match select3(
                receiver.read_packet(&mut ingress),
                async {
                    let frame = match pending_tx.take() {
                        Some(frame) => frame,
                        None => egress_queue.receive().await,
                    };
                    let result = sender.write_packet(&frame).await;
                    if result.is_err() {
                        pending_tx = Some(frame);
                    }
                    result
                },
                control.control_changed(),
            )
            .await
            {
                Either3::First(Ok(0)) | Either3::Second(Ok(())) => {}
                Either3::First(Ok(count)) => match Vec::from_slice(&ingress[..count]) {
                    Ok(frame) => ingress_queue.send(frame).await,
                    Err(_) => defmt::warn!("usb: dropping {} frame len={} (overflow)", label, count),
                },
                Either3::First(Err(EndpointError::Disabled))
                | Either3::Second(Err(EndpointError::Disabled)) => {
                    defmt::warn!("usb: {} interface disabled", label);
                    break;
                }
                Either3::First(Err(_)) => defmt::warn!("usb: {} read error", label),
                Either3::Second(Err(_)) => defmt::warn!("usb: {} write error", label),
                Either3::Third(()) => {
                    if !sender.dtr() {
                        defmt::warn!("usb: {} host dropped DTR", label);
                        break;
                    }
                }
            }
        }

        if let Some(change) = presence.update(false) {
            on_presence(change);
        }
    }
}

async fn wait_for_dtr<D>(control: &ControlChanged<'static>, sender: &CdcSender<'static, D>)
where
    D: Driver<'static>,
{
    while !sender.dtr() {
        control.control_changed().await;
    }
}
