//! Dual-CDC USB composite device.
//!
//! CDC0 carries the diagnostic console and CDC1 carries HCI traffic for the
//! Bluetooth controller on the UART. The wrapper hands out per-port handles so
//! the USB task does not deal with builder bookkeeping.

use embassy_usb::class::cdc_acm::{CdcAcmClass, ControlChanged, Receiver, Sender, State};
use embassy_usb::driver::Driver;
use embassy_usb::{Builder, Config, Handler, UsbDevice};

use crate::hw::IdlePolicy;

/// Logical identifier for each USB CDC interface.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UsbPortKind {
    /// Diagnostic console (CDC0).
    Console,
    /// HCI transport bridged to the controller UART (CDC1).
    Hci,
}

pub const MAX_PACKET_SIZE: u16 = 64;

const CONTROL_BUFFER_LEN: usize = 64;
const CONFIG_DESCRIPTOR_LEN: usize = 256;
const BOS_DESCRIPTOR_LEN: usize = 256;
const MSOS_DESCRIPTOR_LEN: usize = 256;

/// User-visible strings advertised in the USB descriptors.
#[derive(Clone, Copy, Debug)]
pub struct UsbDeviceStrings {
    pub manufacturer: &'static str,
    pub product: &'static str,
    pub serial_number: Option<&'static str>,
}

impl Default for UsbDeviceStrings {
    fn default() -> Self {
        Self {
            manufacturer: "Bluesleep",
            product: "Bluetooth UART Sleep Controller",
            serial_number: None,
        }
    }
}

/// Forwards bus suspend and resume to the idle policy.
pub struct BusSuspendHandler {
    idle: &'static IdlePolicy,
}

impl Handler for BusSuspendHandler {
    fn suspended(&mut self, suspended: bool) {
        self.idle.set_bus_suspended(suspended);
    }
}

/// Backing storage for the Embassy USB builder and CDC ACM classes.
pub struct UsbDeviceStorage {
    control_buf: [u8; CONTROL_BUFFER_LEN],
    config_descriptor: [u8; CONFIG_DESCRIPTOR_LEN],
    bos_descriptor: [u8; BOS_DESCRIPTOR_LEN],
    msos_descriptor: [u8; MSOS_DESCRIPTOR_LEN],
    console_state: State<'static>,
    hci_state: State<'static>,
    bus: BusSuspendHandler,
}

impl UsbDeviceStorage {
    pub fn new(idle: &'static IdlePolicy) -> Self {
        Self {
            control_buf: [0; CONTROL_BUFFER_LEN],
            config_descriptor: [0; CONFIG_DESCRIPTOR_LEN],
            bos_descriptor: [0; BOS_DESCRIPTOR_LEN],
            msos_descriptor: [0; MSOS_DESCRIPTOR_LEN],
            console_state: State::new(),
            hci_state: State::new(),
            bus: BusSuspendHandler { idle },
        }
    }
}

/// Split handles for a CDC ACM interface.
pub struct CdcAcmHandle<D: Driver<'static>> {
    pub kind: UsbPortKind,
    pub sender: Sender<'static, D>,
    pub receiver: Receiver<'static, D>,
    pub control: ControlChanged<'static>,
}

/// Owns the two CDC ACM interfaces and the resulting USB device.
pub struct UsbComposite<D>
where
    D: Driver<'static>,
{
    pub device: UsbDevice<'static, D>,
    console: Option<CdcAcmHandle<D>>,
    hci: Option<CdcAcmHandle<D>>,
}

impl<D> UsbComposite<D>
where
    D: Driver<'static>,
{
    pub fn new(driver: D, storage: &'static mut UsbDeviceStorage, strings: UsbDeviceStrings) -> Self {
        let mut config = Config::new(0x1209, 0x0002);
        config.manufacturer = Some(strings.manufacturer);
        config.product = Some(strings.product);
        config.serial_number = strings.serial_number;
        config.max_packet_size_0 = 64;
        config.max_power = 100;
        config.device_class = 0xEF;
        config.device_sub_class = 0x02;
        config.device_protocol = 0x01;
        config.composite_with_iads = true;

        let mut builder = Builder::new(
            driver,
            config,
            &mut storage.config_descriptor,
            &mut storage.bos_descriptor,
            &mut storage.msos_descriptor,
            &mut storage.control_buf,
        );

        builder.handler(&mut storage.bus);

        let console = CdcAcmClass::new(&mut builder, &mut storage.console_state, MAX_PACKET_SIZE);
        let hci = CdcAcmClass::new(&mut builder, &mut storage.hci_state, MAX_PACKET_SIZE);

        let (console_tx, console_rx, console_ctrl) = console.split_with_control();
        let (hci_tx, hci_rx, hci_ctrl) = hci.split_with_control();

        Self {
            device: builder.build(),
            console: Some(CdcAcmHandle {
                kind: UsbPortKind::Console,
                sender: console_tx,
                receiver: console_rx,
                control: console_ctrl,
            }),
            hci: Some(CdcAcmHandle {
                kind: UsbPortKind::Hci,
                sender: hci_tx,
                receiver: hci_rx,
                control: hci_ctrl,
            }),
        }
    }

    pub fn take_console(&mut self) -> Option<CdcAcmHandle<D>> {
        self.take_port(UsbPortKind::Console)
    }

    pub fn take_hci(&mut self) -> Option<CdcAcmHandle<D>> {
        self.take_port(UsbPortKind::Hci)
    }

    /// Takes ownership of the requested CDC interface handles.
    pub fn take_port(&mut self, kind: UsbPortKind) -> Option<CdcAcmHandle<D>> {
        match kind {
            UsbPortKind::Console => self.console.take(),
            UsbPortKind::Hci => self.hci.take(),
        }
    }
}
