//! USB↔UART HCI bridge plumbing.
//!
//! CDC1 carries HCI traffic between the USB host stack and the Bluetooth
//! controller on USART5. The bounded channels here decouple the USB task from
//! the UART task, and [`PortPresence`] turns the CDC1 DTR line into controller
//! registration events for the sleep coordinator.

use embassy_sync::channel::{Channel, Receiver, Sender};
use heapless::Vec;

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;

#[cfg(target_os = "none")]
type BridgeMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type BridgeMutex = NoopRawMutex;

/// Maximum payload size (bytes) for bridge frames forwarded between USB and UART.
pub const BRIDGE_FRAME_SIZE: usize = 64;

/// Depth for each bounded bridge channel.
pub const BRIDGE_QUEUE_DEPTH: usize = 4;

/// Frame exchanged between bridge tasks.
pub type BridgeFrame = Vec<u8, BRIDGE_FRAME_SIZE>;

pub type BridgeChannel = Channel<BridgeMutex, BridgeFrame, BRIDGE_QUEUE_DEPTH>;
pub type BridgeSender<'a> = Sender<'a, BridgeMutex, BridgeFrame, BRIDGE_QUEUE_DEPTH>;
pub type BridgeReceiver<'a> = Receiver<'a, BridgeMutex, BridgeFrame, BRIDGE_QUEUE_DEPTH>;

/// Bundles the bounded host→controller and controller→host channels.
pub struct BridgeQueue {
    to_controller: BridgeChannel,
    to_host: BridgeChannel,
}

impl BridgeQueue {
    pub const fn new() -> Self {
        Self {
            to_controller: Channel::new(),
            to_host: Channel::new(),
        }
    }

    /// Sender for HCI frames headed to the controller UART.
    pub fn to_controller_sender(&self) -> BridgeSender<'_> {
        self.to_controller.sender()
    }

    pub fn to_controller_receiver(&self) -> BridgeReceiver<'_> {
        self.to_controller.receiver()
    }

    /// Sender for bytes received from the controller UART.
    pub fn to_host_sender(&self) -> BridgeSender<'_> {
        self.to_host.sender()
    }

    pub fn to_host_receiver(&self) -> BridgeReceiver<'_> {
        self.to_host.receiver()
    }
}

impl Default for BridgeQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Copies `bytes` into a frame, or returns `None` if they do not fit.
pub fn frame_from(bytes: &[u8]) -> Option<BridgeFrame> {
    BridgeFrame::from_slice(bytes).ok()
}

/// Presence change derived from a CDC port's DTR line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PresenceChange {
    /// The host opened the port.
    Opened,
    /// The host closed the port or the USB link dropped.
    Closed,
}

/// Edge detector for a CDC port's DTR state.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PortPresence {
    open: bool,
}

impl PortPresence {
    pub const fn new() -> Self {
        Self { open: false }
    }

    pub const fn is_open(&self) -> bool {
        self.open
    }

    /// Folds in the latest DTR level, returning a change on edges only.
    pub fn update(&mut self, dtr: bool) -> Option<PresenceChange> {
        if dtr == self.open {
            return None;
        }
        self.open = dtr;
        Some(if dtr {
            PresenceChange::Opened
        } else {
            PresenceChange::Closed
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presence_reports_edges_only() {
        let mut presence = PortPresence::new();

        assert_eq!(presence.update(false), None);
        assert_eq!(presence.update(true), Some(PresenceChange::Opened));
        assert_eq!(presence.update(true), None);
        assert!(presence.is_open());
        assert_eq!(presence.update(false), Some(PresenceChange::Closed));
    }

    #[test]
    fn oversized_frames_are_refused() {
        assert!(frame_from(&[0u8; BRIDGE_FRAME_SIZE]).is_some());
        assert!(frame_from(&[0u8; BRIDGE_FRAME_SIZE + 1]).is_none());
    }

    #[test]
    fn frames_flow_through_controller_channel() {
        let queue = BridgeQueue::new();
        let frame = frame_from(&[0x01, 0x03, 0x0c, 0x00]).expect("fits");

        queue
            .to_controller_sender()
            .try_send(frame.clone())
            .expect("queue has room");

        assert_eq!(queue.to_controller_receiver().try_receive(), Ok(frame));
    }
}
