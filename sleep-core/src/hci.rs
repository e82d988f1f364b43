//! Controller registration notifications from the Bluetooth stack.
//!
//! The stack reports when an HCI controller comes and goes. The first
//! registration binds its UART transport to the coordinator; later ones are
//! refused until the bound controller unregisters.

use crate::context::WakeContext;
use crate::hal::{ActivityTimer, HostWakeIrq, PowerReference, UartTransport, WakeGpio};

/// Registration event delivered by the Bluetooth stack.
#[derive(Debug, Eq, PartialEq)]
pub enum ControllerEvent<T> {
    Registered(T),
    Unregistered,
}

/// What the coordinator did with a [`ControllerEvent`].
#[derive(Debug, Eq, PartialEq)]
pub enum RegistrationOutcome<T> {
    /// The transport is now bound.
    Attached,
    /// Another transport is already bound; the new one is handed back.
    Rejected(T),
    /// The bound transport was released and is handed back.
    Detached(T),
    /// Unregistration arrived with nothing bound.
    NotAttached,
}

impl<G, Tm, P, T, I> WakeContext<G, Tm, P, T, I>
where
    G: WakeGpio,
    Tm: ActivityTimer,
    P: PowerReference,
    T: UartTransport,
    I: HostWakeIrq,
{
    /// Applies a controller registration event under the coordinator lock.
    pub fn notify_controller(&self, event: ControllerEvent<T>) -> RegistrationOutcome<T> {
        match event {
            ControllerEvent::Registered(transport) => match self.attach_transport(transport) {
                Ok(()) => RegistrationOutcome::Attached,
                Err(rejected) => RegistrationOutcome::Rejected(rejected),
            },
            ControllerEvent::Unregistered => self
                .detach_transport()
                .map_or(RegistrationOutcome::NotAttached, RegistrationOutcome::Detached),
        }
    }
}
