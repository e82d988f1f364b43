//! Error types surfaced by the lifecycle and diagnostic operations.

use core::fmt;

use crate::hal::{IrqError, WakeLine};
use crate::repl::endpoints::Endpoint;

/// Hardware resource that could not be acquired.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Resource {
    /// Registering the host-wake interrupt failed.
    HostWakeIrq(IrqError),
    /// Claiming a wake line failed during board setup.
    Line(WakeLine),
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::HostWakeIrq(err) => write!(f, "host_wake irq ({err})"),
            Resource::Line(line) => write!(f, "{line} line"),
        }
    }
}

/// Rejected diagnostic write payloads.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InputError {
    /// The write carried no bytes.
    Empty,
    /// The first byte is not accepted by the endpoint.
    Unrecognized(u8),
    /// The endpoint does not accept writes.
    ReadOnly(Endpoint),
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::Empty => f.write_str("empty payload"),
            InputError::Unrecognized(byte) => write!(f, "unrecognized value 0x{byte:02x}"),
            InputError::ReadOnly(endpoint) => write!(f, "{endpoint} is read-only"),
        }
    }
}

/// Errors produced by [`crate::context::WakeContext`] operations.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SleepError {
    /// `start` was requested while the coordinator is already started.
    Busy,
    /// A hardware resource could not be acquired; partial acquisitions were unwound.
    ResourceUnavailable(Resource),
    /// A diagnostic write was rejected.
    InvalidInput(InputError),
}

impl fmt::Display for SleepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SleepError::Busy => f.write_str("sleep coordinator already started"),
            SleepError::ResourceUnavailable(resource) => {
                write!(f, "resource unavailable: {resource}")
            }
            SleepError::InvalidInput(err) => write!(f, "invalid input: {err}"),
        }
    }
}

impl From<InputError> for SleepError {
    fn from(value: InputError) -> Self {
        SleepError::InvalidInput(value)
    }
}

impl From<Resource> for SleepError {
    fn from(value: Resource) -> Self {
        SleepError::ResourceUnavailable(value)
    }
}
