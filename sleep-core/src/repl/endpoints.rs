//! Text diagnostic endpoints.
//!
//! Four tiny files expose the coordinator to test tooling: `btwake`,
//! `hostwake`, `proto`, and `asleep`. Reads render a single line; writes look
//! at the first byte only.

use core::fmt;

use crate::error::{InputError, SleepError};

use super::SleepControl;

/// Diagnostic endpoint identifiers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Endpoint {
    BtWake,
    HostWake,
    Proto,
    Asleep,
}

impl Endpoint {
    pub const ALL: [Endpoint; 4] = [
        Endpoint::BtWake,
        Endpoint::HostWake,
        Endpoint::Proto,
        Endpoint::Asleep,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Endpoint::BtWake => "btwake",
            Endpoint::HostWake => "hostwake",
            Endpoint::Proto => "proto",
            Endpoint::Asleep => "asleep",
        }
    }

    /// Looks an endpoint up by name, ignoring ASCII case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|endpoint| endpoint.name().eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub const fn is_writable(self) -> bool {
        matches!(self, Endpoint::BtWake | Endpoint::Proto)
    }

    #[must_use]
    pub const fn summary(self) -> &'static str {
        match self {
            Endpoint::BtWake => "ext-wake output level; write 0/1 to force it",
            Endpoint::HostWake => "host-wake input level (read-only)",
            Endpoint::Proto => "sleep protocol enabled; write 0 to stop, anything else to start",
            Endpoint::Asleep => "UART powered down (read-only)",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Effect requested by a diagnostic write.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WriteAction {
    ForceExtWake(bool),
    Start,
    Stop,
}

/// Decodes a write payload for `endpoint`.
///
/// # Errors
///
/// Returns an [`InputError`] for read-only endpoints, empty payloads, and
/// unrecognized `btwake` values.
pub fn parse_write(endpoint: Endpoint, payload: &[u8]) -> Result<WriteAction, InputError> {
    if !endpoint.is_writable() {
        return Err(InputError::ReadOnly(endpoint));
    }
    let Some(&first) = payload.first() else {
        return Err(InputError::Empty);
    };

    match (endpoint, first) {
        (Endpoint::BtWake, b'0') => Ok(WriteAction::ForceExtWake(false)),
        (Endpoint::BtWake, b'1') => Ok(WriteAction::ForceExtWake(true)),
        (Endpoint::Proto, b'0') => Ok(WriteAction::Stop),
        (Endpoint::Proto, _) => Ok(WriteAction::Start),
        (_, other) => Err(InputError::Unrecognized(other)),
    }
}

/// Renders the current value of `endpoint`.
///
/// # Errors
///
/// Propagates writer failures.
pub fn read_endpoint<C, W>(control: &C, endpoint: Endpoint, writer: &mut W) -> fmt::Result
where
    C: SleepControl + ?Sized,
    W: fmt::Write,
{
    let snapshot = control.snapshot();
    match endpoint {
        Endpoint::BtWake => writeln!(writer, "btwake:{}", u8::from(snapshot.ext_wake)),
        Endpoint::HostWake => writeln!(writer, "hostwake: {}", u8::from(snapshot.host_wake)),
        Endpoint::Proto => writeln!(writer, "proto: {}", u8::from(snapshot.protocol_enabled())),
        Endpoint::Asleep => writeln!(writer, "asleep: {}", u8::from(snapshot.asleep())),
    }
}

/// Applies a write to `endpoint` and returns the number of bytes consumed.
///
/// # Errors
///
/// Returns [`SleepError::InvalidInput`] for rejected payloads and any error
/// raised by `start`.
pub fn write_endpoint<C>(control: &C, endpoint: Endpoint, payload: &[u8]) -> Result<usize, SleepError>
where
    C: SleepControl + ?Sized,
{
    match parse_write(endpoint, payload)? {
        WriteAction::ForceExtWake(level) => control.force_ext_wake(level),
        WriteAction::Start => {
            control.start()?;
        }
        WriteAction::Stop => {
            control.stop();
        }
    }
    Ok(payload.len())
}
