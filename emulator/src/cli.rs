//! Command-line options for the emulator binary.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use bluesleep_core::SleepError;
use bluesleep_core::config::{
    ConfigError, DEFAULT_POWER_RELEASE_GRACE, DEFAULT_TICK, DEFAULT_TX_INTERVAL_TICKS, SleepConfig,
};

use crate::board::PinMap;

pub const USAGE: &str = "Usage: bluesleep-emulator [--interval <ticks>] [--grace <ms>] \
[--host-wake-pin <gpio>] [--ext-wake-pin <gpio>] [--transcript <path>]";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Options {
    pub config: SleepConfig,
    pub pins: PinMap,
    pub transcript: Option<PathBuf>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OptionsError {
    UnknownFlag(String),
    MissingValue(&'static str),
    InvalidNumber { flag: &'static str, value: String },
    Config(ConfigError),
    Pins(SleepError),
}

impl fmt::Display for OptionsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionsError::UnknownFlag(flag) => write!(f, "unknown flag `{flag}`"),
            OptionsError::MissingValue(flag) => write!(f, "expected a value after {flag}"),
            OptionsError::InvalidNumber { flag, value } => {
                write!(f, "{flag} expects a number, got `{value}`")
            }
            OptionsError::Config(err) => write!(f, "invalid timing: {err}"),
            OptionsError::Pins(err) => write!(f, "cannot claim wake lines: {err}"),
        }
    }
}

fn number(flag: &'static str, value: Option<String>) -> Result<u32, OptionsError> {
    let value = value.ok_or(OptionsError::MissingValue(flag))?;
    value
        .parse()
        .map_err(|_| OptionsError::InvalidNumber { flag, value })
}

/// Parses emulator flags (without the program name).
///
/// # Errors
///
/// Returns an [`OptionsError`] for malformed flags, invalid timing, or a wake
/// line that cannot be claimed.
pub fn parse<I>(args: I) -> Result<Options, OptionsError>
where
    I: IntoIterator<Item = String>,
{
    let mut ticks = DEFAULT_TX_INTERVAL_TICKS;
    let mut grace = DEFAULT_POWER_RELEASE_GRACE;
    let mut host_wake_pin = PinMap::DEFAULT.host_wake;
    let mut ext_wake_pin = PinMap::DEFAULT.ext_wake;
    let mut transcript = None;

    let mut args = args.into_iter();
    while let Some(flag) = args.next() {
        match flag.as_str() {
            "--interval" => ticks = number("--interval", args.next())?,
            "--grace" => {
                grace = Duration::from_millis(u64::from(number("--grace", args.next())?));
            }
            "--host-wake-pin" => host_wake_pin = number("--host-wake-pin", args.next())?,
            "--ext-wake-pin" => ext_wake_pin = number("--ext-wake-pin", args.next())?,
            "--transcript" => {
                let path = args.next().ok_or(OptionsError::MissingValue("--transcript"))?;
                transcript = Some(PathBuf::from(path));
            }
            _ => return Err(OptionsError::UnknownFlag(flag)),
        }
    }

    let config =
        SleepConfig::from_ticks(ticks, DEFAULT_TICK, grace).map_err(OptionsError::Config)?;
    let pins = PinMap::claim(host_wake_pin, ext_wake_pin).map_err(OptionsError::Pins)?;
    Ok(Options {
        config,
        pins,
        transcript,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluesleep_core::error::Resource;
    use bluesleep_core::hal::WakeLine;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|arg| (*arg).to_owned()).collect()
    }

    #[test]
    fn defaults_match_core_timing() {
        let options = parse(Vec::new()).expect("defaults");

        assert_eq!(options.config, SleepConfig::DEFAULT);
        assert_eq!(options.pins, PinMap::DEFAULT);
        assert_eq!(options.transcript, None);
    }

    #[test]
    fn flags_override_timing_and_pins() {
        let options = parse(args(&[
            "--interval",
            "2",
            "--grace",
            "100",
            "--host-wake-pin",
            "4",
            "--ext-wake-pin",
            "5",
        ]))
        .expect("valid flags");

        assert_eq!(options.config.tx_interval(), Duration::from_secs(2));
        assert_eq!(options.config.power_release_grace(), Duration::from_millis(100));
        assert_eq!(options.pins, PinMap { host_wake: 4, ext_wake: 5 });
    }

    #[test]
    fn rejects_zero_interval_and_shared_pin() {
        assert_eq!(
            parse(args(&["--interval", "0"])),
            Err(OptionsError::Config(ConfigError::ZeroInterval))
        );
        assert_eq!(
            parse(args(&["--host-wake-pin", "7", "--ext-wake-pin", "7"])),
            Err(OptionsError::Pins(SleepError::ResourceUnavailable(Resource::Line(
                WakeLine::ExtWake
            ))))
        );
        assert_eq!(
            parse(args(&["--grace"])),
            Err(OptionsError::MissingValue("--grace"))
        );
    }
}
