//! Timing configuration for the sleep coordinator.

use core::fmt;
use core::time::Duration;

/// Activity timer period expressed in timer ticks.
pub const DEFAULT_TX_INTERVAL_TICKS: u32 = 6;

/// Duration of a single activity timer tick.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Idle window after which the link is re-evaluated for sleep.
pub const DEFAULT_TX_INTERVAL: Duration = Duration::from_secs(6);

/// Time the suspend-inhibiting power reference is held after sleep or stop.
pub const DEFAULT_POWER_RELEASE_GRACE: Duration = Duration::from_millis(500);

/// Errors emitted when a configuration cannot drive the activity timer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// The activity interval must be non-zero or the timer would spin.
    ZeroInterval,
    /// Tick count multiplied by tick length does not fit in a `Duration`.
    IntervalOverflow,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroInterval => f.write_str("activity interval must be non-zero"),
            ConfigError::IntervalOverflow => f.write_str("activity interval overflows"),
        }
    }
}

/// Timer interval and power-release grace used by the state machine.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SleepConfig {
    tx_interval: Duration,
    power_release_grace: Duration,
}

impl SleepConfig {
    /// Default configuration: six one-second ticks and a 500 ms grace.
    pub const DEFAULT: Self = Self {
        tx_interval: DEFAULT_TX_INTERVAL,
        power_release_grace: DEFAULT_POWER_RELEASE_GRACE,
    };

    /// Creates a configuration without validating the interval.
    #[must_use]
    pub const fn new(tx_interval: Duration, power_release_grace: Duration) -> Self {
        Self {
            tx_interval,
            power_release_grace,
        }
    }

    /// Creates a configuration, rejecting a zero activity interval.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroInterval`] when `tx_interval` is zero.
    pub const fn try_new(
        tx_interval: Duration,
        power_release_grace: Duration,
    ) -> Result<Self, ConfigError> {
        if tx_interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(Self::new(tx_interval, power_release_grace))
    }

    /// Builds a configuration from a tick count and tick length.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroInterval`] for a zero product and
    /// [`ConfigError::IntervalOverflow`] when the product does not fit.
    pub const fn from_ticks(
        ticks: u32,
        tick: Duration,
        power_release_grace: Duration,
    ) -> Result<Self, ConfigError> {
        match tick.checked_mul(ticks) {
            Some(interval) => Self::try_new(interval, power_release_grace),
            None => Err(ConfigError::IntervalOverflow),
        }
    }

    /// Idle window between activity evaluations.
    #[must_use]
    pub const fn tx_interval(&self) -> Duration {
        self.tx_interval
    }

    /// Delay before the power reference is dropped after sleep or stop.
    #[must_use]
    pub const fn power_release_grace(&self) -> Duration {
        self.power_release_grace
    }
}

impl Default for SleepConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
