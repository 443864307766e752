//! Configuration Module
//!
//! Handles loading and managing store configuration from environment variables.

use std::env;
use std::time::Duration;

/// Default base interval between expiration sweeps (30 seconds)
pub const DEFAULT_EXPIRATION_INTERVAL: Duration = Duration::from_secs(30);

/// Default floor for the adaptively shortened sweep interval (5 milliseconds)
pub const DEFAULT_MIN_WAKE_INTERVAL: Duration = Duration::from_millis(5);

/// Store configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base interval between expiration sweeps, and the ceiling on the
    /// adaptive sleep computed from the next pending deadline
    pub expiration_interval: Duration,
    /// Shortest sleep the expiration task will take between sweeps
    pub min_wake_interval: Duration,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `TINYKV_EXPIRATION_INTERVAL_MS` - Base sweep interval (default: 30000)
    /// - `TINYKV_MIN_WAKE_INTERVAL_MS` - Adaptive sleep floor (default: 5)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            expiration_interval: millis_from_env("TINYKV_EXPIRATION_INTERVAL_MS")
                .unwrap_or(defaults.expiration_interval),
            min_wake_interval: millis_from_env("TINYKV_MIN_WAKE_INTERVAL_MS")
                .unwrap_or(defaults.min_wake_interval),
        }
        .normalized()
    }

    /// Sets the base expiration interval
    pub fn with_expiration_interval(mut self, interval: Duration) -> Self {
        self.expiration_interval = interval;
        self
    }

    /// Sets the adaptive sleep floor
    pub fn with_min_wake_interval(mut self, interval: Duration) -> Self {
        self.min_wake_interval = interval;
        self
    }

    /// Replaces a zero base interval with the default and keeps the floor
    /// at or below the base interval.
    pub fn normalized(mut self) -> Self {
        if self.expiration_interval.is_zero() {
            self.expiration_interval = DEFAULT_EXPIRATION_INTERVAL;
        }
        if self.min_wake_interval > self.expiration_interval {
            self.min_wake_interval = self.expiration_interval;
        }
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            expiration_interval: DEFAULT_EXPIRATION_INTERVAL,
            min_wake_interval: DEFAULT_MIN_WAKE_INTERVAL,
        }
    }
}

fn millis_from_env(name: &str) -> Option<Duration> {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.expiration_interval, Duration::from_secs(30));
        assert_eq!(config.min_wake_interval, Duration::from_millis(5));
    }

    #[test]
    fn test_config_from_env() {
        env::set_var("TINYKV_EXPIRATION_INTERVAL_MS", "250");
        env::set_var("TINYKV_MIN_WAKE_INTERVAL_MS", "not-a-number");

        let config = Config::from_env();
        assert_eq!(config.expiration_interval, Duration::from_millis(250));
        assert_eq!(config.min_wake_interval, DEFAULT_MIN_WAKE_INTERVAL);

        env::remove_var("TINYKV_EXPIRATION_INTERVAL_MS");
        env::remove_var("TINYKV_MIN_WAKE_INTERVAL_MS");
    }

    #[test]
    fn test_zero_interval_falls_back_to_default() {
        let config = Config::default()
            .with_expiration_interval(Duration::ZERO)
            .normalized();
        assert_eq!(config.expiration_interval, DEFAULT_EXPIRATION_INTERVAL);
    }

    #[test]
    fn test_floor_never_exceeds_base() {
        let config = Config::default()
            .with_expiration_interval(Duration::from_millis(2))
            .with_min_wake_interval(Duration::from_millis(50))
            .normalized();
        assert_eq!(config.min_wake_interval, Duration::from_millis(2));
    }
}
