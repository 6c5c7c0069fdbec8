//! Timing policy for thermostat sessions.

use std::time::Duration;

use time::UtcOffset;
use time::macros::offset;

/// Default interval between checks for an established link.
const DEFAULT_CONNECT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default number of link checks per connection attempt.
const DEFAULT_CONNECT_POLLS: u32 = 10;

/// Default pause between failed connection attempts.
const DEFAULT_CONNECT_BACKOFF: Duration = Duration::from_secs(2);

/// Default wait after a disconnect request.
const DEFAULT_DISCONNECT_SETTLE: Duration = Duration::from_secs(1);

/// Default window for a response notification to arrive.
const DEFAULT_RESPONSE_SETTLE: Duration = Duration::from_secs(1);

/// Default number of connection attempts.
const DEFAULT_MAX_CONNECT_ATTEMPTS: u32 = 3;

/// Configuration for connection retries and response waits.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use eqiva_core::SessionConfig;
///
/// let config = SessionConfig::default()
///     .max_connect_attempts(5)
///     .response_settle(Duration::from_millis(1500));
/// assert_eq!(config.max_connect_attempts, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Interval between checks for an established link.
    pub connect_poll_interval: Duration,
    /// Number of link checks per connection attempt.
    pub connect_polls: u32,
    /// Pause between failed connection attempts (not after the last one).
    pub connect_backoff: Duration,
    /// Wait after asking the transport to disconnect.
    pub disconnect_settle: Duration,
    /// Window in which the device must answer a command.
    pub response_settle: Duration,
    /// Connection attempts made by [`crate::Thermostat::connect`].
    pub max_connect_attempts: u32,
    /// Offset of the thermostat's local clock from UTC.
    pub utc_offset: UtcOffset,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_poll_interval: DEFAULT_CONNECT_POLL_INTERVAL,
            connect_polls: DEFAULT_CONNECT_POLLS,
            connect_backoff: DEFAULT_CONNECT_BACKOFF,
            disconnect_settle: DEFAULT_DISCONNECT_SETTLE,
            response_settle: DEFAULT_RESPONSE_SETTLE,
            max_connect_attempts: DEFAULT_MAX_CONNECT_ATTEMPTS,
            utc_offset: offset!(+1),
        }
    }
}

impl SessionConfig {
    /// Create a new session config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config for nearby devices with a strong signal.
    ///
    /// Shorter polls and settle windows detect failure sooner.
    pub fn fast() -> Self {
        Self {
            connect_poll_interval: Duration::from_millis(250),
            connect_polls: 20,
            connect_backoff: Duration::from_millis(500),
            disconnect_settle: Duration::from_millis(250),
            response_settle: Duration::from_millis(500),
            ..Self::default()
        }
    }

    /// Total time one connection attempt waits for the link.
    pub fn attempt_window(&self) -> Duration {
        self.connect_poll_interval.saturating_mul(self.connect_polls)
    }

    /// Set the link check interval.
    #[must_use]
    pub fn connect_poll_interval(mut self, interval: Duration) -> Self {
        self.connect_poll_interval = interval;
        self
    }

    /// Set the number of link checks per attempt.
    #[must_use]
    pub fn connect_polls(mut self, polls: u32) -> Self {
        self.connect_polls = polls;
        self
    }

    /// Set the pause between failed attempts.
    #[must_use]
    pub fn connect_backoff(mut self, backoff: Duration) -> Self {
        self.connect_backoff = backoff;
        self
    }

    /// Set the wait after a disconnect request.
    #[must_use]
    pub fn disconnect_settle(mut self, settle: Duration) -> Self {
        self.disconnect_settle = settle;
        self
    }

    /// Set the response window.
    #[must_use]
    pub fn response_settle(mut self, settle: Duration) -> Self {
        self.response_settle = settle;
        self
    }

    /// Set the number of connection attempts.
    #[must_use]
    pub fn max_connect_attempts(mut self, attempts: u32) -> Self {
        self.max_connect_attempts = attempts;
        self
    }

    /// Set the thermostat's UTC offset.
    #[must_use]
    pub fn utc_offset(mut self, offset: UtcOffset) -> Self {
        self.utc_offset = offset;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.connect_poll_interval, Duration::from_secs(1));
        assert_eq!(config.connect_polls, 10);
        assert_eq!(config.connect_backoff, Duration::from_secs(2));
        assert_eq!(config.disconnect_settle, Duration::from_secs(1));
        assert_eq!(config.response_settle, Duration::from_secs(1));
        assert_eq!(config.max_connect_attempts, 3);
        assert_eq!(config.utc_offset.whole_hours(), 1);
        assert_eq!(config.attempt_window(), Duration::from_secs(10));
    }

    #[test]
    fn test_fast_is_faster() {
        let fast = SessionConfig::fast();
        let default = SessionConfig::default();
        assert!(fast.response_settle < default.response_settle);
        assert!(fast.connect_backoff < default.connect_backoff);
        assert_eq!(fast.max_connect_attempts, default.max_connect_attempts);
    }

    #[test]
    fn test_builder() {
        let config = SessionConfig::new()
            .connect_polls(3)
            .connect_poll_interval(Duration::from_millis(100))
            .utc_offset(UtcOffset::UTC);
        assert_eq!(config.attempt_window(), Duration::from_millis(300));
        assert!(config.utc_offset.is_utc());
    }
}
