//! # Supervisor configuration.
//!
//! Provides [`Config`], the settings shared by a [`SessionSupervisor`](crate::SessionSupervisor)
//! and every session it starts.
//!
//! ## Sentinel values
//! - `inactivity = 0s` → clamped to 1ms (a session must be able to expire)
//! - `mailbox_capacity = 0` / `bus_capacity = 0` → clamped to 1

use std::time::Duration;

/// Configuration for a session group.
///
/// ## Field semantics
/// - `inactivity`: how long a session with no subscriber and no delivery lives
/// - `mailbox_capacity`: bounded mailbox per session (producers wait when full)
/// - `bus_capacity`: event bus ring buffer size
/// - `grace`: how long `shutdown()` waits for sessions to run `terminate`
///
/// All fields are public. Prefer the helper accessors over sprinkling sentinel checks.
#[derive(Clone, Debug)]
pub struct Config {
    /// Inactivity window after which an unsubscribed session expires.
    ///
    /// The window restarts whenever a message is delivered or a subscriber goes
    /// away; it is suspended while a subscriber is waiting.
    pub inactivity: Duration,

    /// Capacity of each session's command mailbox.
    pub mailbox_capacity: usize,

    /// Capacity of the event bus broadcast channel.
    pub bus_capacity: usize,

    /// Maximum time to wait for sessions to stop during shutdown.
    pub grace: Duration,
}

impl Config {
    /// Inactivity window, never zero.
    #[inline]
    pub fn inactivity_window(&self) -> Duration {
        self.inactivity.max(Duration::from_millis(1))
    }

    /// Mailbox capacity clamped to a minimum of 1.
    #[inline]
    pub fn mailbox_capacity_clamped(&self) -> usize {
        self.mailbox_capacity.max(1)
    }

    /// Bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `inactivity = 30s`
    /// - `mailbox_capacity = 1024`
    /// - `bus_capacity = 1024`
    /// - `grace = 10s`
    fn default() -> Self {
        Self {
            inactivity: Duration::from_secs(30),
            mailbox_capacity: 1024,
            bus_capacity: 1024,
            grace: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_values_are_clamped() {
        let cfg = Config {
            inactivity: Duration::ZERO,
            mailbox_capacity: 0,
            bus_capacity: 0,
            grace: Duration::ZERO,
        };
        assert_eq!(cfg.inactivity_window(), Duration::from_millis(1));
        assert_eq!(cfg.mailbox_capacity_clamped(), 1);
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.inactivity_window(), Duration::from_secs(30));
        assert_eq!(cfg.mailbox_capacity_clamped(), 1024);
    }
}
