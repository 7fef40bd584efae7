//! Synchronization configuration.

use std::time::Duration;

/// Default interval between training-status polls.
pub const TRAINING_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default interval between dashboard refreshes.
pub const DASHBOARD_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Default interval between health checks.
pub const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default display time of a notification.
pub const NOTIFICATION_DURATION: Duration = Duration::from_millis(4000);

/// Default number of simultaneously visible notifications.
pub const MAX_VISIBLE_NOTIFICATIONS: usize = 5;

/// Default length of a notification's exit transition.
pub const EXIT_TRANSITION: Duration = Duration::from_millis(300);

/// Timing and capacity settings for pollers and notifications.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub training_interval: Duration,
    pub dashboard_interval: Duration,
    pub health_interval: Duration,
    pub notification_duration: Duration,
    pub max_visible_notifications: usize,
    pub exit_transition: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            training_interval: TRAINING_POLL_INTERVAL,
            dashboard_interval: DASHBOARD_POLL_INTERVAL,
            health_interval: HEALTH_POLL_INTERVAL,
            notification_duration: NOTIFICATION_DURATION,
            max_visible_notifications: MAX_VISIBLE_NOTIFICATIONS,
            exit_transition: EXIT_TRANSITION,
        }
    }
}

impl SyncConfig {
    /// Create config from environment variables, falling back to defaults.
    ///
    /// Intervals are read from `VEXA_TRAINING_POLL_SECS`,
    /// `VEXA_DASHBOARD_POLL_SECS` and `VEXA_HEALTH_POLL_SECS`; notifications
    /// from `VEXA_NOTIFICATION_MS` and `VEXA_MAX_NOTIFICATIONS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let secs = |name: &str, fallback: Duration| {
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|&v| v > 0)
                .map(Duration::from_secs)
                .unwrap_or(fallback)
        };

        let notification_duration = std::env::var("VEXA_NOTIFICATION_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.notification_duration);

        let max_visible_notifications = std::env::var("VEXA_MAX_NOTIFICATIONS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(defaults.max_visible_notifications);

        Self {
            training_interval: secs("VEXA_TRAINING_POLL_SECS", defaults.training_interval),
            dashboard_interval: secs("VEXA_DASHBOARD_POLL_SECS", defaults.dashboard_interval),
            health_interval: secs("VEXA_HEALTH_POLL_SECS", defaults.health_interval),
            notification_duration,
            max_visible_notifications,
            exit_transition: defaults.exit_transition,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_screens() {
        let config = SyncConfig::default();
        assert_eq!(config.training_interval, Duration::from_secs(5));
        assert_eq!(config.dashboard_interval, Duration::from_secs(30));
        assert_eq!(config.health_interval, Duration::from_secs(10));
        assert_eq!(config.max_visible_notifications, 5);
    }
}
