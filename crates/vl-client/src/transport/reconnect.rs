//! Delay schedule between a closed connection and the next attempt

use std::time::Duration;

use vl_core::config::BackoffConfig;

/// Reconnect delays with optional growth and jitter.
///
/// With the default configuration every delay equals `initial`.
#[derive(Debug, Clone)]
pub struct ReconnectSchedule {
    /// Delay returned after a reset
    initial: Duration,
    /// Current delay
    current: Duration,
    /// Maximum delay
    max: Duration,
    /// Multiplier
    multiplier: f64,
    /// Jitter factor (0.0 to 1.0)
    jitter: f64,
}

impl ReconnectSchedule {
    /// Create a schedule from configuration
    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new(config.initial, config.max, config.multiplier, config.jitter)
    }

    /// Create a schedule with custom parameters
    pub fn new(initial: Duration, max: Duration, multiplier: f64, jitter: f64) -> Self {
        Self {
            initial,
            current: initial,
            max: std::cmp::max(max, initial),
            multiplier: multiplier.max(1.0),
            jitter: jitter.clamp(0.0, 1.0),
        }
    }

    /// Same delay every time
    pub fn fixed(delay: Duration) -> Self {
        Self::new(delay, delay, 1.0, 0.0)
    }

    /// Get the next delay and advance the schedule
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;

        let next = Duration::from_secs_f64(self.current.as_secs_f64() * self.multiplier);
        self.current = std::cmp::min(next, self.max);

        if self.jitter == 0.0 {
            return delay;
        }
        let jitter_amount = delay.as_secs_f64() * self.jitter * rand::random::<f64>();
        delay + Duration::from_secs_f64(jitter_amount)
    }

    /// Go back to the initial delay after a connection opened
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_schedule_never_grows() {
        let mut schedule = ReconnectSchedule::fixed(Duration::from_millis(1000));
        for _ in 0..5 {
            assert_eq!(schedule.next_delay(), Duration::from_millis(1000));
        }
    }

    #[test]
    fn test_default_config_is_fixed() {
        let mut schedule = ReconnectSchedule::from_config(&BackoffConfig::default());
        assert_eq!(schedule.next_delay(), Duration::from_secs(1));
        assert_eq!(schedule.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_backoff_increases_and_caps() {
        let mut schedule =
            ReconnectSchedule::new(Duration::from_secs(1), Duration::from_secs(4), 2.0, 0.0);

        assert_eq!(schedule.next_delay(), Duration::from_secs(1));
        assert_eq!(schedule.next_delay(), Duration::from_secs(2));
        assert_eq!(schedule.next_delay(), Duration::from_secs(4));
        assert_eq!(schedule.next_delay(), Duration::from_secs(4)); // Capped at max
    }

    #[test]
    fn test_reset_returns_to_initial() {
        let mut schedule =
            ReconnectSchedule::new(Duration::from_millis(100), Duration::from_secs(10), 3.0, 0.0);
        schedule.next_delay();
        schedule.next_delay();
        schedule.reset();
        assert_eq!(schedule.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let mut schedule =
            ReconnectSchedule::new(Duration::from_secs(2), Duration::from_secs(2), 1.0, 0.5);
        for _ in 0..20 {
            let delay = schedule.next_delay();
            assert!(delay >= Duration::from_secs(2));
            assert!(delay <= Duration::from_secs(3));
        }
    }
}
