//! Backoff policies for the dispatcher.
//!
//! `pause(attempt)` is asked after the `attempt`-th failed attempt (1-based)
//! and answers with the delay before the next attempt, or `None` to stop.

use crate::config::RetryConfig;
use std::time::Duration;

pub trait Backoff: Send + Sync {
    fn pause(&self, attempt: u32) -> Option<Duration>;
}

/// Exponential backoff: `initial * multiplier^(attempt-1)`, capped at
/// `max_delay`, stopping once `max_attempts` attempts have been made.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialBackoff {
    pub initial: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub max_attempts: u32,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for ExponentialBackoff {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            initial: Duration::from_millis(cfg.initial_delay_ms),
            max_delay: Duration::from_millis(cfg.max_delay_ms),
            multiplier: cfg.multiplier,
            max_attempts: cfg.max_attempts,
        }
    }
}

impl ExponentialBackoff {
    pub fn with_initial(mut self, d: Duration) -> Self {
        self.initial = d;
        self
    }

    pub fn with_max_delay(mut self, d: Duration) -> Self {
        self.max_delay = d;
        self
    }

    pub fn with_multiplier(mut self, m: f64) -> Self {
        self.multiplier = m;
        self
    }

    pub fn with_max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }
}

impl Backoff for ExponentialBackoff {
    fn pause(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt >= self.max_attempts {
            return None;
        }
        let exp = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let secs = self.initial.as_secs_f64() * self.multiplier.powi(exp);
        // infinite or out-of-range delays saturate at the cap
        let delay = Duration::try_from_secs_f64(secs.max(0.0))
            .map(|d| d.min(self.max_delay))
            .unwrap_or(self.max_delay);
        Some(delay)
    }
}

/// Retries immediately, forever.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPauseBackoff;

impl Backoff for NoPauseBackoff {
    fn pause(&self, _attempt: u32) -> Option<Duration> {
        Some(Duration::ZERO)
    }
}

/// Waits one second between attempts, forever.
#[derive(Debug, Clone, Copy, Default)]
pub struct PauseOneSecond;

impl Backoff for PauseOneSecond {
    fn pause(&self, _attempt: u32) -> Option<Duration> {
        Some(Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_doubles_then_caps() {
        let b = ExponentialBackoff::default()
            .with_initial(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(350))
            .with_max_attempts(10);
        assert_eq!(b.pause(1), Some(Duration::from_millis(100)));
        assert_eq!(b.pause(2), Some(Duration::from_millis(200)));
        assert_eq!(b.pause(3), Some(Duration::from_millis(350)));
        assert_eq!(b.pause(9), Some(Duration::from_millis(350)));
    }

    #[test]
    fn unbounded_cap_saturates_instead_of_overflowing() {
        let b = ExponentialBackoff::default()
            .with_max_delay(Duration::MAX)
            .with_max_attempts(u32::MAX);
        assert_eq!(b.pause(2000), Some(Duration::MAX));
        assert_eq!(b.pause(u32::MAX - 1), Some(Duration::MAX));
        assert_eq!(b.pause(2), Some(Duration::from_millis(200)));
    }

    #[test]
    fn exponential_stops_at_max_attempts() {
        let b = ExponentialBackoff::default().with_max_attempts(3);
        assert!(b.pause(2).is_some());
        assert_eq!(b.pause(3), None);
        assert_eq!(b.pause(0), None);
    }

    #[test]
    fn huge_attempt_numbers_stay_capped() {
        let b = ExponentialBackoff::default().with_max_attempts(u32::MAX);
        assert_eq!(b.pause(5000), Some(b.max_delay));
    }

    #[test]
    fn reference_policies_never_stop() {
        assert_eq!(NoPauseBackoff.pause(1_000_000), Some(Duration::ZERO));
        assert_eq!(PauseOneSecond.pause(42), Some(Duration::from_secs(1)));
    }
}
