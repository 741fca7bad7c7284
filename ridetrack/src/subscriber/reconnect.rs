//! Reopen policy for dropped change feeds.

use std::time::Duration;

/// Delay before the first reopen attempt.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);

/// Upper bound for the delay between attempts.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Attempts before the subscriber gives up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Exponential backoff for reopening a dropped feed.
///
/// The delay doubles after every failed attempt, starting at
/// `initial_delay` and capped at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Zero disables reconnection.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    /// Policy that never reopens a dropped feed.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Whether any reopen attempt is allowed.
    pub fn is_enabled(&self) -> bool {
        self.max_attempts > 0
    }

    /// Delay before the 1-based `attempt`, or `None` once attempts are exhausted.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        Some(self.initial_delay.saturating_mul(factor).min(self.max_delay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_until_cap() {
        let policy = ReconnectPolicy::default().with_max_attempts(8);
        let delays: Vec<u64> = (1..=7)
            .map(|attempt| policy.delay_for(attempt).unwrap().as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30]);
    }

    #[test]
    fn test_attempts_are_bounded() {
        let policy = ReconnectPolicy::default();
        assert!(policy.delay_for(0).is_none());
        assert!(policy.delay_for(5).is_some());
        assert!(policy.delay_for(6).is_none());
    }

    #[test]
    fn test_disabled_policy() {
        let policy = ReconnectPolicy::disabled();
        assert!(!policy.is_enabled());
        assert!(policy.delay_for(1).is_none());
    }

    #[test]
    fn test_large_attempt_does_not_overflow() {
        let policy = ReconnectPolicy::default().with_max_attempts(u32::MAX);
        assert_eq!(policy.delay_for(40), Some(DEFAULT_MAX_DELAY));
    }
}
