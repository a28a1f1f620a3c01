//! Retry policy for writes that race with other writers.

use std::time::Duration;

use rand::Rng;

use crate::errors::StoreError;

/// Runtime retry settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included.
    pub max_attempts: u32,
    /// Base delay between retry attempts.
    pub base_delay: Duration,
    /// Maximum delay between retry attempts (for exponential backoff).
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(20),
            max_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (0-based): exponential backoff
    /// with ±25% jitter, capped at `max_delay`.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_possible_wrap
    )]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base_delay_ms = self.base_delay.as_millis() as f64;
        let max_delay_ms = self.max_delay.as_millis() as f64;

        let delay = base_delay_ms * self.backoff_multiplier.powi(attempt as i32);
        let delay = delay.min(max_delay_ms);

        let jitter = delay * 0.25 * rand::rng().random_range(-1.0..=1.0);
        let final_delay = (delay + jitter).max(0.0).min(max_delay_ms) as u64;

        Duration::from_millis(final_delay)
    }
}

/// Policy defining which store errors trigger a retry.
#[derive(Debug, Clone, Copy, Default)]
pub enum RetryPolicy {
    /// Only retry on version conflicts.
    #[default]
    ConcurrencyConflictsOnly,
    /// Retry on version conflicts and transient store faults.
    ConcurrencyAndTransient,
    /// Custom policy with user-defined predicate.
    Custom(fn(&StoreError) -> bool),
}

impl RetryPolicy {
    /// Determines if an error should trigger a retry.
    pub fn should_retry(&self, error: &StoreError) -> bool {
        match self {
            Self::ConcurrencyConflictsOnly => matches!(error, StoreError::VersionConflict { .. }),
            Self::ConcurrencyAndTransient => {
                matches!(error, StoreError::VersionConflict { .. }) || error.is_transient()
            }
            Self::Custom(predicate) => predicate(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventId, OrderId, OrderVersion};

    fn conflict() -> StoreError {
        StoreError::VersionConflict {
            order_id: OrderId::new(),
            expected: OrderVersion::initial(),
            current: OrderVersion::initial().next(),
        }
    }

    #[test]
    fn default_policy_retries_only_conflicts() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(&conflict()));
        assert!(!policy.should_retry(&StoreError::Timeout(Duration::from_millis(10))));
        assert!(!policy.should_retry(&StoreError::DuplicateEvent(EventId::new())));
    }

    #[test]
    fn transient_policy_also_retries_outages() {
        let policy = RetryPolicy::ConcurrencyAndTransient;
        assert!(policy.should_retry(&conflict()));
        assert!(policy.should_retry(&StoreError::Unavailable("down".to_string())));
        assert!(!policy.should_retry(&StoreError::Internal("bug".to_string())));
    }

    #[test]
    fn custom_policy_uses_predicate() {
        let policy = RetryPolicy::Custom(|error| matches!(error, StoreError::Internal(_)));
        assert!(policy.should_retry(&StoreError::Internal("x".to_string())));
        assert!(!policy.should_retry(&conflict()));
    }

    #[test]
    fn delays_grow_and_stay_capped() {
        let config = RetryConfig {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
            backoff_multiplier: 2.0,
        };
        let first = config.delay_for(0);
        assert!(first >= Duration::from_millis(75) && first <= Duration::from_millis(125));
        for attempt in 0..10 {
            assert!(config.delay_for(attempt) <= config.max_delay);
        }
    }
}
