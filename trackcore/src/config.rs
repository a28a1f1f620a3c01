//! Validated configuration for the tracking service.
//!
//! Each tunable is a `nutype` newtype with its allowed range, so an invalid
//! configuration cannot be constructed.

use nutype::nutype;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeout applied to every order store call, in milliseconds.
///
/// Between 100ms and 10 minutes.
#[nutype(
    validate(greater_or_equal = 100, less_or_equal = 600_000),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct StoreTimeoutMs(u64);

impl StoreTimeoutMs {
    /// Convert to Duration for use with `tokio::time::timeout`.
    pub fn as_duration(self) -> Duration {
        Duration::from_millis(self.into())
    }
}

/// Maximum number of attempts for a write that hits a version conflict.
///
/// Between 1 and 10 attempts.
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 10),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct MaxRetryAttempts(u32);

/// Base delay between retry attempts in milliseconds.
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 10_000),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct RetryBaseDelayMs(u64);

impl RetryBaseDelayMs {
    /// Convert to Duration for use with `tokio::time::sleep`.
    pub fn as_duration(self) -> Duration {
        Duration::from_millis(self.into())
    }
}

/// Upper bound on the delay between retry attempts in milliseconds.
#[nutype(
    validate(greater_or_equal = 10, less_or_equal = 300_000),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct RetryMaxDelayMs(u64);

impl RetryMaxDelayMs {
    /// Convert to Duration for use with `tokio::time::sleep`.
    pub fn as_duration(self) -> Duration {
        Duration::from_millis(self.into())
    }
}

/// Exponential backoff multiplier for retry delays.
///
/// Between 1.1 and 3.0.
#[nutype(
    validate(greater_or_equal = 1.1, less_or_equal = 3.0),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        PartialOrd,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct BackoffMultiplier(f64);

/// Number of notifications that may wait for the dispatcher.
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 100_000),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct NotificationQueueCapacity(usize);

/// Time a single dispatcher call may take, in milliseconds.
#[nutype(
    validate(greater_or_equal = 100, less_or_equal = 600_000),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct NotificationTimeoutMs(u64);

impl NotificationTimeoutMs {
    /// Convert to Duration for use with `tokio::time::timeout`.
    pub fn as_duration(self) -> Duration {
        Duration::from_millis(self.into())
    }
}

/// Lead time used to schedule delivery when an order is confirmed without
/// an estimate, in days.
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 60),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct DefaultDeliveryDays(u32);

/// Largest page an email search may return.
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 500),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct MaxPageSize(usize);

/// Retry settings for conflicting writes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidatedRetryConfig {
    /// Maximum number of attempts.
    pub max_attempts: MaxRetryAttempts,
    /// Delay before the first retry.
    pub base_delay: RetryBaseDelayMs,
    /// Cap on any single delay.
    pub max_delay: RetryMaxDelayMs,
    /// Growth factor between delays.
    pub backoff_multiplier: BackoffMultiplier,
}

impl ValidatedRetryConfig {
    /// Safe defaults: 3 attempts starting at 20ms.
    ///
    /// # Errors
    ///
    /// Returns validation errors if any of the default values are invalid
    /// (which should never happen with proper constants).
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            max_attempts: MaxRetryAttempts::try_new(3)?,
            base_delay: RetryBaseDelayMs::try_new(20)?,
            max_delay: RetryMaxDelayMs::try_new(1_000)?,
            backoff_multiplier: BackoffMultiplier::try_new(2.0)?,
        })
    }

    /// Fewer attempts with short delays.
    pub fn fast() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            max_attempts: MaxRetryAttempts::try_new(2)?,
            base_delay: RetryBaseDelayMs::try_new(5)?,
            max_delay: RetryMaxDelayMs::try_new(100)?,
            backoff_multiplier: BackoffMultiplier::try_new(1.5)?,
        })
    }

    /// More attempts with longer delays.
    pub fn patient() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            max_attempts: MaxRetryAttempts::try_new(6)?,
            base_delay: RetryBaseDelayMs::try_new(50)?,
            max_delay: RetryMaxDelayMs::try_new(5_000)?,
            backoff_multiplier: BackoffMultiplier::try_new(2.5)?,
        })
    }

    /// Converts to the plain retry settings used at runtime.
    pub fn to_retry_config(&self) -> crate::retry::RetryConfig {
        crate::retry::RetryConfig {
            max_attempts: self.max_attempts.into(),
            base_delay: self.base_delay.as_duration(),
            max_delay: self.max_delay.as_duration(),
            backoff_multiplier: self.backoff_multiplier.into(),
        }
    }
}

impl Default for ValidatedRetryConfig {
    fn default() -> Self {
        Self::new().expect("Default retry configuration should always be valid")
    }
}

/// All tunables of the tracking service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Timeout for every store call.
    pub store_timeout: StoreTimeoutMs,
    /// Retry settings for conflicting writes.
    pub retry: ValidatedRetryConfig,
    /// Capacity of the notification queue.
    pub notification_queue_capacity: NotificationQueueCapacity,
    /// Timeout for a single dispatcher call.
    pub notification_timeout: NotificationTimeoutMs,
    /// Lead time used when confirming without an estimate.
    pub default_delivery_days: DefaultDeliveryDays,
    /// Largest page returned by an email search.
    pub max_page_size: MaxPageSize,
}

impl TrackingConfig {
    /// Safe defaults.
    ///
    /// # Errors
    ///
    /// Returns validation errors if any of the default values are invalid.
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            store_timeout: StoreTimeoutMs::try_new(5_000)?,
            retry: ValidatedRetryConfig::new()?,
            notification_queue_capacity: NotificationQueueCapacity::try_new(1_024)?,
            notification_timeout: NotificationTimeoutMs::try_new(10_000)?,
            default_delivery_days: DefaultDeliveryDays::try_new(5)?,
            max_page_size: MaxPageSize::try_new(50)?,
        })
    }

    /// Short timeouts and quick retries for interactive traffic.
    pub fn low_latency() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            store_timeout: StoreTimeoutMs::try_new(500)?,
            retry: ValidatedRetryConfig::fast()?,
            notification_timeout: NotificationTimeoutMs::try_new(2_000)?,
            ..Self::new()?
        })
    }

    /// Generous timeouts, more retries and a deeper notification queue.
    pub fn high_reliability() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            store_timeout: StoreTimeoutMs::try_new(30_000)?,
            retry: ValidatedRetryConfig::patient()?,
            notification_queue_capacity: NotificationQueueCapacity::try_new(10_000)?,
            notification_timeout: NotificationTimeoutMs::try_new(60_000)?,
            ..Self::new()?
        })
    }

    /// Set the store timeout.
    #[must_use]
    pub const fn with_store_timeout(mut self, timeout: StoreTimeoutMs) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Set the retry settings.
    #[must_use]
    pub const fn with_retry(mut self, retry: ValidatedRetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the notification queue capacity.
    #[must_use]
    pub const fn with_notification_queue_capacity(
        mut self,
        capacity: NotificationQueueCapacity,
    ) -> Self {
        self.notification_queue_capacity = capacity;
        self
    }

    /// Set the dispatcher timeout.
    #[must_use]
    pub const fn with_notification_timeout(mut self, timeout: NotificationTimeoutMs) -> Self {
        self.notification_timeout = timeout;
        self
    }

    /// Set the default delivery lead time.
    #[must_use]
    pub const fn with_default_delivery_days(mut self, days: DefaultDeliveryDays) -> Self {
        self.default_delivery_days = days;
        self
    }

    /// Set the largest search page.
    #[must_use]
    pub const fn with_max_page_size(mut self, size: MaxPageSize) -> Self {
        self.max_page_size = size;
        self
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self::new().expect("Default tracking configuration should always be valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_are_enforced() {
        assert!(StoreTimeoutMs::try_new(99).is_err());
        assert!(StoreTimeoutMs::try_new(600_001).is_err());
        assert!(MaxRetryAttempts::try_new(0).is_err());
        assert!(MaxRetryAttempts::try_new(11).is_err());
        assert!(BackoffMultiplier::try_new(1.0).is_err());
        assert!(BackoffMultiplier::try_new(3.5).is_err());
        assert!(NotificationQueueCapacity::try_new(0).is_err());
        assert!(DefaultDeliveryDays::try_new(61).is_err());
        assert!(MaxPageSize::try_new(501).is_err());
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = TrackingConfig::default();
        assert_eq!(config.store_timeout.as_duration(), Duration::from_secs(5));
        assert_eq!(u32::from(config.retry.max_attempts), 3);
        assert_eq!(usize::from(config.notification_queue_capacity), 1_024);
        assert_eq!(u32::from(config.default_delivery_days), 5);
        assert_eq!(usize::from(config.max_page_size), 50);
    }

    #[test]
    fn presets_are_valid() {
        let fast = TrackingConfig::low_latency().unwrap();
        let safe = TrackingConfig::high_reliability().unwrap();
        assert!(fast.store_timeout < safe.store_timeout);
        assert!(fast.retry.max_attempts < safe.retry.max_attempts);
    }

    #[test]
    fn builders_replace_single_values() {
        let config =
            TrackingConfig::default().with_max_page_size(MaxPageSize::try_new(10).unwrap());
        assert_eq!(usize::from(config.max_page_size), 10);
        assert_eq!(config.store_timeout, TrackingConfig::default().store_timeout);
    }

    #[test]
    fn retry_config_converts_to_durations() {
        let retry = ValidatedRetryConfig::default().to_retry_config();
        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.base_delay, Duration::from_millis(20));
        assert_eq!(retry.max_delay, Duration::from_secs(1));
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = TrackingConfig::high_reliability().unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let back: TrackingConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
