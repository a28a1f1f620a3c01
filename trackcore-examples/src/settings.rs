//! Configuration overrides from environment variables.
//!
//! Every variable is optional; unset ones keep [`TrackingConfig::default`].
//!
//! | Variable | Setting |
//! |---|---|
//! | `TRACKCORE_STORE_TIMEOUT_MS` | store call timeout |
//! | `TRACKCORE_MAX_RETRY_ATTEMPTS` | attempts per conflicting write |
//! | `TRACKCORE_NOTIFICATION_QUEUE_CAPACITY` | notification queue depth |
//! | `TRACKCORE_NOTIFICATION_TIMEOUT_MS` | single dispatch timeout |
//! | `TRACKCORE_DEFAULT_DELIVERY_DAYS` | lead time scheduled on confirmation |
//! | `TRACKCORE_MAX_PAGE_SIZE` | largest email search page |

use std::str::FromStr;

use anyhow::{Context, Result};
use trackcore::config::{
    DefaultDeliveryDays, MaxPageSize, MaxRetryAttempts, NotificationQueueCapacity,
    NotificationTimeoutMs, StoreTimeoutMs, ValidatedRetryConfig,
};
use trackcore::TrackingConfig;

/// Reads overrides from the process environment.
///
/// # Errors
///
/// Fails when a variable is set but does not parse or is out of range.
pub fn config_from_env() -> Result<TrackingConfig> {
    config_from(|name| std::env::var(name).ok())
}

/// Reads overrides through `lookup`, which maps a variable name to its value.
///
/// # Errors
///
/// Fails when a variable is set but does not parse or is out of range.
pub fn config_from(lookup: impl Fn(&str) -> Option<String>) -> Result<TrackingConfig> {
    let mut config = TrackingConfig::default();

    if let Some(ms) = read::<u64>(&lookup, "TRACKCORE_STORE_TIMEOUT_MS")? {
        config = config.with_store_timeout(
            StoreTimeoutMs::try_new(ms).context("TRACKCORE_STORE_TIMEOUT_MS")?,
        );
    }
    if let Some(attempts) = read::<u32>(&lookup, "TRACKCORE_MAX_RETRY_ATTEMPTS")? {
        config = config.with_retry(ValidatedRetryConfig {
            max_attempts: MaxRetryAttempts::try_new(attempts)
                .context("TRACKCORE_MAX_RETRY_ATTEMPTS")?,
            ..config.retry
        });
    }
    if let Some(capacity) = read::<usize>(&lookup, "TRACKCORE_NOTIFICATION_QUEUE_CAPACITY")? {
        config = config.with_notification_queue_capacity(
            NotificationQueueCapacity::try_new(capacity)
                .context("TRACKCORE_NOTIFICATION_QUEUE_CAPACITY")?,
        );
    }
    if let Some(ms) = read::<u64>(&lookup, "TRACKCORE_NOTIFICATION_TIMEOUT_MS")? {
        config = config.with_notification_timeout(
            NotificationTimeoutMs::try_new(ms).context("TRACKCORE_NOTIFICATION_TIMEOUT_MS")?,
        );
    }
    if let Some(days) = read::<u32>(&lookup, "TRACKCORE_DEFAULT_DELIVERY_DAYS")? {
        config = config.with_default_delivery_days(
            DefaultDeliveryDays::try_new(days).context("TRACKCORE_DEFAULT_DELIVERY_DAYS")?,
        );
    }
    if let Some(size) = read::<usize>(&lookup, "TRACKCORE_MAX_PAGE_SIZE")? {
        config = config
            .with_max_page_size(MaxPageSize::try_new(size).context("TRACKCORE_MAX_PAGE_SIZE")?);
    }

    Ok(config)
}

fn read<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(name)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("{name} must be a number, got {raw:?}"))
        })
        .transpose()
}
