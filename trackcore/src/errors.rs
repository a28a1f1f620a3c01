//! Error types for order tracking.
//!
//! Failures are split by layer, the same way reads and writes are split:
//!
//! - **TrackingError**: what callers of [`crate::TrackingService`] see
//! - **StoreError**: persistence faults raised by an [`crate::OrderStore`]
//! - **NotificationError**: delivery faults raised behind the notification
//!   queue. These never cross into `TrackingError`: a status change that was
//!   persisted stays persisted even when nobody could be told about it.
//!
//! # Example Usage
//!
//! ```rust,ignore
//! match service.update_status(request).await {
//!     Ok(view) => render(view),
//!     Err(TrackingError::InvalidTransition { reason, .. }) => reject(reason),
//!     Err(err) if err.retry_guidance() == RetryGuidance::SafeToRetry => retry(),
//!     Err(err) => return Err(err),
//! }
//! ```

use std::time::Duration;

use thiserror::Error;

use crate::status::{OrderStatus, TransitionRejection};
use crate::types::{EventId, OrderId, OrderNumber, OrderVersion, TrackingCode};

/// Errors returned by tracking operations.
///
/// # Error Handling Strategy
///
/// - **NotFound**: the identifier matched nothing; show a "no such order" page
/// - **InvalidTransition**: tell the operator why; nothing was written
/// - **ConcurrentModification**: another writer won; reload and try again
/// - **PersistenceUnavailable**: the store did not answer in time; retry a
///   write only with the same idempotency key
/// - **InvalidInput**: reject the request
/// - **Store**: log and investigate
#[derive(Debug, Clone, Error)]
pub enum TrackingError {
    /// No order matched the given identifier.
    #[error("Order not found: {0}")]
    NotFound(String),

    /// The requested status change is not allowed.
    #[error("Invalid transition from {from} to {to}: {reason}")]
    InvalidTransition {
        /// Status the order is in
        from: OrderStatus,
        /// Status that was requested
        to: OrderStatus,
        /// Why the change was refused
        reason: TransitionRejection,
    },

    /// Another writer changed the order and retries ran out.
    #[error("Order {0} was modified concurrently")]
    ConcurrentModification(OrderId),

    /// The store timed out or is unreachable.
    #[error("Persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    /// The request was malformed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A store fault that retrying will not fix.
    #[error("Store error: {0}")]
    Store(StoreError),
}

/// What a caller should do after a failed tracking operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryGuidance {
    /// Repeating the same request is safe.
    SafeToRetry,
    /// The write may have landed; repeat only with the same idempotency key.
    RetryWithIdempotencyKey,
    /// Repeating will fail the same way.
    DoNotRetry,
}

impl TrackingError {
    /// Classifies the error for callers deciding whether to retry.
    pub const fn retry_guidance(&self) -> RetryGuidance {
        match self {
            Self::ConcurrentModification(_) => RetryGuidance::SafeToRetry,
            Self::PersistenceUnavailable(_) => RetryGuidance::RetryWithIdempotencyKey,
            Self::NotFound(_)
            | Self::InvalidTransition { .. }
            | Self::InvalidInput(_)
            | Self::Store(_) => RetryGuidance::DoNotRetry,
        }
    }
}

/// Errors raised by an order store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The order does not exist.
    #[error("Order '{0}' not found")]
    OrderNotFound(OrderId),

    /// Compare-and-set failed: the order moved on since it was read.
    #[error("Version conflict on order '{order_id}': expected {expected}, but current is {current}")]
    VersionConflict {
        /// The order with the version conflict
        order_id: OrderId,
        /// The version that was expected
        expected: OrderVersion,
        /// The actual current version
        current: OrderVersion,
    },

    /// A timeline event with this id was already appended.
    #[error("Duplicate event ID: {0}")]
    DuplicateEvent(EventId),

    /// Another order already uses this order number.
    #[error("Duplicate order number: {0}")]
    DuplicateOrderNumber(OrderNumber),

    /// Another order already uses this tracking code.
    #[error("Duplicate tracking code: {0}")]
    DuplicateTrackingCode(TrackingCode),

    /// The operation did not complete in time.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// The store is temporarily unavailable.
    #[error("Order store unavailable: {0}")]
    Unavailable(String),

    /// An unexpected internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Whether the same call could succeed if repeated later.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Unavailable(_))
    }
}

/// Errors raised while delivering a status-change notification.
#[derive(Debug, Clone, Error)]
pub enum NotificationError {
    /// The dispatcher rejected or failed the message.
    #[error("Notification delivery failed: {0}")]
    DeliveryFailed(String),

    /// The queue was at capacity; the message was dropped.
    #[error("Notification queue is full")]
    QueueFull,

    /// The worker has shut down.
    #[error("Notification queue is closed")]
    QueueClosed,

    /// The dispatcher did not answer in time.
    #[error("Notification delivery timed out after {0:?}")]
    Timeout(Duration),
}

/// Type alias for tracking results.
pub type TrackingResult<T> = Result<T, TrackingError>;

/// Type alias for store results.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for TrackingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::OrderNotFound(order_id) => Self::NotFound(order_id.to_string()),
            StoreError::VersionConflict { order_id, .. } => Self::ConcurrentModification(order_id),
            StoreError::Timeout(duration) => {
                Self::PersistenceUnavailable(format!("store call timed out after {duration:?}"))
            }
            StoreError::Unavailable(msg) => Self::PersistenceUnavailable(msg),
            other => Self::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracking_error_messages_are_descriptive() {
        let err = TrackingError::InvalidTransition {
            from: OrderStatus::Delivered,
            to: OrderStatus::Shipped,
            reason: TransitionRejection::TerminalState,
        };
        insta::assert_snapshot!(
            err.to_string(),
            @"Invalid transition from delivered to shipped: current status is terminal"
        );

        let err = TrackingError::NotFound("TRK-1-AAAAAA".to_string());
        assert_eq!(err.to_string(), "Order not found: TRK-1-AAAAAA");
    }

    #[test]
    fn store_error_messages_are_descriptive() {
        let order_id = OrderId::new();
        let err = StoreError::VersionConflict {
            order_id,
            expected: OrderVersion::try_new(2).unwrap(),
            current: OrderVersion::try_new(3).unwrap(),
        };
        assert_eq!(
            err.to_string(),
            format!("Version conflict on order '{order_id}': expected 2, but current is 3")
        );
    }

    #[test]
    fn version_conflict_becomes_concurrent_modification() {
        let order_id = OrderId::new();
        let err: TrackingError = StoreError::VersionConflict {
            order_id,
            expected: OrderVersion::initial(),
            current: OrderVersion::initial().next(),
        }
        .into();

        match err {
            TrackingError::ConcurrentModification(id) => assert_eq!(id, order_id),
            other => panic!("Expected ConcurrentModification, got {other:?}"),
        }
    }

    #[test]
    fn timeouts_and_outages_become_persistence_unavailable() {
        let err: TrackingError = StoreError::Timeout(Duration::from_millis(250)).into();
        assert!(matches!(err, TrackingError::PersistenceUnavailable(_)));

        let err: TrackingError = StoreError::Unavailable("db down".to_string()).into();
        assert!(matches!(err, TrackingError::PersistenceUnavailable(msg) if msg == "db down"));
    }

    #[test]
    fn missing_order_becomes_not_found() {
        let order_id = OrderId::new();
        let err: TrackingError = StoreError::OrderNotFound(order_id).into();
        assert!(matches!(err, TrackingError::NotFound(id) if id == order_id.to_string()));
    }

    #[test]
    fn other_store_faults_are_wrapped() {
        let err: TrackingError = StoreError::Internal("corrupt index".to_string()).into();
        assert!(matches!(err, TrackingError::Store(StoreError::Internal(_))));
    }

    #[test]
    fn retry_guidance_follows_error_kind() {
        assert_eq!(
            TrackingError::ConcurrentModification(OrderId::new()).retry_guidance(),
            RetryGuidance::SafeToRetry
        );
        assert_eq!(
            TrackingError::PersistenceUnavailable("slow".to_string()).retry_guidance(),
            RetryGuidance::RetryWithIdempotencyKey
        );
        assert_eq!(
            TrackingError::InvalidInput("bad".to_string()).retry_guidance(),
            RetryGuidance::DoNotRetry
        );
    }

    #[test]
    fn only_timeouts_and_outages_are_transient() {
        assert!(StoreError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(StoreError::Unavailable("x".to_string()).is_transient());
        assert!(!StoreError::DuplicateEvent(EventId::new()).is_transient());
    }
}
