//! Persistence ports for orders and their timelines.
//!
//! The traits here are the only way the tracking core touches storage.
//! Implementations must make [`TimelineStore::append`] atomic: the event is
//! added and the order projection updated together, or neither happens.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::StoreResult;
use crate::order::Order;
use crate::timeline::{NewTimelineEvent, TimelineEvent};
use crate::types::{CustomerEmail, OrderId, OrderNumber, OrderVersion, TrackingCode};

/// Result of a successful write: the order as it is now and the event that
/// was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredOrder {
    /// The order after the write
    pub order: Order,
    /// The event that was written
    pub event: TimelineEvent,
}

/// Offset-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Number of results to skip
    #[serde(default)]
    pub offset: usize,
    /// Maximum number of results
    #[serde(default = "PageRequest::default_limit")]
    pub limit: usize,
}

impl PageRequest {
    const fn default_limit() -> usize {
        20
    }

    /// First page with the given size.
    pub const fn first(limit: usize) -> Self {
        Self { offset: 0, limit }
    }

    /// Clamps the limit into `1..=max`.
    #[must_use]
    pub fn clamped(self, max: usize) -> Self {
        Self {
            offset: self.offset,
            limit: self.limit.clamp(1, max.max(1)),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first(Self::default_limit())
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Results on this page
    pub items: Vec<T>,
    /// Total number of matches
    pub total: usize,
    /// Offset of the next page, if there is one
    pub next_offset: Option<usize>,
}

impl<T> Page<T> {
    /// Cuts one page out of the full, already ordered result list.
    pub fn slice(all: Vec<T>, request: PageRequest) -> Self {
        let total = all.len();
        let items: Vec<T> = all
            .into_iter()
            .skip(request.offset)
            .take(request.limit)
            .collect();
        let end = request.offset.saturating_add(items.len());
        let next_offset = (end < total).then_some(end);
        Self {
            items,
            total,
            next_offset,
        }
    }

    /// Maps the items, keeping the paging information.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            next_offset: self.next_offset,
        }
    }
}

/// Append-only storage of timeline events.
#[async_trait]
pub trait TimelineStore: Send + Sync {
    /// Appends an event and folds it into the order, atomically.
    ///
    /// The write only happens if the order is still at `expected`, the
    /// version the caller read before deciding on the event.
    ///
    /// # Errors
    /// * `StoreError::OrderNotFound` - If the order does not exist
    /// * `StoreError::VersionConflict` - If the order is not at `expected`
    /// * `StoreError::DuplicateEvent` - If the event id is already in the timeline
    async fn append(
        &self,
        order_id: OrderId,
        expected: OrderVersion,
        event: NewTimelineEvent,
    ) -> StoreResult<StoredOrder>;

    /// All events of an order, oldest first.
    ///
    /// # Errors
    /// Returns `StoreError::OrderNotFound` if the order does not exist.
    async fn list_for(&self, order_id: OrderId) -> StoreResult<Vec<TimelineEvent>>;
}

/// Storage of orders, their identifiers and their timelines.
#[async_trait]
pub trait OrderStore: TimelineStore {
    /// Stores a new order together with its initial timeline event.
    ///
    /// # Errors
    /// * `StoreError::DuplicateOrderNumber` - If the order number is taken
    /// * `StoreError::DuplicateTrackingCode` - If the tracking code is taken
    async fn create(&self, order: Order, initial: TimelineEvent) -> StoreResult<StoredOrder>;

    /// Loads an order by its internal id.
    async fn load(&self, order_id: OrderId) -> StoreResult<Option<Order>>;

    /// Looks an order up by order number.
    async fn find_by_order_number(&self, number: &OrderNumber) -> StoreResult<Option<Order>>;

    /// Looks an order up by tracking code.
    async fn find_by_tracking_code(&self, code: &TrackingCode) -> StoreResult<Option<Order>>;

    /// All orders whose customer snapshot carries exactly this email,
    /// newest first.
    async fn find_by_email(&self, email: &CustomerEmail) -> StoreResult<Vec<Order>>;
}
