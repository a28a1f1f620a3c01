//! In-memory adapter for `TrackCore`
//!
//! This crate provides an in-memory implementation of the `OrderStore` trait
//! from the trackcore crate, useful for testing and development scenarios
//! where persistence is not required.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::significant_drop_tightening)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::debug;
use trackcore::errors::{StoreError, StoreResult};
use trackcore::order::Order;
use trackcore::store::{OrderStore, StoredOrder, TimelineStore};
use trackcore::timeline::{NewTimelineEvent, TimelineEvent};
use trackcore::types::{CustomerEmail, EventId, OrderId, OrderNumber, OrderVersion, TrackingCode};

#[derive(Default)]
struct State {
    orders: HashMap<OrderId, Order>,
    timelines: HashMap<OrderId, Vec<TimelineEvent>>,
    by_number: HashMap<OrderNumber, OrderId>,
    by_tracking: HashMap<TrackingCode, OrderId>,
    by_email: HashMap<CustomerEmail, Vec<OrderId>>,
    event_ids: HashSet<EventId>,
}

/// Thread-safe in-memory order store.
///
/// One lock guards orders, timelines and indexes together, so every write
/// is atomic and readers never see an event without its projection.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryOrderStore {
    /// Create a new empty in-memory order store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored orders.
    pub fn len(&self) -> usize {
        self.state.read().expect("RwLock poisoned").orders.len()
    }

    /// Whether no order is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for InMemoryOrderStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryOrderStore")
            .field("orders", &self.len())
            .finish()
    }
}

#[async_trait]
impl TimelineStore for InMemoryOrderStore {
    async fn append(
        &self,
        order_id: OrderId,
        expected: OrderVersion,
        event: NewTimelineEvent,
    ) -> StoreResult<StoredOrder> {
        let mut state = self.state.write().expect("RwLock poisoned");
        let State {
            orders,
            timelines,
            event_ids,
            ..
        } = &mut *state;

        let order = orders
            .get_mut(&order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;

        // Checked before the version so a replayed write can be recognised
        // even after the order moved on.
        if event_ids.contains(&event.event_id) {
            return Err(StoreError::DuplicateEvent(event.event_id));
        }

        let current = order.version();
        if expected != current {
            return Err(StoreError::VersionConflict {
                order_id,
                expected,
                current,
            });
        }

        let stamped = TimelineEvent::stamp(event, order_id, current.next(), Some(order.status()));
        order.apply(&stamped);
        timelines.entry(order_id).or_default().push(stamped.clone());
        event_ids.insert(stamped.event_id);

        debug!(
            %order_id,
            version = %stamped.version,
            status = %stamped.status,
            "Appended timeline event"
        );
        Ok(StoredOrder {
            order: order.clone(),
            event: stamped,
        })
    }

    async fn list_for(&self, order_id: OrderId) -> StoreResult<Vec<TimelineEvent>> {
        let state = self.state.read().expect("RwLock poisoned");
        if !state.orders.contains_key(&order_id) {
            return Err(StoreError::OrderNotFound(order_id));
        }
        let mut events = state.timelines.get(&order_id).cloned().unwrap_or_default();
        events.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.version.cmp(&b.version))
        });
        Ok(events)
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(&self, order: Order, initial: TimelineEvent) -> StoreResult<StoredOrder> {
        let mut state = self.state.write().expect("RwLock poisoned");

        if state.by_number.contains_key(order.order_number()) {
            return Err(StoreError::DuplicateOrderNumber(order.order_number().clone()));
        }
        if state.by_tracking.contains_key(order.tracking_code()) {
            return Err(StoreError::DuplicateTrackingCode(order.tracking_code().clone()));
        }
        if state.orders.contains_key(&order.id()) {
            return Err(StoreError::Internal(format!("order {} already exists", order.id())));
        }
        if state.event_ids.contains(&initial.event_id) {
            return Err(StoreError::DuplicateEvent(initial.event_id));
        }
        if initial.order_id != order.id()
            || initial.version != OrderVersion::initial().next()
            || initial.status != order.status()
        {
            return Err(StoreError::Internal(
                "initial event does not belong to the order".to_string(),
            ));
        }

        let order_id = order.id();
        state.by_number.insert(order.order_number().clone(), order_id);
        state.by_tracking.insert(order.tracking_code().clone(), order_id);
        state
            .by_email
            .entry(order.customer().email.clone())
            .or_default()
            .push(order_id);
        state.event_ids.insert(initial.event_id);
        state.timelines.insert(order_id, vec![initial.clone()]);
        state.orders.insert(order_id, order.clone());

        debug!(%order_id, order_number = %order.order_number(), "Created order");
        Ok(StoredOrder {
            order,
            event: initial,
        })
    }

    async fn load(&self, order_id: OrderId) -> StoreResult<Option<Order>> {
        let state = self.state.read().expect("RwLock poisoned");
        Ok(state.orders.get(&order_id).cloned())
    }

    async fn find_by_order_number(&self, number: &OrderNumber) -> StoreResult<Option<Order>> {
        let state = self.state.read().expect("RwLock poisoned");
        Ok(state
            .by_number
            .get(number)
            .and_then(|id| state.orders.get(id))
            .cloned())
    }

    async fn find_by_tracking_code(&self, code: &TrackingCode) -> StoreResult<Option<Order>> {
        let state = self.state.read().expect("RwLock poisoned");
        Ok(state
            .by_tracking
            .get(code)
            .and_then(|id| state.orders.get(id))
            .cloned())
    }

    async fn find_by_email(&self, email: &CustomerEmail) -> StoreResult<Vec<Order>> {
        let state = self.state.read().expect("RwLock poisoned");
        let mut orders: Vec<Order> = state
            .by_email
            .get(email)
            .into_iter()
            .flatten()
            .filter_map(|id| state.orders.get(id))
            .cloned()
            .collect();
        orders.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().cmp(&a.id()))
        });
        Ok(orders)
    }
}
