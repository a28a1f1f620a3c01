//! The order aggregate and the snapshots it owns.
//!
//! Customer and item data are copied into the order at checkout. Later
//! catalog or directory changes never reach an existing order.

use serde::{Deserialize, Serialize};

use crate::errors::{TrackingError, TrackingResult};
use crate::status::{OrderStatus, TransitionKind};
use crate::timeline::{NewTimelineEvent, TimelineEvent};
use crate::types::{
    Actor, CustomerEmail, Money, Note, OrderId, OrderNumber, OrderVersion, ProductId, Quantity,
    Timestamp, TrackingCode,
};

/// Customer data as it was when the order was placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSnapshot {
    /// Full name
    pub name: String,
    /// Contact email; the key for order search
    pub email: CustomerEmail,
    /// Contact phone
    pub phone: Option<String>,
    /// Delivery city
    pub city: Option<String>,
    /// Delivery street address
    pub address: Option<String>,
}

/// One order line as it was when the order was placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Catalog product this line came from
    pub product_id: ProductId,
    /// Product name at checkout
    pub name: String,
    /// Unit price at checkout
    pub price: Money,
    /// Units ordered
    pub quantity: Quantity,
    /// Product image URL at checkout
    pub image: Option<String>,
}

impl OrderItem {
    /// Unit price times quantity.
    pub fn line_total(&self) -> TrackingResult<Money> {
        self.price.times(self.quantity).map_err(|e| {
            TrackingError::InvalidInput(format!("line total for {}: {e}", self.product_id))
        })
    }
}

/// Everything checkout hands over when an order is placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    /// Customer snapshot
    pub customer: CustomerSnapshot,
    /// Order lines; must not be empty
    pub items: Vec<OrderItem>,
    /// Delivery estimate known at checkout, if any
    pub estimated_delivery: Option<Timestamp>,
    /// Note for the initial timeline event
    pub note: Option<Note>,
    /// Who placed the order
    #[serde(default)]
    pub actor: Actor,
}

impl NewOrder {
    /// Sum of line totals and of quantities.
    pub fn totals(&self) -> TrackingResult<(Money, u32)> {
        if self.items.is_empty() {
            return Err(TrackingError::InvalidInput(
                "an order needs at least one item".to_string(),
            ));
        }
        self.items
            .iter()
            .try_fold((Money::zero(), 0u32), |(amount, count), item| {
                let amount = amount
                    .checked_add(item.line_total()?)
                    .map_err(|e| TrackingError::InvalidInput(e.to_string()))?;
                let quantity: u32 = item.quantity.into();
                let count = count
                    .checked_add(quantity)
                    .ok_or_else(|| TrackingError::InvalidInput("too many items".to_string()))?;
                Ok((amount, count))
            })
    }
}

/// An order with its tracking state.
///
/// `status`, `version`, `updated_at`, `estimated_delivery` and
/// `actual_delivery` are a projection of the timeline and only change
/// through [`Order::apply`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    order_number: OrderNumber,
    tracking_code: TrackingCode,
    status: OrderStatus,
    customer: CustomerSnapshot,
    items: Vec<OrderItem>,
    total_amount: Money,
    total_items: u32,
    estimated_delivery: Option<Timestamp>,
    actual_delivery: Option<Timestamp>,
    created_at: Timestamp,
    updated_at: Timestamp,
    version: OrderVersion,
}

impl Order {
    /// Builds a new order together with its initial `pending` event.
    pub fn open(
        id: OrderId,
        order_number: OrderNumber,
        tracking_code: TrackingCode,
        new_order: NewOrder,
        created_at: Timestamp,
    ) -> TrackingResult<(Self, TimelineEvent)> {
        let (total_amount, total_items) = new_order.totals()?;
        let pending =
            NewTimelineEvent::new(OrderStatus::Pending, TransitionKind::Created, created_at)
                .with_note(new_order.note)
                .with_actor(new_order.actor)
                .with_estimated_delivery(new_order.estimated_delivery);

        let mut order = Self {
            id,
            order_number,
            tracking_code,
            status: OrderStatus::Pending,
            customer: new_order.customer,
            items: new_order.items,
            total_amount,
            total_items,
            estimated_delivery: None,
            actual_delivery: None,
            created_at,
            updated_at: created_at,
            version: OrderVersion::initial(),
        };
        let event = TimelineEvent::stamp(pending, id, OrderVersion::initial().next(), None);
        order.apply(&event);
        Ok((order, event))
    }

    /// Folds a persisted event into the projection.
    ///
    /// `actual_delivery` is set the first time the order enters `delivered`
    /// and never changes afterwards.
    pub fn apply(&mut self, event: &TimelineEvent) {
        self.status = event.status;
        self.version = event.version;
        self.updated_at = event.timestamp;
        if let Some(estimate) = event.estimated_delivery {
            self.estimated_delivery = Some(estimate);
        }
        if event.status == OrderStatus::Delivered && self.actual_delivery.is_none() {
            self.actual_delivery = Some(event.timestamp);
        }
    }

    /// Internal order reference.
    pub const fn id(&self) -> OrderId {
        self.id
    }

    /// Customer-facing order number.
    pub const fn order_number(&self) -> &OrderNumber {
        &self.order_number
    }

    /// Shipment tracking code.
    pub const fn tracking_code(&self) -> &TrackingCode {
        &self.tracking_code
    }

    /// Current status.
    pub const fn status(&self) -> OrderStatus {
        self.status
    }

    /// Customer snapshot.
    pub const fn customer(&self) -> &CustomerSnapshot {
        &self.customer
    }

    /// Order lines.
    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    /// Sum of line totals.
    pub const fn total_amount(&self) -> Money {
        self.total_amount
    }

    /// Sum of quantities.
    pub const fn total_items(&self) -> u32 {
        self.total_items
    }

    /// Expected delivery time, once scheduled.
    pub const fn estimated_delivery(&self) -> Option<Timestamp> {
        self.estimated_delivery
    }

    /// Time the order entered `delivered`.
    pub const fn actual_delivery(&self) -> Option<Timestamp> {
        self.actual_delivery
    }

    /// When the order was placed.
    pub const fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Time of the latest timeline event.
    pub const fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// Number of timeline events recorded.
    pub const fn version(&self) -> OrderVersion {
        self.version
    }
}
