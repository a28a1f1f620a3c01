//! Read models handed to callers.
//!
//! Views are computed from an order and its timeline on every read and are
//! never stored.

use serde::{Deserialize, Serialize};

use crate::delivery::{classify, progress_percentage, DeliveryStatus};
use crate::notification::NotificationOutcome;
use crate::order::{CustomerSnapshot, Order, OrderItem};
use crate::status::OrderStatus;
use crate::timeline::{Timeline, TimelineEvent};
use crate::types::{Location, Money, Note, OrderId, OrderNumber, Timestamp, TrackingCode};

const DISPLAY_TIME_FORMAT: &str = "%b %-d, %Y %H:%M UTC";

/// Position of a step relative to the order's current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    /// Already passed.
    Completed,
    /// The order's current status.
    Current,
    /// Not reached yet.
    Pending,
}

/// One row of the timeline display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineStep {
    /// Status this step stands for
    pub status: OrderStatus,
    /// Display label
    pub label: String,
    /// Display color token
    pub color: String,
    /// Completed, current or pending
    pub state: StepState,
    /// When the order entered this status
    pub timestamp: Option<Timestamp>,
    /// `timestamp` formatted for display
    pub formatted_time: Option<String>,
    /// Note recorded with the change
    pub note: Option<Note>,
    /// Location recorded with the change
    pub location: Option<Location>,
    /// The change into this status was an administrative correction
    pub correction: bool,
    /// The order passed this status without it ever being recorded
    pub skipped: bool,
}

impl TimelineStep {
    fn new(status: OrderStatus, state: StepState, event: Option<&TimelineEvent>) -> Self {
        Self {
            status,
            label: status.label().to_string(),
            color: status.color().to_string(),
            state,
            timestamp: event.map(|e| e.timestamp),
            formatted_time: event.map(|e| {
                e.timestamp
                    .as_datetime()
                    .format(DISPLAY_TIME_FORMAT)
                    .to_string()
            }),
            note: event.and_then(|e| e.note.clone()),
            location: event.and_then(|e| e.location.clone()),
            correction: event.is_some_and(TimelineEvent::is_correction),
            skipped: state == StepState::Completed && event.is_none(),
        }
    }
}

/// Builds the step list for an order.
///
/// A live or delivered order shows the whole happy path. A cancelled order
/// shows the statuses it actually occupied followed by the cancellation.
pub fn timeline_steps(order: &Order, timeline: &Timeline) -> Vec<TimelineStep> {
    let current = order.status();
    match current.rank() {
        Some(current_rank) => OrderStatus::HAPPY_PATH
            .iter()
            .enumerate()
            .map(|(rank, &status)| {
                let state = match rank.cmp(&current_rank) {
                    std::cmp::Ordering::Less => StepState::Completed,
                    std::cmp::Ordering::Equal => StepState::Current,
                    std::cmp::Ordering::Greater => StepState::Pending,
                };
                TimelineStep::new(status, state, timeline.entered(status))
            })
            .collect(),
        None => timeline
            .events()
            .iter()
            .map(|event| {
                let state = if event.status == current {
                    StepState::Current
                } else {
                    StepState::Completed
                };
                TimelineStep::new(event.status, state, Some(event))
            })
            .collect(),
    }
}

/// Everything a tracking page shows about one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderView {
    /// Internal order reference
    pub order_id: OrderId,
    /// Customer-facing order number
    pub order_number: OrderNumber,
    /// Shipment tracking code
    pub tracking_code: TrackingCode,
    /// Current status
    pub status: OrderStatus,
    /// Display label of the current status
    pub status_label: String,
    /// Display color of the current status
    pub status_color: String,
    /// Fixed progress weight of the current status
    pub progress_percentage: u8,
    /// Delivery classification at read time
    pub delivery: DeliveryStatus,
    /// Whether the order needs attention
    pub urgent: bool,
    /// Expected delivery
    pub estimated_delivery: Option<Timestamp>,
    /// Actual delivery
    pub actual_delivery: Option<Timestamp>,
    /// When the order was placed
    pub created_at: Timestamp,
    /// Customer snapshot
    pub customer: CustomerSnapshot,
    /// Order lines
    pub items: Vec<OrderItem>,
    /// Sum of line totals
    pub total_amount: Money,
    /// Sum of quantities
    pub total_items: u32,
    /// Timeline display
    pub timeline: Vec<TimelineStep>,
}

impl OrderView {
    /// Builds the view as of `now`.
    pub fn build(order: &Order, timeline: &Timeline, now: Timestamp) -> Self {
        let delivery = classify(
            order.status(),
            order.estimated_delivery(),
            order.actual_delivery(),
            now,
        );
        Self {
            order_id: order.id(),
            order_number: order.order_number().clone(),
            tracking_code: order.tracking_code().clone(),
            status: order.status(),
            status_label: order.status().label().to_string(),
            status_color: order.status().color().to_string(),
            progress_percentage: progress_percentage(order.status()),
            delivery,
            urgent: delivery.is_urgent(),
            estimated_delivery: order.estimated_delivery(),
            actual_delivery: order.actual_delivery(),
            created_at: order.created_at(),
            customer: order.customer().clone(),
            items: order.items().to_vec(),
            total_amount: order.total_amount(),
            total_items: order.total_items(),
            timeline: timeline_steps(order, timeline),
        }
    }
}

/// Compact row of an email search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    /// Internal order reference
    pub order_id: OrderId,
    /// Customer-facing order number
    pub order_number: OrderNumber,
    /// Shipment tracking code
    pub tracking_code: TrackingCode,
    /// Current status
    pub status: OrderStatus,
    /// Display label of the current status
    pub status_label: String,
    /// Fixed progress weight of the current status
    pub progress_percentage: u8,
    /// Delivery classification at read time
    pub delivery: DeliveryStatus,
    /// Whether the order needs attention
    pub urgent: bool,
    /// Sum of line totals
    pub total_amount: Money,
    /// Sum of quantities
    pub total_items: u32,
    /// When the order was placed
    pub created_at: Timestamp,
}

impl OrderSummary {
    /// Summarises an order as of `now`.
    pub fn from_order(order: &Order, now: Timestamp) -> Self {
        let delivery = classify(
            order.status(),
            order.estimated_delivery(),
            order.actual_delivery(),
            now,
        );
        Self {
            order_id: order.id(),
            order_number: order.order_number().clone(),
            tracking_code: order.tracking_code().clone(),
            status: order.status(),
            status_label: order.status().label().to_string(),
            progress_percentage: progress_percentage(order.status()),
            delivery,
            urgent: delivery.is_urgent(),
            total_amount: order.total_amount(),
            total_items: order.total_items(),
            created_at: order.created_at(),
        }
    }
}

/// Result of a successful status update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatedView {
    /// The order after the change
    pub order: OrderView,
    /// The event that recorded the change
    pub event: TimelineEvent,
    /// Whether the status-change notification was queued
    pub notification: NotificationOutcome,
}
