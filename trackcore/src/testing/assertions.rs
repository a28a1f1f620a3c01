//! Assertions for timeline invariants.

use crate::order::Order;
use crate::status::OrderStatus;
use crate::timeline::Timeline;

/// Asserts that `timeline` is well formed and agrees with `order`.
///
/// # Panics
/// Panics with a description of the first violated rule.
pub fn assert_timeline_consistent(order: &Order, timeline: &Timeline) {
    assert!(
        timeline.is_well_formed(),
        "timeline is not well formed: {:#?}",
        timeline.events()
    );
    let first = timeline
        .events()
        .first()
        .expect("timeline has at least the creation event");
    assert_eq!(first.status, OrderStatus::Pending, "first event must be pending");

    let latest = timeline.latest().expect("timeline is not empty");
    assert_eq!(
        latest.status,
        order.status(),
        "latest event status must equal the order status"
    );
    assert_eq!(
        latest.version,
        order.version(),
        "order version must equal the number of events"
    );
    assert_eq!(
        order.actual_delivery().is_some(),
        order.status() == OrderStatus::Delivered,
        "actual delivery is set exactly when delivered"
    );
}

/// Statuses of the timeline, oldest first.
pub fn timeline_statuses(timeline: &Timeline) -> Vec<OrderStatus> {
    timeline.events().iter().map(|event| event.status).collect()
}
