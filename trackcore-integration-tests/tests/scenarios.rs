//! End-to-end walkthroughs of the order lifecycle.

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as Span;
use trackcore::testing::prelude::*;
use trackcore::{
    DeliveryStatus, OrderStatus, PageRequest, StepState, Timestamp, TrackingError,
    TransitionRejection, UpdateStatus,
};
use trackcore_integration_tests::{memory_harness, Harness};
use trackcore_memory::InMemoryOrderStore;

fn days_from(start: Timestamp, days: i64) -> Timestamp {
    Timestamp::new(*start.as_datetime() + Span::days(days))
}

#[tokio::test]
async fn confirming_a_scheduled_order_reports_progress_and_days_remaining() {
    let harness = memory_harness();
    let estimate = days_from(harness.now(), 3);
    let opened = harness
        .service
        .open_order(NewOrderBuilder::new().estimated_delivery(estimate).build())
        .await
        .unwrap();
    assert_eq!(opened.status, OrderStatus::Pending);

    let updated = harness
        .service
        .update_status(UpdateStatus::new(opened.order_id, OrderStatus::Confirmed))
        .await
        .unwrap();

    assert_eq!(updated.order.status, OrderStatus::Confirmed);
    assert_eq!(updated.order.progress_percentage, 20);
    assert_eq!(updated.order.estimated_delivery, Some(estimate));
    assert_eq!(
        harness.service.classify(opened.order_id).await.unwrap(),
        DeliveryStatus::OnTrack { days_remaining: 3 }
    );
}

#[tokio::test]
async fn processing_past_the_estimate_is_delayed() {
    let harness = memory_harness();
    let estimate = days_from(harness.now(), -2);
    let opened = harness
        .service
        .open_order(NewOrderBuilder::new().estimated_delivery(estimate).build())
        .await
        .unwrap();
    for status in [OrderStatus::Confirmed, OrderStatus::Processing] {
        harness
            .service
            .update_status(UpdateStatus::new(opened.order_id, status))
            .await
            .unwrap();
    }

    let delivery = harness.service.classify(opened.order_id).await.unwrap();
    assert_eq!(delivery, DeliveryStatus::Delayed { days_late: 2 });
    assert!(delivery.is_urgent());
    assert!(harness.service.view(opened.order_id).await.unwrap().urgent);
}

#[tokio::test]
async fn delivering_records_the_actual_delivery_once() {
    let harness = memory_harness();
    let estimate = days_from(harness.now(), 4);
    let opened = harness
        .service
        .open_order(NewOrderBuilder::new().estimated_delivery(estimate).build())
        .await
        .unwrap();
    for status in [
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
    ] {
        harness.clock.advance(Span::hours(12));
        harness
            .service
            .update_status(UpdateStatus::new(opened.order_id, status))
            .await
            .unwrap();
    }

    harness.clock.advance(Span::hours(12));
    let delivered_at = harness.now();
    let updated = harness
        .service
        .update_status(UpdateStatus::new(opened.order_id, OrderStatus::Delivered))
        .await
        .unwrap();

    assert_eq!(updated.order.actual_delivery, Some(delivered_at));
    assert_eq!(updated.order.progress_percentage, 100);
    assert_eq!(
        harness.service.classify(opened.order_id).await.unwrap(),
        DeliveryStatus::Delivered { on_time: true }
    );

    // Delivered is terminal, so the recorded time can never move.
    harness.clock.advance(Span::days(10));
    let again = harness
        .service
        .update_status(UpdateStatus::new(opened.order_id, OrderStatus::Delivered))
        .await;
    assert!(matches!(
        again,
        Err(TrackingError::InvalidTransition {
            reason: TransitionRejection::NoChange,
            ..
        })
    ));
    let view = harness.service.view(opened.order_id).await.unwrap();
    assert_eq!(view.actual_delivery, Some(delivered_at));
    assert_eq!(view.delivery, DeliveryStatus::Delivered { on_time: true });
}

#[tokio::test]
async fn late_delivery_is_not_on_time() {
    let harness = memory_harness();
    let estimate = days_from(harness.now(), 1);
    let opened = harness
        .service
        .open_order(NewOrderBuilder::new().estimated_delivery(estimate).build())
        .await
        .unwrap();
    harness
        .service
        .update_status(UpdateStatus::new(opened.order_id, OrderStatus::Confirmed))
        .await
        .unwrap();

    harness.clock.advance(Span::days(3));
    harness
        .service
        .update_status(UpdateStatus::new(opened.order_id, OrderStatus::Delivered).with_override())
        .await
        .unwrap();

    assert_eq!(
        harness.service.classify(opened.order_id).await.unwrap(),
        DeliveryStatus::Delivered { on_time: false }
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_shipments_append_exactly_one_event() {
    let harness = Arc::new(memory_harness());
    let opened = harness
        .service
        .open_order(NewOrderBuilder::new().build())
        .await
        .unwrap();
    for status in [OrderStatus::Confirmed, OrderStatus::Processing] {
        harness
            .service
            .update_status(UpdateStatus::new(opened.order_id, status))
            .await
            .unwrap();
    }

    let racers = (0..2).map(|_| {
        let harness = Arc::clone(&harness);
        let order_id = opened.order_id;
        tokio::spawn(async move {
            harness
                .service
                .update_status(UpdateStatus::new(order_id, OrderStatus::Shipped))
                .await
        })
    });
    let results: Vec<_> = futures::future::join_all(racers)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for result in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(
            matches!(
                result,
                TrackingError::ConcurrentModification(_)
                    | TrackingError::InvalidTransition {
                        reason: TransitionRejection::NoChange,
                        ..
                    }
            ),
            "unexpected error: {result:?}"
        );
    }

    let timeline = harness.service.timeline(opened.order_id).await.unwrap();
    let shipped = timeline_statuses(&timeline)
        .into_iter()
        .filter(|status| *status == OrderStatus::Shipped)
        .count();
    assert_eq!(shipped, 1);
}

#[tokio::test]
async fn email_search_only_matches_the_snapshot_taken_at_checkout() {
    let harness = memory_harness();
    let placed = harness
        .service
        .open_order(NewOrderBuilder::new().customer_email("x@example.com").build())
        .await
        .unwrap();
    // The customer later uses another address; the first order keeps its snapshot.
    harness.clock.advance(Span::days(30));
    let later = harness
        .service
        .open_order(NewOrderBuilder::new().customer_email("x.new@example.com").build())
        .await
        .unwrap();

    let found = harness
        .service
        .search_by_email("x@example.com", None, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(found.total, 1);
    assert_eq!(found.items[0].order_id, placed.order_id);

    let found = harness
        .service
        .search_by_email("x.new@example.com", None, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(found.items.len(), 1);
    assert_eq!(found.items[0].order_id, later.order_id);
}

#[tokio::test]
async fn cancelled_orders_show_only_what_happened() {
    let harness = memory_harness();
    let opened = harness
        .service
        .open_order(NewOrderBuilder::new().build())
        .await
        .unwrap();
    harness
        .service
        .update_status(UpdateStatus::new(opened.order_id, OrderStatus::Confirmed))
        .await
        .unwrap();
    let cancelled = harness
        .service
        .update_status(UpdateStatus::new(opened.order_id, OrderStatus::Cancelled))
        .await
        .unwrap();

    assert_eq!(cancelled.order.progress_percentage, 0);
    assert_eq!(cancelled.order.delivery, DeliveryStatus::Cancelled);

    let steps = harness
        .service
        .build_timeline_view(opened.order_id)
        .await
        .unwrap();
    let statuses: Vec<_> = steps.iter().map(|step| step.status).collect();
    assert_eq!(
        statuses,
        vec![
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Cancelled
        ]
    );
    assert_eq!(steps.last().map(|step| step.state), Some(StepState::Current));

    let refused = harness
        .service
        .update_status(UpdateStatus::new(opened.order_id, OrderStatus::Processing))
        .await;
    assert!(matches!(
        refused,
        Err(TrackingError::InvalidTransition {
            reason: TransitionRejection::TerminalState,
            ..
        })
    ));
}

#[tokio::test]
async fn notifications_follow_every_accepted_change() {
    let harness: Harness<InMemoryOrderStore> = memory_harness();
    let opened = harness
        .service
        .open_order(NewOrderBuilder::new().build())
        .await
        .unwrap();
    for status in [OrderStatus::Confirmed, OrderStatus::Processing] {
        harness
            .service
            .update_status(UpdateStatus::new(opened.order_id, status))
            .await
            .unwrap();
    }
    let _ = harness
        .service
        .update_status(UpdateStatus::new(opened.order_id, OrderStatus::Pending))
        .await;

    let messages = harness
        .dispatcher
        .wait_for(2, Duration::from_secs(5))
        .await;
    let changes: Vec<_> = messages
        .iter()
        .map(|m| (m.previous_status, m.new_status))
        .collect();
    assert_eq!(
        changes,
        vec![
            (OrderStatus::Pending, OrderStatus::Confirmed),
            (OrderStatus::Confirmed, OrderStatus::Processing),
        ]
    );
    assert!(messages
        .iter()
        .all(|m| m.order_number == opened.order_number && !m.correction));

    let stats = harness.service.shutdown().await;
    assert_eq!(stats.delivered, 2);
    assert_eq!(stats.dropped, 0);
}
