//! Delivery classification and progress.
//!
//! Everything here is a pure function of its inputs. Callers pass "now"
//! explicitly, so the same inputs always give the same answer.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::status::OrderStatus;
use crate::types::Timestamp;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Where an order stands relative to its delivery estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Received. `on_time` is true when it arrived no later than estimated,
    /// or when no estimate was ever set.
    Delivered {
        /// Whether delivery met the estimate
        on_time: bool,
    },
    /// Abandoned before delivery.
    Cancelled,
    /// Past the estimate and still undelivered.
    Delayed {
        /// Whole days past the estimate, rounded up, at least 1
        days_late: u32,
    },
    /// Due within a day.
    ArrivingSoon,
    /// Due later than a day from now.
    OnTrack {
        /// Whole days left, rounded up
        days_remaining: u32,
    },
    /// No estimate has been set yet.
    Unscheduled,
}

impl DeliveryStatus {
    /// Whether the order needs attention: late, or about to arrive.
    pub const fn is_urgent(&self) -> bool {
        matches!(self, Self::Delayed { .. } | Self::ArrivingSoon)
    }
}

/// Classifies an order's delivery situation at `now`.
///
/// A recorded delivery always wins over the status, and cancellation wins
/// over the estimate.
pub fn classify(
    status: OrderStatus,
    estimated: Option<Timestamp>,
    actual: Option<Timestamp>,
    now: Timestamp,
) -> DeliveryStatus {
    if let Some(actual) = actual {
        let on_time = estimated.map_or(true, |estimate| actual <= estimate);
        return DeliveryStatus::Delivered { on_time };
    }
    if status == OrderStatus::Cancelled {
        return DeliveryStatus::Cancelled;
    }
    let Some(estimate) = estimated else {
        return DeliveryStatus::Unscheduled;
    };

    let remaining = estimate.as_datetime().signed_duration_since(*now.as_datetime());
    if remaining < Duration::zero() {
        DeliveryStatus::Delayed {
            days_late: ceil_days(-remaining).max(1),
        }
    } else if remaining <= Duration::days(1) {
        DeliveryStatus::ArrivingSoon
    } else {
        DeliveryStatus::OnTrack {
            days_remaining: ceil_days(remaining),
        }
    }
}

/// Fixed progress weight of a status, in percent.
pub const fn progress_percentage(status: OrderStatus) -> u8 {
    status.weight()
}

/// Delivery estimate assigned when an order is confirmed without one.
pub fn estimate_from(confirmed_at: Timestamp, lead_days: u32) -> Timestamp {
    Timestamp::new(*confirmed_at.as_datetime() + Duration::days(i64::from(lead_days)))
}

fn ceil_days(span: Duration) -> u32 {
    let millis = span.num_milliseconds();
    let days = millis / MILLIS_PER_DAY + i64::from(millis % MILLIS_PER_DAY != 0);
    u32::try_from(days).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn day(d: u32, h: u32) -> Timestamp {
        Timestamp::new(Utc.with_ymd_and_hms(2024, 6, d, h, 0, 0).unwrap())
    }

    fn arb_status() -> impl Strategy<Value = OrderStatus> {
        prop::sample::select(OrderStatus::ALL.to_vec())
    }

    fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1_600_000_000_000i64..1_900_000_000_000).prop_map(|ms| {
            Timestamp::new(Utc.timestamp_millis_opt(ms).unwrap())
        })
    }

    proptest! {
        #[test]
        fn classify_is_deterministic(
            status in arb_status(),
            estimated in prop::option::of(arb_timestamp()),
            actual in prop::option::of(arb_timestamp()),
            now in arb_timestamp(),
        ) {
            prop_assert_eq!(
                classify(status, estimated, actual, now),
                classify(status, estimated, actual, now)
            );
        }

        #[test]
        fn past_estimates_are_at_least_one_day_late(
            estimated in arb_timestamp(),
            late_by_ms in 1i64..=30 * MILLIS_PER_DAY,
        ) {
            let now = Timestamp::new(*estimated.as_datetime() + Duration::milliseconds(late_by_ms));
            match classify(OrderStatus::Shipped, Some(estimated), None, now) {
                DeliveryStatus::Delayed { days_late } => prop_assert!(days_late >= 1),
                other => prop_assert!(false, "expected Delayed, got {:?}", other),
            }
        }
    }

    #[test]
    fn delivered_on_time_when_not_after_estimate() {
        let status = classify(
            OrderStatus::Delivered,
            Some(day(5, 12)),
            Some(day(5, 9)),
            day(9, 0),
        );
        assert_eq!(status, DeliveryStatus::Delivered { on_time: true });
    }

    #[test]
    fn delivered_late_when_after_estimate() {
        let status = classify(
            OrderStatus::Delivered,
            Some(day(5, 12)),
            Some(day(6, 9)),
            day(9, 0),
        );
        assert_eq!(status, DeliveryStatus::Delivered { on_time: false });
    }

    #[test]
    fn delivered_without_estimate_counts_as_on_time() {
        assert_eq!(
            classify(OrderStatus::Delivered, None, Some(day(6, 9)), day(9, 0)),
            DeliveryStatus::Delivered { on_time: true }
        );
    }

    #[test]
    fn cancelled_ignores_estimate() {
        assert_eq!(
            classify(OrderStatus::Cancelled, Some(day(1, 0)), None, day(9, 0)),
            DeliveryStatus::Cancelled
        );
    }

    #[test]
    fn lateness_rounds_up_to_whole_days() {
        // 2 days and 3 hours late
        assert_eq!(
            classify(OrderStatus::Shipped, Some(day(10, 0)), None, day(12, 3)),
            DeliveryStatus::Delayed { days_late: 3 }
        );
    }

    #[test]
    fn arriving_soon_within_one_day() {
        let status = classify(OrderStatus::Shipped, Some(day(10, 8)), None, day(9, 20));
        assert_eq!(status, DeliveryStatus::ArrivingSoon);
        assert!(status.is_urgent());

        // exactly one day counts as soon
        assert_eq!(
            classify(OrderStatus::Shipped, Some(day(10, 8)), None, day(9, 8)),
            DeliveryStatus::ArrivingSoon
        );
    }

    #[test]
    fn on_track_rounds_remaining_days_up() {
        let status = classify(OrderStatus::Processing, Some(day(12, 8)), None, day(9, 20));
        assert_eq!(status, DeliveryStatus::OnTrack { days_remaining: 3 });
        assert!(!status.is_urgent());
    }

    #[test]
    fn missing_estimate_is_unscheduled() {
        assert_eq!(
            classify(OrderStatus::Pending, None, None, day(9, 0)),
            DeliveryStatus::Unscheduled
        );
    }

    #[test]
    fn estimate_adds_lead_days() {
        assert_eq!(estimate_from(day(1, 9), 5), day(6, 9));
    }

    #[test]
    fn progress_follows_status_weight() {
        assert_eq!(progress_percentage(OrderStatus::Shipped), 70);
        assert_eq!(progress_percentage(OrderStatus::Cancelled), 0);
    }
}
