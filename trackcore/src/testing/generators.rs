//! Property test generators for tracking types.
//!
//! Each generator respects the validation rules of its type.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use crate::generator::{format_order_number, TRACKING_ALPHABET};
use crate::status::{OrderStatus, TransitionMode};
use crate::types::{Note, OrderNumber, Timestamp, TrackingCode};
use crate::validation::TRACKING_SUFFIX_LEN;

/// Any status.
pub fn arb_status() -> impl Strategy<Value = OrderStatus> {
    prop::sample::select(OrderStatus::ALL.to_vec())
}

/// A status that still accepts transitions.
pub fn arb_live_status() -> impl Strategy<Value = OrderStatus> {
    arb_status().prop_filter("terminal status", |s| !s.is_terminal())
}

/// Either transition mode.
pub fn arb_mode() -> impl Strategy<Value = TransitionMode> {
    prop_oneof![
        Just(TransitionMode::Progression),
        Just(TransitionMode::AdminOverride)
    ]
}

/// A sequence of requested statuses, for driving an order through random
/// updates.
pub fn arb_status_requests(
    max_len: usize,
) -> impl Strategy<Value = Vec<(OrderStatus, TransitionMode)>> {
    prop::collection::vec((arb_status(), arb_mode()), 0..=max_len)
}

/// Timestamps between 2020 and 2030.
pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
    (1_577_836_800_000i64..1_893_456_000_000).prop_map(|ms| {
        Timestamp::new(
            Utc.timestamp_millis_opt(ms)
                .single()
                .expect("millis within range are always valid"),
        )
    })
}

/// Valid order numbers.
pub fn arb_order_number() -> impl Strategy<Value = OrderNumber> {
    (0u64..=9_999_999_999_999, 0u64..=999_999).prop_map(|(ms, seq)| format_order_number(ms, seq))
}

/// Valid tracking codes.
pub fn arb_tracking_code() -> impl Strategy<Value = TrackingCode> {
    (
        0u64..=9_999_999_999_999,
        prop::collection::vec(
            prop::sample::select(TRACKING_ALPHABET.to_vec()),
            TRACKING_SUFFIX_LEN,
        ),
    )
        .prop_filter_map("Invalid TrackingCode", |(ms, suffix)| {
            let suffix = String::from_utf8(suffix).ok()?;
            TrackingCode::try_new(format!("TRK-{ms}-{suffix}")).ok()
        })
}

/// Valid notes.
pub fn arb_note() -> impl Strategy<Value = Note> {
    "[a-zA-Z0-9][a-zA-Z0-9 .,!-]{0,120}".prop_filter_map("Invalid Note", |s| Note::try_new(s).ok())
}
