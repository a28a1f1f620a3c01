//! Shared validation predicates for identifier types.
//!
//! These back the nutype smart constructors in [`crate::types`] and are also
//! used by [`crate::types::Identifier::parse`] for prefix recognition.

/// Prefix carried by every order number.
pub const ORDER_NUMBER_PREFIX: &str = "ORD-";

/// Prefix carried by every tracking code.
pub const TRACKING_CODE_PREFIX: &str = "TRK-";

/// Length of the random suffix of a tracking code.
pub const TRACKING_SUFFIX_LEN: usize = 6;

fn is_ascii_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// `ORD-<epochms>-<seq>`, both parts decimal.
pub(crate) fn is_order_number(s: &str) -> bool {
    s.strip_prefix(ORDER_NUMBER_PREFIX)
        .and_then(|rest| rest.split_once('-'))
        .is_some_and(|(millis, seq)| is_ascii_digits(millis) && is_ascii_digits(seq))
}

/// `TRK-<epochms>-<random6>`, suffix uppercase alphanumeric.
pub(crate) fn is_tracking_code(s: &str) -> bool {
    s.strip_prefix(TRACKING_CODE_PREFIX)
        .and_then(|rest| rest.split_once('-'))
        .is_some_and(|(millis, suffix)| {
            is_ascii_digits(millis)
                && suffix.len() == TRACKING_SUFFIX_LEN
                && suffix
                    .bytes()
                    .all(|b| b.is_ascii_digit() || b.is_ascii_uppercase())
        })
}
