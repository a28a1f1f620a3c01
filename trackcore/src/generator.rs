//! Generation of order numbers and tracking codes.
//!
//! Generated values are unique with high probability only. The store's
//! uniqueness indexes have the final say, and order creation regenerates on
//! a collision.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rand::Rng;

use crate::clock::{Clock, SystemClock};
use crate::types::{OrderNumber, TrackingCode};
use crate::validation::{ORDER_NUMBER_PREFIX, TRACKING_CODE_PREFIX, TRACKING_SUFFIX_LEN};

/// Alphabet of the random tracking suffix. `0`, `1`, `I` and `O` are left
/// out because they are easily misread.
pub const TRACKING_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Formats `ORD-<epochms>-<seq>`.
pub fn format_order_number(epoch_ms: u64, sequence: u64) -> OrderNumber {
    OrderNumber::try_new(format!("{ORDER_NUMBER_PREFIX}{epoch_ms}-{sequence}"))
        .expect("formatted order numbers are always well formed")
}

/// Formats `TRK-<epochms>-<random6>` with a suffix drawn from `rng`.
pub fn format_tracking_code<R: Rng + ?Sized>(epoch_ms: u64, rng: &mut R) -> TrackingCode {
    let suffix: String = (0..TRACKING_SUFFIX_LEN)
        .map(|_| char::from(TRACKING_ALPHABET[rng.random_range(0..TRACKING_ALPHABET.len())]))
        .collect();
    TrackingCode::try_new(format!("{TRACKING_CODE_PREFIX}{epoch_ms}-{suffix}"))
        .expect("formatted tracking codes are always well formed")
}

/// Produces fresh order numbers and tracking codes from the injected clock.
#[derive(Clone)]
pub struct TrackingCodeGenerator {
    clock: Arc<dyn Clock>,
    sequence: Arc<AtomicU64>,
}

impl TrackingCodeGenerator {
    /// Creates a generator reading time from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            sequence: Arc::new(AtomicU64::new(1)),
        }
    }

    fn epoch_ms(&self) -> u64 {
        u64::try_from(self.clock.now().epoch_millis()).unwrap_or_default()
    }

    /// A new tracking code.
    pub fn new_tracking_code(&self) -> TrackingCode {
        format_tracking_code(self.epoch_ms(), &mut rand::rng())
    }

    /// A new order number carrying the given sequence value.
    pub fn new_order_number(&self, sequence: u64) -> OrderNumber {
        format_order_number(self.epoch_ms(), sequence)
    }

    /// A new order number using the generator's own sequence.
    pub fn next_order_number(&self) -> OrderNumber {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.new_order_number(sequence)
    }
}

impl Default for TrackingCodeGenerator {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl std::fmt::Debug for TrackingCodeGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingCodeGenerator")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    proptest! {
        #[test]
        fn tracking_codes_use_the_unambiguous_alphabet(epoch_ms in 0u64..=9_999_999_999_999, seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            let code = format_tracking_code(epoch_ms, &mut rng);
            let suffix = code.rsplit('-').next().unwrap();
            prop_assert_eq!(suffix.len(), TRACKING_SUFFIX_LEN);
            prop_assert!(suffix.bytes().all(|b| TRACKING_ALPHABET.contains(&b)));
            let expected_prefix = format!("TRK-{epoch_ms}-");
            prop_assert!(code.starts_with(&expected_prefix));
        }
    }

    #[test]
    fn order_number_embeds_time_and_sequence() {
        assert_eq!(
            format_order_number(1_717_232_400_000, 42).as_ref(),
            "ORD-1717232400000-42"
        );
    }

    #[test]
    fn sequence_makes_order_numbers_distinct() {
        let generator = TrackingCodeGenerator::default();
        let numbers: HashSet<_> = (0..100).map(|_| generator.next_order_number()).collect();
        assert_eq!(numbers.len(), 100);
    }

    #[test]
    fn clones_share_the_sequence() {
        let generator = TrackingCodeGenerator::default();
        let clone = generator.clone();
        let a = generator.next_order_number();
        let b = clone.next_order_number();
        assert_ne!(a, b);
    }

    #[test]
    fn seeded_rng_is_reproducible() {
        let a = format_tracking_code(1, &mut StdRng::seed_from_u64(7));
        let b = format_tracking_code(1, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }
}
