//! Order statuses and the transition rules between them.
//!
//! The happy path is `pending → confirmed → processing → shipped →
//! delivered`. `cancelled` is reachable from every non-terminal status.
//! `delivered` and `cancelled` are terminal.
//!
//! ```text
//! ┌─────────┐   ┌───────────┐   ┌────────────┐   ┌─────────┐   ┌───────────┐
//! │ pending │──▶│ confirmed │──▶│ processing │──▶│ shipped │──▶│ delivered │
//! └────┬────┘   └─────┬─────┘   └─────┬──────┘   └────┬────┘   └───────────┘
//!      │              │               │               │
//!      └──────────────┴───────┬───────┴───────────────┘
//!                             ▼
//!                       ┌───────────┐
//!                       │ cancelled │
//!                       └───────────┘
//! ```
//!
//! Jumping forward more than one step is an administrative correction and is
//! only accepted under [`TransitionMode::AdminOverride`].

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Placed, not yet accepted by the shop.
    Pending,
    /// Accepted; delivery has been scheduled.
    Confirmed,
    /// Being picked and packed.
    Processing,
    /// Handed over to the carrier.
    Shipped,
    /// Received by the customer.
    Delivered,
    /// Abandoned before delivery.
    Cancelled,
}

impl OrderStatus {
    /// Happy-path order. `Cancelled` is not part of it.
    pub const HAPPY_PATH: [Self; 5] = [
        Self::Pending,
        Self::Confirmed,
        Self::Processing,
        Self::Shipped,
        Self::Delivered,
    ];

    /// Every status, happy path first.
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Confirmed,
        Self::Processing,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// Position on the happy path, `None` for `Cancelled`.
    pub const fn rank(self) -> Option<usize> {
        match self {
            Self::Pending => Some(0),
            Self::Confirmed => Some(1),
            Self::Processing => Some(2),
            Self::Shipped => Some(3),
            Self::Delivered => Some(4),
            Self::Cancelled => None,
        }
    }

    /// Immediate happy-path successor.
    pub const fn successor(self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::Confirmed),
            Self::Confirmed => Some(Self::Processing),
            Self::Processing => Some(Self::Shipped),
            Self::Shipped => Some(Self::Delivered),
            Self::Delivered | Self::Cancelled => None,
        }
    }

    /// Terminal statuses accept no further transitions.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Lowercase wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Display label.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Order Placed",
            Self::Confirmed => "Order Confirmed",
            Self::Processing => "Processing",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Display color token.
    pub const fn color(self) -> &'static str {
        match self {
            Self::Pending => "yellow",
            Self::Confirmed => "blue",
            Self::Processing => "purple",
            Self::Shipped => "indigo",
            Self::Delivered => "green",
            Self::Cancelled => "red",
        }
    }

    /// Fixed progress weight in percent. Display only.
    pub const fn weight(self) -> u8 {
        match self {
            Self::Pending | Self::Cancelled => 0,
            Self::Confirmed => 20,
            Self::Processing => 40,
            Self::Shipped => 70,
            Self::Delivered => 100,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a string names no status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown order status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// How strictly a requested status is checked against the happy path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionMode {
    /// Only the immediate successor or `cancelled`.
    #[default]
    Progression,
    /// Also allows jumping forward over unrecorded steps.
    AdminOverride,
}

/// What kind of change an accepted transition is. Stored on the timeline
/// event so corrections stay distinguishable from normal progression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransitionKind {
    /// The order's first event.
    Created,
    /// Move to the immediate successor.
    Advance,
    /// Move to `cancelled`.
    Cancellation,
    /// Administrative jump forward; `skipped` lists the statuses that were
    /// never recorded.
    Correction {
        /// Happy-path statuses jumped over, in order.
        skipped: Vec<OrderStatus>,
    },
}

impl TransitionKind {
    /// Whether this transition was an out-of-order correction.
    pub const fn is_correction(&self) -> bool {
        matches!(self, Self::Correction { .. })
    }
}

/// Why a transition was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionRejection {
    /// Requested status equals the current one.
    NoChange,
    /// Current status is `delivered` or `cancelled`.
    TerminalState,
    /// Requested status lies further ahead than the next step and no
    /// override was given.
    SkipRequiresOverride,
    /// Requested status lies behind the current one.
    Regression,
}

impl std::fmt::Display for TransitionRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::NoChange => "status is unchanged",
            Self::TerminalState => "current status is terminal",
            Self::SkipRequiresOverride => "skipping ahead requires an administrative override",
            Self::Regression => "status cannot move backwards",
        })
    }
}

/// Checks whether `current → requested` is allowed.
pub fn validate(
    current: OrderStatus,
    requested: OrderStatus,
    mode: TransitionMode,
) -> Result<TransitionKind, TransitionRejection> {
    if current == requested {
        return Err(TransitionRejection::NoChange);
    }
    if current.is_terminal() {
        return Err(TransitionRejection::TerminalState);
    }
    if requested == OrderStatus::Cancelled {
        return Ok(TransitionKind::Cancellation);
    }
    if current.successor() == Some(requested) {
        return Ok(TransitionKind::Advance);
    }

    // Both are on the happy path from here: current is non-terminal and
    // requested is neither current, its successor nor cancelled.
    let (Some(from), Some(to)) = (current.rank(), requested.rank()) else {
        return Err(TransitionRejection::Regression);
    };
    if to < from {
        return Err(TransitionRejection::Regression);
    }
    match mode {
        TransitionMode::Progression => Err(TransitionRejection::SkipRequiresOverride),
        TransitionMode::AdminOverride => Ok(TransitionKind::Correction {
            skipped: OrderStatus::HAPPY_PATH[from + 1..to].to_vec(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_status() -> impl Strategy<Value = OrderStatus> {
        prop::sample::select(OrderStatus::ALL.to_vec())
    }

    fn arb_mode() -> impl Strategy<Value = TransitionMode> {
        prop_oneof![
            Just(TransitionMode::Progression),
            Just(TransitionMode::AdminOverride)
        ]
    }

    proptest! {
        #[test]
        fn same_status_is_always_no_change(status in arb_status(), mode in arb_mode()) {
            prop_assert_eq!(validate(status, status, mode), Err(TransitionRejection::NoChange));
        }

        #[test]
        fn terminal_states_reject_everything_else(
            current in prop::sample::select(vec![OrderStatus::Delivered, OrderStatus::Cancelled]),
            requested in arb_status(),
            mode in arb_mode(),
        ) {
            prop_assume!(current != requested);
            prop_assert_eq!(validate(current, requested, mode), Err(TransitionRejection::TerminalState));
        }

        #[test]
        fn cancellation_is_open_from_every_live_status(current in arb_status(), mode in arb_mode()) {
            prop_assume!(!current.is_terminal());
            prop_assert_eq!(validate(current, OrderStatus::Cancelled, mode), Ok(TransitionKind::Cancellation));
        }

        #[test]
        fn accepted_transitions_never_move_backwards(current in arb_status(), requested in arb_status(), mode in arb_mode()) {
            if validate(current, requested, mode).is_ok() && requested != OrderStatus::Cancelled {
                prop_assert!(requested.rank() > current.rank());
            }
        }

        #[test]
        fn override_only_widens_progression(current in arb_status(), requested in arb_status()) {
            if validate(current, requested, TransitionMode::Progression).is_ok() {
                prop_assert_eq!(
                    validate(current, requested, TransitionMode::Progression),
                    validate(current, requested, TransitionMode::AdminOverride)
                );
            }
        }
    }

    #[test]
    fn happy_path_advances_one_step_at_a_time() {
        for pair in OrderStatus::HAPPY_PATH.windows(2) {
            assert_eq!(
                validate(pair[0], pair[1], TransitionMode::Progression),
                Ok(TransitionKind::Advance)
            );
        }
    }

    #[test]
    fn skipping_without_override_is_rejected() {
        assert_eq!(
            validate(
                OrderStatus::Pending,
                OrderStatus::Shipped,
                TransitionMode::Progression
            ),
            Err(TransitionRejection::SkipRequiresOverride)
        );
    }

    #[test]
    fn override_records_skipped_statuses() {
        assert_eq!(
            validate(
                OrderStatus::Processing,
                OrderStatus::Delivered,
                TransitionMode::AdminOverride
            ),
            Ok(TransitionKind::Correction {
                skipped: vec![OrderStatus::Shipped]
            })
        );
        assert_eq!(
            validate(
                OrderStatus::Pending,
                OrderStatus::Delivered,
                TransitionMode::AdminOverride
            ),
            Ok(TransitionKind::Correction {
                skipped: vec![
                    OrderStatus::Confirmed,
                    OrderStatus::Processing,
                    OrderStatus::Shipped
                ]
            })
        );
    }

    #[test]
    fn backwards_moves_are_regressions_even_with_override() {
        assert_eq!(
            validate(
                OrderStatus::Shipped,
                OrderStatus::Confirmed,
                TransitionMode::AdminOverride
            ),
            Err(TransitionRejection::Regression)
        );
    }

    #[test]
    fn weights_match_progress_table() {
        let weights: Vec<u8> = OrderStatus::ALL.iter().map(|s| s.weight()).collect();
        assert_eq!(weights, vec![0, 20, 40, 70, 100, 0]);
    }

    #[test]
    fn statuses_parse_from_wire_names() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
        }
        assert_eq!("Shipped".parse::<OrderStatus>(), Ok(OrderStatus::Shipped));
        assert!("lost".parse::<OrderStatus>().is_err());
    }
}
