//! Core types for order fulfillment tracking.
//!
//! Every identifier and free-text field entering the tracking core goes
//! through a smart constructor, so once a value exists it is valid and no
//! further checking is needed downstream.

use chrono::{DateTime, Utc};
use nutype::nutype;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validation::{
    is_order_number, is_tracking_code, ORDER_NUMBER_PREFIX, TRACKING_CODE_PREFIX,
};

/// Internal primary key of an order, used as the order reference by the
/// timeline and the write path.
///
/// Always a `UUIDv7`, so ids sort by creation time.
#[nutype(
    validate(predicate = |id: &Uuid| id.get_version() == Some(uuid::Version::SortRand)),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct OrderId(Uuid);

impl OrderId {
    /// Creates a new `OrderId` with the current timestamp.
    pub fn new() -> Self {
        // Uuid::now_v7() always yields a v7 UUID
        Self::try_new(Uuid::now_v7()).expect("Uuid::now_v7() should always return a valid v7 UUID")
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier of a single timeline event (`UUIDv7`).
///
/// Doubles as the idempotency key of a status update: a store refuses to
/// append the same event id twice.
#[nutype(
    validate(predicate = |id: &Uuid| id.get_version() == Some(uuid::Version::SortRand)),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new `EventId` with the current timestamp.
    pub fn new() -> Self {
        Self::try_new(Uuid::now_v7()).expect("Uuid::now_v7() should always return a valid v7 UUID")
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

/// The version of an order: the number of timeline events recorded for it.
///
/// A freshly created order is at version 1 (its `pending` event). Writers
/// pass the version they observed and the store rejects the append when the
/// order has moved on.
#[nutype(
    validate(greater_or_equal = 0),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Display,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct OrderVersion(u64);

impl OrderVersion {
    /// Version before any event was recorded.
    pub fn initial() -> Self {
        Self::try_new(0).expect("0 is always a valid version")
    }

    /// Returns the next version after this one.
    #[must_use]
    pub fn next(self) -> Self {
        let current: u64 = self.into();
        Self::try_new(current + 1).expect("next version should always be valid")
    }
}

/// A timestamp for when something happened, always in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a new timestamp from a UTC `DateTime`.
    pub const fn new(datetime: DateTime<Utc>) -> Self {
        Self(datetime)
    }

    /// Creates a timestamp representing the current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Returns the underlying `DateTime`.
    pub const fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Converts the timestamp into the underlying `DateTime`.
    pub const fn into_datetime(self) -> DateTime<Utc> {
        self.0
    }

    /// Milliseconds since the Unix epoch.
    pub fn epoch_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(datetime: DateTime<Utc>) -> Self {
        Self::new(datetime)
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(timestamp: Timestamp) -> Self {
        timestamp.into_datetime()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Customer-facing order number, `ORD-<epochms>-<seq>`.
///
/// Input is trimmed and uppercased, so `" ord-1-2 "` parses.
#[nutype(
    sanitize(trim, uppercase),
    validate(not_empty, len_char_max = 64, predicate = is_order_number),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct OrderNumber(String);

/// Shipment tracking code, `TRK-<epochms>-<random6>`.
#[nutype(
    sanitize(trim, uppercase),
    validate(not_empty, len_char_max = 64, predicate = is_tracking_code),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct TrackingCode(String);

/// Email address as captured on the order's customer snapshot.
///
/// Only surrounding whitespace is removed: searches match the snapshot
/// exactly.
#[nutype(
    sanitize(trim),
    validate(
        not_empty,
        len_char_max = 255,
        regex = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$"
    ),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct CustomerEmail(String);

/// Free-text note attached to a status change.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 1000),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct Note(String);

/// Where a status change happened (depot, city, carrier hub).
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 200),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct Location(String);

/// Weak reference to a catalog product. Used for lookups only.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 64),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct ProductId(String);

/// Number of units of one order line. Never zero.
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 10_000),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Display,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct Quantity(u32);

/// Errors raised when constructing [`Money`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    /// Amount below zero.
    #[error("money amount cannot be negative: {0}")]
    Negative(Decimal),
    /// More than two decimal places.
    #[error("money amount cannot have more than 2 decimal places: {0}")]
    TooPrecise(Decimal),
    /// Arithmetic left the representable range.
    #[error("money amount overflowed")]
    Overflow,
}

/// A non-negative monetary amount with at most two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    /// Validates and wraps an amount.
    pub fn new(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::Negative(amount));
        }
        if amount.normalize().scale() > 2 {
            return Err(MoneyError::TooPrecise(amount));
        }
        Ok(Self(amount))
    }

    /// Builds an amount from a count of cents.
    pub fn from_cents(cents: u64) -> Result<Self, MoneyError> {
        let cents = i64::try_from(cents).map_err(|_| MoneyError::Overflow)?;
        Self::new(Decimal::new(cents, 2))
    }

    /// Zero.
    pub const fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// The wrapped decimal amount.
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Adds two amounts.
    pub fn checked_add(self, other: Self) -> Result<Self, MoneyError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(MoneyError::Overflow)
    }

    /// Multiplies a unit price by a line quantity.
    pub fn times(self, quantity: Quantity) -> Result<Self, MoneyError> {
        let units: u32 = quantity.into();
        self.0
            .checked_mul(Decimal::from(units))
            .map(Self)
            .ok_or(MoneyError::Overflow)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Who triggered a status change. Recorded for audit, never used for
/// authorization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Actor {
    /// A back-office user.
    Admin {
        /// Identifier of the admin account.
        id: String,
    },
    /// An automated carrier feed or webhook.
    Carrier {
        /// Name of the feed (carrier or integration).
        feed: String,
    },
    /// The tracking system itself.
    #[default]
    System,
}

impl Actor {
    /// Convenience constructor for an admin actor.
    pub fn admin(id: impl Into<String>) -> Self {
        Self::Admin { id: id.into() }
    }

    /// Convenience constructor for a carrier feed actor.
    pub fn carrier(feed: impl Into<String>) -> Self {
        Self::Carrier { feed: feed.into() }
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin { id } => write!(f, "admin:{id}"),
            Self::Carrier { feed } => write!(f, "carrier:{feed}"),
            Self::System => f.write_str("system"),
        }
    }
}

/// An external order handle, recognised by its prefix.
///
/// There is no fallback between kinds: an `ORD-` string is only ever looked
/// up as an order number, a `TRK-` string only as a tracking code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    /// Looked up through the order-number index.
    OrderNumber(OrderNumber),
    /// Looked up through the tracking-code index.
    TrackingCode(TrackingCode),
}

impl Identifier {
    /// Recognises an identifier by prefix. Returns `None` for anything that
    /// is neither a well-formed order number nor a well-formed tracking code.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_uppercase();
        if normalized.starts_with(ORDER_NUMBER_PREFIX) {
            OrderNumber::try_new(normalized).ok().map(Self::OrderNumber)
        } else if normalized.starts_with(TRACKING_CODE_PREFIX) {
            TrackingCode::try_new(normalized).ok().map(Self::TrackingCode)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OrderNumber(number) => number.fmt(f),
            Self::TrackingCode(code) => code.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    proptest! {
        #[test]
        fn order_number_accepts_generated_shape(millis in 0u64..=9_999_999_999_999, seq in 0u64..=999_999) {
            let raw = format!("ORD-{millis}-{seq}");
            let number = OrderNumber::try_new(raw.clone());
            prop_assert!(number.is_ok());
            let number = number.unwrap();
            prop_assert_eq!(number.as_ref(), raw.as_str());
        }

        #[test]
        fn tracking_code_accepts_generated_shape(millis in 0u64..=9_999_999_999_999, suffix in "[A-Z0-9]{6}") {
            let raw = format!("TRK-{millis}-{suffix}");
            prop_assert!(TrackingCode::try_new(raw).is_ok());
        }

        #[test]
        fn identifier_never_crosses_kinds(s in "[A-Za-z0-9-]{0,40}") {
            if let Some(identifier) = Identifier::parse(&s) {
                let upper = s.trim().to_uppercase();
                match identifier {
                    Identifier::OrderNumber(_) => prop_assert!(upper.starts_with("ORD-")),
                    Identifier::TrackingCode(_) => prop_assert!(upper.starts_with("TRK-")),
                }
            }
        }

        #[test]
        fn order_version_next_increments_by_one(v in 0u64..u64::MAX) {
            let version = OrderVersion::try_new(v).unwrap();
            let next: u64 = version.next().into();
            prop_assert_eq!(next, v + 1);
        }
    }

    #[test]
    fn order_number_is_normalized_to_uppercase() {
        let number = OrderNumber::try_new("  ord-1718000000000-7 ").unwrap();
        assert_eq!(number.as_ref(), "ORD-1718000000000-7");
    }

    #[test]
    fn identifier_dispatches_on_prefix() {
        assert!(matches!(
            Identifier::parse("ORD-1718000000000-7"),
            Some(Identifier::OrderNumber(_))
        ));
        assert!(matches!(
            Identifier::parse("trk-1718000000000-ab12cd"),
            Some(Identifier::TrackingCode(_))
        ));
        assert_eq!(Identifier::parse("1718000000000-7"), None);
        assert_eq!(Identifier::parse("ORD-not-a-number"), None);
        assert_eq!(Identifier::parse(""), None);
    }

    #[test]
    fn customer_email_is_matched_verbatim() {
        let email = CustomerEmail::try_new(" Jane.Doe@Example.com ").unwrap();
        assert_eq!(email.as_ref(), "Jane.Doe@Example.com");
        assert!(CustomerEmail::try_new("not-an-email").is_err());
    }

    #[test]
    fn note_and_location_reject_blank_input() {
        assert!(Note::try_new("   ").is_err());
        assert!(Location::try_new("").is_err());
        assert!(Location::try_new("Lyon hub").is_ok());
    }

    #[test]
    fn quantity_rejects_zero() {
        assert!(Quantity::try_new(0).is_err());
        assert!(Quantity::try_new(1).is_ok());
    }

    #[test]
    fn money_validates_sign_and_precision() {
        assert!(Money::new(dec!(19.99)).is_ok());
        assert_eq!(Money::new(dec!(-1)), Err(MoneyError::Negative(dec!(-1))));
        assert_eq!(
            Money::new(dec!(1.005)),
            Err(MoneyError::TooPrecise(dec!(1.005)))
        );
        let price = Money::from_cents(1999).unwrap();
        let line = price.times(Quantity::try_new(3).unwrap()).unwrap();
        assert_eq!(line.amount(), dec!(59.97));
        assert_eq!(line.to_string(), "59.97");
    }

    #[test]
    fn actor_display_names_the_source() {
        assert_eq!(Actor::admin("u-1").to_string(), "admin:u-1");
        assert_eq!(Actor::carrier("dhl").to_string(), "carrier:dhl");
        assert_eq!(Actor::System.to_string(), "system");
    }

    #[test]
    fn event_id_new_creates_valid_v7() {
        let event_id = EventId::new();
        assert_eq!(
            event_id.as_ref().get_version(),
            Some(uuid::Version::SortRand)
        );
        assert_ne!(EventId::new(), event_id);
    }
}
