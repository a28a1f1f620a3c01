//! `TrackCore` - order fulfillment tracking
//!
//! Models an order's lifecycle as a small status machine, records every
//! status change in an append-only timeline, and derives read models from
//! it: progress, delivery-delay classification, urgency, and lookups by
//! order number, tracking code or customer email.
//!
//! Storage and notification delivery are ports ([`OrderStore`],
//! [`NotificationDispatcher`]); `trackcore-memory` provides an in-memory
//! store.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod config;
pub mod delivery;
pub mod errors;
pub mod generator;
pub mod notification;
pub mod order;
pub mod retry;
pub mod service;
pub mod status;
pub mod store;
pub mod timeline;
pub mod types;
pub mod view;

mod validation;

#[cfg(feature = "testing")]
pub mod testing;

pub use clock::{Clock, SystemClock};
pub use config::TrackingConfig;
pub use delivery::{classify, estimate_from, progress_percentage, DeliveryStatus};
pub use errors::{
    NotificationError, RetryGuidance, StoreError, StoreResult, TrackingError, TrackingResult,
};
pub use generator::TrackingCodeGenerator;
pub use notification::{
    LoggingDispatcher, NotificationDispatcher, NotificationOutcome, NotificationStatsSnapshot,
    StatusChanged,
};
pub use order::{CustomerSnapshot, NewOrder, Order, OrderItem};
pub use retry::{RetryConfig, RetryPolicy};
pub use service::{TrackingService, UpdateStatus};
pub use status::{validate, OrderStatus, TransitionKind, TransitionMode, TransitionRejection};
pub use store::{OrderStore, Page, PageRequest, StoredOrder, TimelineStore};
pub use timeline::{NewTimelineEvent, Timeline, TimelineEvent};
pub use types::{
    Actor, CustomerEmail, EventId, Identifier, Location, Money, Note, OrderId, OrderNumber,
    OrderVersion, ProductId, Quantity, Timestamp, TrackingCode,
};
pub use validation::{ORDER_NUMBER_PREFIX, TRACKING_CODE_PREFIX};
pub use view::{OrderSummary, OrderView, StepState, TimelineStep, UpdatedView};
