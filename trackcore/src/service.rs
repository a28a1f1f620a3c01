//! The tracking service: write path for status changes and read paths for
//! lookups, searches and timeline views.
//!
//! # Write path
//!
//! ```text
//! load order ─▶ validate transition ─▶ append (compare-and-set) ─▶ enqueue notification
//!      ▲                                     │
//!      └────── version conflict, retry ◀─────┘
//! ```
//!
//! Validation happens before the store is touched, so a rejected transition
//! writes nothing. A writer that loses a race re-reads the order and
//! validates again against what the winner wrote.

use std::future::Future;
use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::TrackingConfig;
use crate::delivery::{classify, estimate_from, DeliveryStatus};
use crate::errors::{StoreError, StoreResult, TrackingError, TrackingResult};
use crate::generator::TrackingCodeGenerator;
use crate::notification::{
    NotificationDispatcher, NotificationOutcome, NotificationQueue, NotificationStatsSnapshot,
    StatusChanged,
};
use crate::order::{NewOrder, Order};
use crate::retry::{RetryConfig, RetryPolicy};
use crate::status::{validate, OrderStatus, TransitionKind, TransitionMode};
use crate::store::{OrderStore, Page, PageRequest, StoredOrder};
use crate::timeline::{NewTimelineEvent, Timeline};
use crate::types::{
    Actor, CustomerEmail, EventId, Identifier, Location, Note, OrderId, OrderNumber, Timestamp,
};
use crate::view::{timeline_steps, OrderSummary, OrderView, TimelineStep, UpdatedView};

/// A request to move an order to a new status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateStatus {
    /// Order to change
    pub order_id: OrderId,
    /// Status requested
    pub status: OrderStatus,
    /// Whether skipping ahead is allowed
    pub mode: TransitionMode,
    /// Optional operator note
    pub note: Option<Note>,
    /// Optional place of the change
    pub location: Option<Location>,
    /// Who asks for the change
    pub actor: Actor,
    /// Event id to use; resubmitting the same key never appends twice
    pub idempotency_key: Option<EventId>,
}

impl UpdateStatus {
    /// A plain progression request from the system actor.
    pub const fn new(order_id: OrderId, status: OrderStatus) -> Self {
        Self {
            order_id,
            status,
            mode: TransitionMode::Progression,
            note: None,
            location: None,
            actor: Actor::System,
            idempotency_key: None,
        }
    }

    /// Allows skipping ahead over unrecorded statuses.
    #[must_use]
    pub const fn with_override(mut self) -> Self {
        self.mode = TransitionMode::AdminOverride;
        self
    }

    /// Attaches an operator note.
    #[must_use]
    pub fn with_note(mut self, note: Note) -> Self {
        self.note = Some(note);
        self
    }

    /// Attaches a location.
    #[must_use]
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Records who asks for the change.
    #[must_use]
    pub fn with_actor(mut self, actor: Actor) -> Self {
        self.actor = actor;
        self
    }

    /// Uses a caller-chosen idempotency key.
    #[must_use]
    pub const fn with_idempotency_key(mut self, key: EventId) -> Self {
        self.idempotency_key = Some(key);
        self
    }
}

/// Order tracking on top of an [`OrderStore`].
pub struct TrackingService<S>
where
    S: OrderStore,
{
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    generator: TrackingCodeGenerator,
    notifications: NotificationQueue,
    config: TrackingConfig,
    retry_config: RetryConfig,
    retry_policy: RetryPolicy,
}

impl<S> TrackingService<S>
where
    S: OrderStore,
{
    /// Creates a service reading wall-clock time. Spawns the notification
    /// worker, so it must be called from within a Tokio runtime.
    pub fn new(
        store: Arc<S>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        config: TrackingConfig,
    ) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let notifications = NotificationQueue::spawn(
            dispatcher,
            config.notification_queue_capacity.into(),
            config.notification_timeout.as_duration(),
        );
        Self {
            store,
            generator: TrackingCodeGenerator::new(Arc::clone(&clock)),
            clock,
            notifications,
            retry_config: config.retry.to_retry_config(),
            retry_policy: RetryPolicy::default(),
            config,
        }
    }

    /// Replaces the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.generator = TrackingCodeGenerator::new(Arc::clone(&clock));
        self.clock = clock;
        self
    }

    /// Replaces the retry policy.
    #[must_use]
    pub const fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// The configuration in use.
    pub const fn config(&self) -> &TrackingConfig {
        &self.config
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Notification counters.
    pub fn notification_stats(&self) -> NotificationStatsSnapshot {
        self.notifications.stats()
    }

    /// Stops the notification worker after it has drained the queue.
    pub async fn shutdown(self) -> NotificationStatsSnapshot {
        self.notifications.shutdown().await
    }

    /// Creates an order and its `pending` event with fresh identifiers.
    ///
    /// Identifier collisions reported by the store are retried with new
    /// identifiers, up to the configured number of attempts.
    #[instrument(skip(self, new_order), fields(items = new_order.items.len()))]
    pub async fn open_order(&self, new_order: NewOrder) -> TrackingResult<OrderView> {
        let max_attempts = self.retry_config.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let (order, initial) = Order::open(
                OrderId::new(),
                self.generator.next_order_number(),
                self.generator.new_tracking_code(),
                new_order.clone(),
                self.clock.now(),
            )?;
            match self
                .store_call("create", self.store.create(order, initial))
                .await
            {
                Ok(stored) => {
                    info!(
                        order_id = %stored.order.id(),
                        order_number = %stored.order.order_number(),
                        tracking_code = %stored.order.tracking_code(),
                        "Order opened"
                    );
                    let timeline = Timeline::new(vec![stored.event]);
                    return Ok(OrderView::build(&stored.order, &timeline, self.clock.now()));
                }
                Err(
                    e @ (StoreError::DuplicateOrderNumber(_)
                    | StoreError::DuplicateTrackingCode(_)),
                ) if attempt < max_attempts => {
                    warn!(attempt, error = %e, "Identifier collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Moves an order to a new status.
    ///
    /// On a version conflict the order is re-read and the transition
    /// validated again, so a racing duplicate ends in `NoChange` rather than
    /// a second event.
    #[instrument(
        skip(self, request),
        fields(order_id = %request.order_id, requested = %request.status, mode = ?request.mode)
    )]
    pub async fn update_status(&self, request: UpdateStatus) -> TrackingResult<UpdatedView> {
        let event_id = request.idempotency_key.unwrap_or_else(EventId::new);
        let max_attempts = self.retry_config.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let order = self.load_order(request.order_id).await?;

            let kind = match validate(order.status(), request.status, request.mode) {
                Ok(kind) => kind,
                Err(reason) => {
                    if request.idempotency_key.is_some() {
                        if let Some(replayed) = self.replayed(&order, event_id, &request).await? {
                            return Ok(replayed);
                        }
                    }
                    warn!(current = %order.status(), %reason, "Status change rejected");
                    return Err(TrackingError::InvalidTransition {
                        from: order.status(),
                        to: request.status,
                        reason,
                    });
                }
            };

            let now = next_timestamp(self.clock.now(), order.updated_at());
            let estimate = (request.status == OrderStatus::Confirmed
                && order.estimated_delivery().is_none())
            .then(|| estimate_from(now, self.config.default_delivery_days.into()));
            let event = NewTimelineEvent::new(request.status, kind, now)
                .with_event_id(event_id)
                .with_note(request.note.clone())
                .with_location(request.location.clone())
                .with_actor(request.actor.clone())
                .with_estimated_delivery(estimate);

            let appended = self
                .store_call(
                    "append",
                    self.store.append(order.id(), order.version(), event),
                )
                .await;

            match appended {
                Ok(stored) => {
                    if let TransitionKind::Correction { skipped } = &stored.event.kind {
                        warn!(
                            order_number = %stored.order.order_number(),
                            from = %order.status(),
                            to = %stored.order.status(),
                            version = %stored.order.version(),
                            actor = ?stored.event.actor,
                            ?skipped,
                            "Order status corrected by override"
                        );
                    } else {
                        info!(
                            order_number = %stored.order.order_number(),
                            from = %order.status(),
                            to = %stored.order.status(),
                            version = %stored.order.version(),
                            "Order status changed"
                        );
                    }
                    let notification = self.notify(&stored, order.status());
                    return self.updated_view(stored, notification).await;
                }
                Err(StoreError::DuplicateEvent(_)) => {
                    let order = self.load_order(request.order_id).await?;
                    return match self.replayed(&order, event_id, &request).await? {
                        Some(replayed) => Ok(replayed),
                        None => {
                            warn!(%event_id, "Idempotency key belongs to another order");
                            Err(TrackingError::InvalidInput(format!(
                                "idempotency key {event_id} was already used for another order"
                            )))
                        }
                    };
                }
                Err(e) if attempt < max_attempts && self.retry_policy.should_retry(&e) => {
                    let delay = self.retry_config.delay_for(attempt - 1);
                    warn!(attempt, ?delay, error = %e, "Retrying status change");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if matches!(e, StoreError::VersionConflict { .. }) {
                        warn!(attempt, "Giving up after repeated version conflicts");
                    }
                    return Err(e.into());
                }
            }
        }
    }

    /// Looks an order up by order number or tracking code.
    ///
    /// The input is trimmed and uppercased first. `ORD-` strings only ever
    /// hit the order-number index and `TRK-` strings only the tracking-code
    /// index; anything else is not found.
    #[instrument(skip(self))]
    pub async fn lookup_by_identifier(&self, raw: &str) -> TrackingResult<OrderView> {
        let Some(identifier) = Identifier::parse(raw) else {
            debug!("Unrecognised identifier");
            return Err(TrackingError::NotFound(raw.trim().to_string()));
        };
        let found = match &identifier {
            Identifier::OrderNumber(number) => {
                self.store_call("find_by_order_number", self.store.find_by_order_number(number))
                    .await?
            }
            Identifier::TrackingCode(code) => {
                self.store_call("find_by_tracking_code", self.store.find_by_tracking_code(code))
                    .await?
            }
        };
        let order = found.ok_or_else(|| TrackingError::NotFound(identifier.to_string()))?;
        let timeline = self.timeline(order.id()).await?;
        Ok(OrderView::build(&order, &timeline, self.clock.now()))
    }

    /// Orders placed with exactly this email, newest first, optionally
    /// narrowed to one order number.
    #[instrument(skip(self, email), fields(offset = page.offset, limit = page.limit))]
    pub async fn search_by_email(
        &self,
        email: &str,
        order_number: Option<&str>,
        page: PageRequest,
    ) -> TrackingResult<Page<OrderSummary>> {
        let email = CustomerEmail::try_new(email)
            .map_err(|e| TrackingError::InvalidInput(format!("email: {e}")))?;
        let order_number = order_number
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .map(|raw| {
                OrderNumber::try_new(raw)
                    .map_err(|e| TrackingError::InvalidInput(format!("order number: {e}")))
            })
            .transpose()?;

        let mut orders = self
            .store_call("find_by_email", self.store.find_by_email(&email))
            .await?;
        if let Some(number) = &order_number {
            orders.retain(|order| order.order_number() == number);
        }
        orders.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().cmp(&a.id()))
        });

        let now = self.clock.now();
        let page = page.clamped(self.config.max_page_size.into());
        Ok(Page::slice(orders, page).map(|order| OrderSummary::from_order(&order, now)))
    }

    /// The display steps of an order's timeline.
    #[instrument(skip(self))]
    pub async fn build_timeline_view(
        &self,
        order_id: OrderId,
    ) -> TrackingResult<Vec<TimelineStep>> {
        let order = self.load_order(order_id).await?;
        let timeline = self.timeline(order_id).await?;
        Ok(timeline_steps(&order, &timeline))
    }

    /// The raw events of an order, oldest first.
    pub async fn timeline(&self, order_id: OrderId) -> TrackingResult<Timeline> {
        let events = self
            .store_call("list_for", self.store.list_for(order_id))
            .await?;
        Ok(Timeline::new(events))
    }

    /// Delivery classification of an order right now.
    pub async fn classify(&self, order_id: OrderId) -> TrackingResult<DeliveryStatus> {
        let order = self.load_order(order_id).await?;
        Ok(classify(
            order.status(),
            order.estimated_delivery(),
            order.actual_delivery(),
            self.clock.now(),
        ))
    }

    /// Full view of one order by its internal id.
    pub async fn view(&self, order_id: OrderId) -> TrackingResult<OrderView> {
        let order = self.load_order(order_id).await?;
        let timeline = self.timeline(order_id).await?;
        Ok(OrderView::build(&order, &timeline, self.clock.now()))
    }

    async fn load_order(&self, order_id: OrderId) -> TrackingResult<Order> {
        self.store_call("load", self.store.load(order_id))
            .await?
            .ok_or_else(|| TrackingError::NotFound(order_id.to_string()))
    }

    /// Rebuilds the answer to a request whose event is already stored.
    /// The stored answer to an earlier request with the same key, if this
    /// order has one.
    ///
    /// A key may only be replayed for the status it was first used with.
    async fn replayed(
        &self,
        order: &Order,
        event_id: EventId,
        request: &UpdateStatus,
    ) -> TrackingResult<Option<UpdatedView>> {
        let timeline = self.timeline(order.id()).await?;
        let Some(event) = timeline.events().iter().find(|e| e.event_id == event_id).cloned()
        else {
            return Ok(None);
        };
        if event.status != request.status {
            warn!(
                %event_id,
                recorded = %event.status,
                requested = %request.status,
                "Idempotency key reused for a different status"
            );
            return Err(TrackingError::InvalidInput(format!(
                "idempotency key {event_id} was already used to set status {}",
                event.status
            )));
        }
        debug!(%event_id, "Request replays a stored event");
        Ok(Some(UpdatedView {
            order: OrderView::build(order, &timeline, self.clock.now()),
            event,
            notification: NotificationOutcome::Skipped,
        }))
    }

    async fn updated_view(
        &self,
        stored: StoredOrder,
        notification: NotificationOutcome,
    ) -> TrackingResult<UpdatedView> {
        let timeline = self.timeline(stored.order.id()).await?;
        Ok(UpdatedView {
            order: OrderView::build(&stored.order, &timeline, self.clock.now()),
            event: stored.event,
            notification,
        })
    }

    fn notify(&self, stored: &StoredOrder, previous_status: OrderStatus) -> NotificationOutcome {
        let message = StatusChanged {
            event_id: stored.event.event_id,
            order_id: stored.order.id(),
            order_number: stored.order.order_number().clone(),
            tracking_code: stored.order.tracking_code().clone(),
            previous_status,
            new_status: stored.order.status(),
            timestamp: stored.event.timestamp,
            correction: stored.event.is_correction(),
        };
        match self.notifications.enqueue(message) {
            Ok(()) => NotificationOutcome::Queued,
            Err(_) => NotificationOutcome::Dropped,
        }
    }

    async fn store_call<T, F>(&self, operation: &'static str, call: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>> + Send,
    {
        let timeout = self.config.store_timeout.as_duration();
        if let Ok(result) = tokio::time::timeout(timeout, call).await {
            result
        } else {
            error!(operation, ?timeout, "Order store call timed out");
            Err(StoreError::Timeout(timeout))
        }
    }
}

impl<S> std::fmt::Debug for TrackingService<S>
where
    S: OrderStore,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingService")
            .field("config", &self.config)
            .field("retry_policy", &self.retry_policy)
            .field("notifications", &self.notifications)
            .finish_non_exhaustive()
    }
}

/// Server time for a new event: the clock's reading, pushed just past the
/// previous event when the clock has not moved on.
fn next_timestamp(now: Timestamp, previous: Timestamp) -> Timestamp {
    if now > previous {
        now
    } else {
        Timestamp::new(*previous.as_datetime() + Duration::milliseconds(1))
    }
}
