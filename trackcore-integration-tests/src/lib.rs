//! Integration tests for `TrackCore`
//!
//! This crate holds tests that drive [`trackcore::TrackingService`] against
//! the in-memory store, plus a store wrapper that injects faults on demand.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::significant_drop_tightening)]

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Once, RwLock};

use async_trait::async_trait;
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{debug, Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use trackcore::errors::{StoreError, StoreResult};
use trackcore::store::{OrderStore, StoredOrder, TimelineStore};
use trackcore::testing::fixtures::{FixedClock, RecordingDispatcher};
use trackcore::{
    CustomerEmail, NewTimelineEvent, NotificationDispatcher, Order, OrderId, OrderNumber,
    OrderVersion, TimelineEvent, Timestamp, TrackingCode, TrackingConfig, TrackingService,
};
use trackcore_memory::InMemoryOrderStore;

/// 2024-06-01 09:00:00 UTC, the start of every scenario.
pub const SCENARIO_START_MS: i64 = 1_717_232_400_000;

static TRACING: Once = Once::new();

/// Routes `tracing` output through the test harness, filtered by `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// One captured log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedEvent {
    /// Level the event was logged at
    pub level: Level,
    /// The event's message
    pub message: String,
    /// Every other field, rendered with `Debug`
    pub fields: Vec<(String, String)>,
}

impl CapturedEvent {
    /// The rendered value of `name`, if the event carried it.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Layer that records events so tests can assert on what was logged.
///
/// Installed per thread, so use it from current-thread runtimes.
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl LogCapture {
    /// Makes a capture the thread's default subscriber until the guard drops.
    pub fn install() -> (Self, DefaultGuard) {
        let capture = Self::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());
        (capture, tracing::subscriber::set_default(subscriber))
    }

    /// Everything captured so far.
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().expect("Mutex poisoned").clone()
    }

    /// Captured events with exactly this message.
    pub fn with_message(&self, message: &str) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.message == message)
            .collect()
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push((field.name().to_string(), value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push((field.name().to_string(), format!("{value:?}")));
        }
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        self.events
            .lock()
            .expect("Mutex poisoned")
            .push(CapturedEvent {
                level: *event.metadata().level(),
                message: visitor.message,
                fields: visitor.fields,
            });
    }
}

/// What [`FaultyStore`] does to the calls it forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fault {
    /// Forward everything
    #[default]
    None,
    /// Appends never complete
    StallAppends,
    /// Every call never completes
    StallAll,
    /// The next appends fail with `Unavailable`; the count is set with
    /// [`FaultyStore::fail_appends`]
    UnavailableAppends,
    /// Every append loses a race
    ConflictingAppends,
}

/// Store wrapper that injects faults in front of another store.
#[derive(Debug, Clone)]
pub struct FaultyStore<S = InMemoryOrderStore> {
    inner: S,
    fault: Arc<RwLock<Fault>>,
    failures_left: Arc<AtomicU32>,
    appends_seen: Arc<AtomicU32>,
}

impl<S> FaultyStore<S>
where
    S: OrderStore,
{
    /// Wraps `inner` without any fault.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fault: Arc::new(RwLock::new(Fault::None)),
            failures_left: Arc::new(AtomicU32::new(0)),
            appends_seen: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Switches the injected fault.
    pub fn set_fault(&self, fault: Fault) {
        *self.fault.write().expect("RwLock poisoned") = fault;
    }

    /// Fails the next `count` appends with `Unavailable`, then forwards.
    pub fn fail_appends(&self, count: u32) {
        self.failures_left.store(count, Ordering::SeqCst);
        self.set_fault(Fault::UnavailableAppends);
    }

    /// Number of append calls received, faulted or not.
    pub fn appends_seen(&self) -> u32 {
        self.appends_seen.load(Ordering::SeqCst)
    }

    /// The wrapped store.
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    fn fault(&self) -> Fault {
        *self.fault.read().expect("RwLock poisoned")
    }

    async fn before_read(&self) {
        if self.fault() == Fault::StallAll {
            std::future::pending::<()>().await;
        }
    }
}

#[async_trait]
impl<S> TimelineStore for FaultyStore<S>
where
    S: OrderStore,
{
    async fn append(
        &self,
        order_id: OrderId,
        expected: OrderVersion,
        event: NewTimelineEvent,
    ) -> StoreResult<StoredOrder> {
        self.appends_seen.fetch_add(1, Ordering::SeqCst);
        match self.fault() {
            Fault::StallAppends | Fault::StallAll => std::future::pending().await,
            Fault::UnavailableAppends => {
                let had_budget = self
                    .failures_left
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                    .is_ok();
                if had_budget {
                    debug!(%order_id, "Injecting unavailable store");
                    return Err(StoreError::Unavailable("injected outage".to_string()));
                }
                self.inner.append(order_id, expected, event).await
            }
            Fault::ConflictingAppends => {
                let current = self
                    .inner
                    .load(order_id)
                    .await?
                    .map(|order| order.version())
                    .ok_or(StoreError::OrderNotFound(order_id))?;
                Err(StoreError::VersionConflict {
                    order_id,
                    expected: current,
                    current: current.next(),
                })
            }
            Fault::None => self.inner.append(order_id, expected, event).await,
        }
    }

    async fn list_for(&self, order_id: OrderId) -> StoreResult<Vec<TimelineEvent>> {
        self.before_read().await;
        self.inner.list_for(order_id).await
    }
}

#[async_trait]
impl<S> OrderStore for FaultyStore<S>
where
    S: OrderStore,
{
    async fn create(&self, order: Order, initial: TimelineEvent) -> StoreResult<StoredOrder> {
        self.before_read().await;
        self.inner.create(order, initial).await
    }

    async fn load(&self, order_id: OrderId) -> StoreResult<Option<Order>> {
        self.before_read().await;
        self.inner.load(order_id).await
    }

    async fn find_by_order_number(&self, number: &OrderNumber) -> StoreResult<Option<Order>> {
        self.before_read().await;
        self.inner.find_by_order_number(number).await
    }

    async fn find_by_tracking_code(&self, code: &TrackingCode) -> StoreResult<Option<Order>> {
        self.before_read().await;
        self.inner.find_by_tracking_code(code).await
    }

    async fn find_by_email(&self, email: &CustomerEmail) -> StoreResult<Vec<Order>> {
        self.before_read().await;
        self.inner.find_by_email(email).await
    }
}

/// A service over `store` with a stopped clock at [`SCENARIO_START_MS`] and
/// a recording dispatcher.
pub struct Harness<S>
where
    S: OrderStore,
{
    /// The service under test
    pub service: TrackingService<S>,
    /// The service's clock
    pub clock: Arc<FixedClock>,
    /// Every notification the service sent
    pub dispatcher: Arc<RecordingDispatcher>,
}

impl<S> Harness<S>
where
    S: OrderStore,
{
    /// Builds a harness with the given configuration.
    pub fn with_config(store: Arc<S>, config: TrackingConfig) -> Self {
        init_tracing();
        let clock = FixedClock::at_millis(SCENARIO_START_MS).shared();
        let dispatcher = RecordingDispatcher::new();
        let notifications: Arc<dyn NotificationDispatcher> = dispatcher.clone();
        let service = TrackingService::new(store, notifications, config).with_clock(clock.clone());
        Self {
            service,
            clock,
            dispatcher,
        }
    }

    /// Builds a harness with default configuration.
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, TrackingConfig::default())
    }

    /// The clock's current reading.
    pub fn now(&self) -> Timestamp {
        trackcore::Clock::now(self.clock.as_ref())
    }
}

/// A harness over a fresh in-memory store.
pub fn memory_harness() -> Harness<InMemoryOrderStore> {
    Harness::new(Arc::new(InMemoryOrderStore::new()))
}
