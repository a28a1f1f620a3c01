//! Controllable collaborators for tests.

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::Notify;

use crate::clock::Clock;
use crate::errors::NotificationError;
use crate::notification::{NotificationDispatcher, StatusChanged};
use crate::types::Timestamp;

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    millis: AtomicI64,
}

impl FixedClock {
    /// A clock stopped at the given Unix time in milliseconds.
    pub const fn at_millis(millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(millis),
        }
    }

    /// A clock stopped at `timestamp`.
    pub fn at(timestamp: Timestamp) -> Self {
        Self::at_millis(timestamp.epoch_millis())
    }

    /// Wraps the clock for injection.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: chrono::Duration) {
        self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }

    /// Moves the clock to `timestamp`.
    pub fn set(&self, timestamp: Timestamp) {
        self.millis.store(timestamp.epoch_millis(), Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        let millis = self.millis.load(Ordering::SeqCst);
        Timestamp::new(
            Utc.timestamp_millis_opt(millis)
                .single()
                .expect("FixedClock holds a representable time"),
        )
    }
}

/// Dispatcher that keeps every message it receives.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    messages: RwLock<Vec<StatusChanged>>,
    arrived: Notify,
}

impl RecordingDispatcher {
    /// Creates an empty recorder.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Messages received so far, in arrival order.
    pub fn messages(&self) -> Vec<StatusChanged> {
        self.messages.read().expect("RwLock poisoned").clone()
    }

    /// Waits until at least `count` messages arrived or `timeout` passed,
    /// and returns what arrived.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<StatusChanged> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.arrived.notified();
            let current = self.messages();
            if current.len() >= count {
                return current;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.messages();
            }
        }
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn dispatch(&self, message: &StatusChanged) -> Result<(), NotificationError> {
        self.messages
            .write()
            .expect("RwLock poisoned")
            .push(message.clone());
        self.arrived.notify_waiters();
        Ok(())
    }
}

/// Dispatcher that fails every message.
#[derive(Debug, Default)]
pub struct FailingDispatcher {
    attempts: AtomicUsize,
}

impl FailingDispatcher {
    /// Creates a failing dispatcher.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of delivery attempts made.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationDispatcher for FailingDispatcher {
    async fn dispatch(&self, _message: &StatusChanged) -> Result<(), NotificationError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(NotificationError::DeliveryFailed(
            "dispatcher configured to fail".to_string(),
        ))
    }
}
