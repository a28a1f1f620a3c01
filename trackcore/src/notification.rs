//! Status-change notifications.
//!
//! Writers hand a [`StatusChanged`] message to a bounded queue and return
//! immediately. A background worker drains the queue into a
//! [`NotificationDispatcher`]. A persisted status change is never undone
//! because its notification could not be delivered; failures are logged and
//! counted in [`NotificationStats`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::errors::NotificationError;
use crate::status::OrderStatus;
use crate::types::{EventId, OrderId, OrderNumber, Timestamp, TrackingCode};

/// Message sent after every successful status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChanged {
    /// Event that recorded the change
    pub event_id: EventId,
    /// Internal order reference
    pub order_id: OrderId,
    /// Customer-facing order number
    pub order_number: OrderNumber,
    /// Shipment tracking code
    pub tracking_code: TrackingCode,
    /// Status before the change
    pub previous_status: OrderStatus,
    /// Status after the change
    pub new_status: OrderStatus,
    /// Server time of the change
    pub timestamp: Timestamp,
    /// Whether the change skipped statuses under an override
    pub correction: bool,
}

/// Outbound side of notifications: email, SMS, webhooks.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync + 'static {
    /// Delivers one message.
    async fn dispatch(&self, message: &StatusChanged) -> Result<(), NotificationError>;
}

/// Dispatcher that only writes a log line. Useful where no real channel is
/// wired up.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingDispatcher;

#[async_trait]
impl NotificationDispatcher for LoggingDispatcher {
    async fn dispatch(&self, message: &StatusChanged) -> Result<(), NotificationError> {
        info!(
            order_number = %message.order_number,
            from = %message.previous_status,
            to = %message.new_status,
            "Order status changed"
        );
        Ok(())
    }
}

/// What happened to a notification at enqueue time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationOutcome {
    /// Accepted for background delivery.
    Queued,
    /// Not accepted; the status change itself still stands.
    Dropped,
    /// Not sent again: the request replayed a write that already happened.
    Skipped,
}

/// Counters maintained by the queue and its worker.
#[derive(Debug, Default)]
pub struct NotificationStats {
    enqueued: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time copy of [`NotificationStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NotificationStatsSnapshot {
    /// Messages accepted by the queue
    pub enqueued: u64,
    /// Messages the dispatcher accepted
    pub delivered: u64,
    /// Messages the dispatcher failed or timed out on
    pub failed: u64,
    /// Messages refused because the queue was full or closed
    pub dropped: u64,
}

impl NotificationStats {
    /// Reads all counters.
    pub fn snapshot(&self) -> NotificationStatsSnapshot {
        NotificationStatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Bounded queue in front of a dispatcher, drained by a spawned worker.
pub struct NotificationQueue {
    sender: mpsc::Sender<StatusChanged>,
    stats: Arc<NotificationStats>,
    worker: JoinHandle<()>,
}

impl NotificationQueue {
    /// Starts the worker. Must be called from within a Tokio runtime.
    pub fn spawn(
        dispatcher: Arc<dyn NotificationDispatcher>,
        capacity: usize,
        dispatch_timeout: Duration,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let stats = Arc::new(NotificationStats::default());
        let worker = tokio::spawn(run_worker(
            receiver,
            dispatcher,
            Arc::clone(&stats),
            dispatch_timeout,
        ));
        Self {
            sender,
            stats,
            worker,
        }
    }

    /// Hands a message to the worker without waiting.
    pub fn enqueue(&self, message: StatusChanged) -> Result<(), NotificationError> {
        match self.sender.try_send(message) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(message)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    order_number = %message.order_number,
                    status = %message.new_status,
                    "Notification queue full, dropping message"
                );
                Err(NotificationError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(message)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    order_number = %message.order_number,
                    "Notification queue closed, dropping message"
                );
                Err(NotificationError::QueueClosed)
            }
        }
    }

    /// Live counters.
    pub fn stats(&self) -> NotificationStatsSnapshot {
        self.stats.snapshot()
    }

    /// Closes the queue and waits for the worker to deliver what is already
    /// queued.
    pub async fn shutdown(self) -> NotificationStatsSnapshot {
        let Self {
            sender,
            stats,
            worker,
        } = self;
        drop(sender);
        if let Err(e) = worker.await {
            error!("Notification worker ended abnormally: {}", e);
        }
        stats.snapshot()
    }
}

impl std::fmt::Debug for NotificationQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationQueue")
            .field("capacity", &self.sender.max_capacity())
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

async fn run_worker(
    mut receiver: mpsc::Receiver<StatusChanged>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    stats: Arc<NotificationStats>,
    dispatch_timeout: Duration,
) {
    debug!("Notification worker started");
    while let Some(message) = receiver.recv().await {
        match tokio::time::timeout(dispatch_timeout, dispatcher.dispatch(&message)).await {
            Ok(Ok(())) => {
                stats.delivered.fetch_add(1, Ordering::Relaxed);
                debug!(order_number = %message.order_number, "Notification delivered");
            }
            Ok(Err(e)) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    order_number = %message.order_number,
                    status = %message.new_status,
                    error = %e,
                    "Notification delivery failed"
                );
            }
            Err(_) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    order_number = %message.order_number,
                    error = %NotificationError::Timeout(dispatch_timeout),
                    "Notification delivery failed"
                );
            }
        }
    }
    debug!("Notification worker stopped");
}
