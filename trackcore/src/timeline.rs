//! Timeline events: the append-only history of an order's status changes.
//!
//! An order's timeline holds exactly one event per status it has occupied,
//! in strictly ascending timestamp order. The first event is always the
//! `pending` event written together with the order; the last event's status
//! is the order's current status.

use serde::{Deserialize, Serialize};

use crate::status::{OrderStatus, TransitionKind};
use crate::types::{Actor, EventId, Location, Note, OrderId, OrderVersion, Timestamp};

/// A status change that has been validated but not yet persisted.
///
/// The store assigns the order id, version and previous status when it
/// appends the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTimelineEvent {
    /// Unique id of the event; doubles as the idempotency key
    pub event_id: EventId,
    /// Status the order enters
    pub status: OrderStatus,
    /// How the transition was classified
    pub kind: TransitionKind,
    /// Server time of the change
    pub timestamp: Timestamp,
    /// Optional operator note
    pub note: Option<Note>,
    /// Optional place of the change
    pub location: Option<Location>,
    /// Who triggered the change
    pub actor: Actor,
    /// Delivery estimate scheduled by this change, if any
    pub estimated_delivery: Option<Timestamp>,
}

impl NewTimelineEvent {
    /// A plain status change with a fresh event id.
    pub fn new(status: OrderStatus, kind: TransitionKind, timestamp: Timestamp) -> Self {
        Self {
            event_id: EventId::new(),
            status,
            kind,
            timestamp,
            note: None,
            location: None,
            actor: Actor::System,
            estimated_delivery: None,
        }
    }

    /// Uses the given id instead of a fresh one.
    #[must_use]
    pub const fn with_event_id(mut self, event_id: EventId) -> Self {
        self.event_id = event_id;
        self
    }

    /// Attaches an operator note.
    #[must_use]
    pub fn with_note(mut self, note: Option<Note>) -> Self {
        self.note = note;
        self
    }

    /// Attaches a location.
    #[must_use]
    pub fn with_location(mut self, location: Option<Location>) -> Self {
        self.location = location;
        self
    }

    /// Records who triggered the change.
    #[must_use]
    pub fn with_actor(mut self, actor: Actor) -> Self {
        self.actor = actor;
        self
    }

    /// Schedules a delivery estimate.
    #[must_use]
    pub const fn with_estimated_delivery(mut self, estimate: Option<Timestamp>) -> Self {
        self.estimated_delivery = estimate;
        self
    }
}

/// A persisted status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
    /// Unique id of the event
    pub event_id: EventId,
    /// Order the event belongs to
    pub order_id: OrderId,
    /// Position in the order's timeline, starting at 1
    pub version: OrderVersion,
    /// Status the order entered
    pub status: OrderStatus,
    /// Status before the change; `None` for the creation event
    pub previous_status: Option<OrderStatus>,
    /// Server time of the change
    pub timestamp: Timestamp,
    /// Optional operator note
    pub note: Option<Note>,
    /// Optional place of the change
    pub location: Option<Location>,
    /// Who triggered the change
    pub actor: Actor,
    /// How the transition was classified
    pub kind: TransitionKind,
    /// Delivery estimate scheduled by this change, if any
    pub estimated_delivery: Option<Timestamp>,
}

impl TimelineEvent {
    /// Stamps a pending change with its place in the order's timeline.
    pub fn stamp(
        event: NewTimelineEvent,
        order_id: OrderId,
        version: OrderVersion,
        previous_status: Option<OrderStatus>,
    ) -> Self {
        Self {
            event_id: event.event_id,
            order_id,
            version,
            status: event.status,
            previous_status,
            timestamp: event.timestamp,
            note: event.note,
            location: event.location,
            actor: event.actor,
            kind: event.kind,
            estimated_delivery: event.estimated_delivery,
        }
    }

    /// Whether this event was an administrative correction.
    pub const fn is_correction(&self) -> bool {
        self.kind.is_correction()
    }
}

/// Read-only view over an order's events, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timeline(Vec<TimelineEvent>);

impl Timeline {
    /// Wraps events, sorting them by timestamp.
    pub fn new(mut events: Vec<TimelineEvent>) -> Self {
        events.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.version.cmp(&b.version))
        });
        Self(events)
    }

    /// All events, oldest first.
    pub fn events(&self) -> &[TimelineEvent] {
        &self.0
    }

    /// Most recent event.
    pub fn latest(&self) -> Option<&TimelineEvent> {
        self.0.last()
    }

    /// The event that moved the order into `status`, if it ever got there.
    pub fn entered(&self, status: OrderStatus) -> Option<&TimelineEvent> {
        self.0.iter().find(|event| event.status == status)
    }

    /// Whether an event with this id is part of the timeline.
    pub fn contains(&self, event_id: &EventId) -> bool {
        self.0.iter().any(|event| &event.event_id == event_id)
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no events.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Checks the timeline's structural rules: strictly ascending
    /// timestamps, one event per status, versions counting up from 1 and
    /// each event's previous status matching the one before it.
    pub fn is_well_formed(&self) -> bool {
        let mut seen = Vec::with_capacity(self.0.len());
        let mut expected_version = OrderVersion::initial();
        let mut previous: Option<&TimelineEvent> = None;
        for event in &self.0 {
            expected_version = expected_version.next();
            if event.version != expected_version || seen.contains(&event.status) {
                return false;
            }
            if let Some(prev) = previous {
                if event.timestamp <= prev.timestamp
                    || event.previous_status != Some(prev.status)
                {
                    return false;
                }
            } else if event.previous_status.is_some() {
                return false;
            }
            seen.push(event.status);
            previous = Some(event);
        }
        true
    }
}

impl IntoIterator for Timeline {
    type Item = TimelineEvent;
    type IntoIter = std::vec::IntoIter<TimelineEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<Vec<TimelineEvent>> for Timeline {
    fn from(events: Vec<TimelineEvent>) -> Self {
        Self::new(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn at(minutes: i64) -> Timestamp {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        Timestamp::new(start + Duration::minutes(minutes))
    }

    fn history(order_id: OrderId, steps: &[(OrderStatus, i64)]) -> Vec<TimelineEvent> {
        let mut version = OrderVersion::initial();
        let mut previous = None;
        steps
            .iter()
            .map(|&(status, minute)| {
                version = version.next();
                let kind = if previous.is_none() {
                    TransitionKind::Created
                } else {
                    TransitionKind::Advance
                };
                let event = TimelineEvent::stamp(
                    NewTimelineEvent::new(status, kind, at(minute)),
                    order_id,
                    version,
                    previous,
                );
                previous = Some(status);
                event
            })
            .collect()
    }

    #[test]
    fn new_sorts_by_timestamp() {
        let order_id = OrderId::new();
        let mut events = history(
            order_id,
            &[(OrderStatus::Pending, 0), (OrderStatus::Confirmed, 5), (OrderStatus::Processing, 9)],
        );
        events.reverse();
        let timeline = Timeline::new(events);

        let statuses: Vec<_> = timeline.events().iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![OrderStatus::Pending, OrderStatus::Confirmed, OrderStatus::Processing]
        );
        assert_eq!(timeline.latest().map(|e| e.status), Some(OrderStatus::Processing));
        assert!(timeline.is_well_formed());
    }

    #[test]
    fn entered_finds_the_event_for_a_status() {
        let order_id = OrderId::new();
        let timeline = Timeline::new(history(
            order_id,
            &[(OrderStatus::Pending, 0), (OrderStatus::Confirmed, 5)],
        ));
        assert_eq!(
            timeline.entered(OrderStatus::Confirmed).map(|e| e.timestamp),
            Some(at(5))
        );
        assert!(timeline.entered(OrderStatus::Shipped).is_none());
    }

    #[test]
    fn equal_timestamps_are_not_well_formed() {
        let order_id = OrderId::new();
        let timeline = Timeline::new(history(
            order_id,
            &[(OrderStatus::Pending, 3), (OrderStatus::Confirmed, 3)],
        ));
        assert!(!timeline.is_well_formed());
    }

    #[test]
    fn repeated_status_is_not_well_formed() {
        let order_id = OrderId::new();
        let timeline = Timeline::new(history(
            order_id,
            &[(OrderStatus::Pending, 0), (OrderStatus::Pending, 1)],
        ));
        assert!(!timeline.is_well_formed());
    }

    #[test]
    fn contains_matches_event_ids() {
        let order_id = OrderId::new();
        let events = history(order_id, &[(OrderStatus::Pending, 0)]);
        let id = events[0].event_id;
        let timeline = Timeline::new(events);
        assert!(timeline.contains(&id));
        assert!(!timeline.contains(&EventId::new()));
    }
}
