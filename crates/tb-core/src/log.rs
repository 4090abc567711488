//! The event log: ordered activation intervals with at most one open.

use chrono::{DateTime, Utc};

use crate::error::AccountError;
use crate::event::MeterEvent;
use crate::meter::{Meter, MeterCatalog};
use crate::types::{EventId, ValidationError};

/// Ordered collection of meter events.
///
/// Invariant: at most one event has no end time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventLog {
    events: Vec<MeterEvent>,
}

impl EventLog {
    pub const fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Builds a log from stored events.
    ///
    /// If the data holds several open events, every one except the latest
    /// started is closed at the start of the next open event.
    pub fn from_events(mut events: Vec<MeterEvent>) -> Self {
        let mut open: Vec<usize> = events
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_active())
            .map(|(i, _)| i)
            .collect();
        if open.len() > 1 {
            tracing::warn!(open = open.len(), "stored log has several open events");
            open.sort_by_key(|&i| events[i].start_time);
            for pair in open.windows(2) {
                let next_start = events[pair[1]].start_time;
                events[pair[0]].close(next_start);
            }
        }
        Self { events }
    }

    /// Events in insertion order.
    pub fn events(&self) -> &[MeterEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, id: EventId) -> Option<&MeterEvent> {
        self.events.iter().find(|e| e.id == id)
    }

    /// The running event, if any.
    pub fn active(&self) -> Option<&MeterEvent> {
        self.events.iter().find(|e| e.is_active())
    }

    pub(crate) fn active_mut(&mut self) -> Option<&mut MeterEvent> {
        self.events.iter_mut().find(|e| e.is_active())
    }

    /// Closes any running event and starts a new one for `meter`.
    ///
    /// Returns the ID of the event that was switched away from, if any.
    pub fn activate(
        &mut self,
        meter: &Meter,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> (EventId, Option<EventId>) {
        let switched = self.close_active(now);
        let event = MeterEvent::start(meter, comment, now);
        let id = event.id;
        self.events.push(event);
        (id, switched)
    }

    /// Closes the running event. No-op when nothing runs.
    pub fn deactivate(&mut self, now: DateTime<Utc>) -> Option<&MeterEvent> {
        let event = self.active_mut()?;
        event.close(now);
        Some(&*event)
    }

    fn close_active(&mut self, now: DateTime<Utc>) -> Option<EventId> {
        self.active_mut().map(|event| {
            event.close(now);
            event.id
        })
    }

    /// Removes an event whether it is running or not.
    pub fn delete(&mut self, id: EventId) -> Option<MeterEvent> {
        let index = self.events.iter().position(|e| e.id == id)?;
        Some(self.events.remove(index))
    }

    /// Overwrites the timestamps of a closed event.
    pub fn update_times(
        &mut self,
        id: EventId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<&MeterEvent, AccountError> {
        let event = self
            .events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(AccountError::EventNotFound(id))?;
        if event.is_active() {
            return Err(AccountError::EventActive { id });
        }
        if start >= end {
            return Err(ValidationError::StartNotBeforeEnd.into());
        }
        if end > now {
            return Err(ValidationError::EndInFuture.into());
        }
        event.start_time = start;
        event.end_time = Some(end);
        Ok(&*event)
    }

    /// Closes every running event whose meter is no longer in `catalog`.
    ///
    /// Returns how many events were stopped.
    pub fn auto_stop_orphans(&mut self, catalog: &MeterCatalog, now: DateTime<Utc>) -> usize {
        let mut stopped = 0;
        for event in self.events.iter_mut().filter(|e| e.is_active()) {
            let has_origin = catalog.meters().iter().any(|m| event.originates_from(m));
            if !has_origin {
                tracing::info!(event = %event.id, meter = %event.meter_name, "stopping orphaned event");
                event.close(now);
                stopped += 1;
            }
        }
        stopped
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub(crate) fn into_events(self) -> Vec<MeterEvent> {
        self.events
    }
}
