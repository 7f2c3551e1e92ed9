// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Keyed collection of events.

use crate::ReservationError;
use crate::base::EventId;
use crate::event::{Event, EventSnapshot};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe event store.
///
/// IDs come from an atomic sequence and insertion uses the [`DashMap`] entry
/// API, so concurrent creators never race on the same ID. Events are handed
/// out as [`Arc`]s: callers that block on an event's turn do not hold a map
/// shard lock while doing so.
#[derive(Debug, Default)]
pub struct EventStore {
    events: DashMap<EventId, Arc<Event>>,
    next_id: AtomicU64,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an event with all of its tickets available.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::DuplicateId`] if the minted ID is already
    /// present, which only happens if the sequence wraps.
    pub fn create(
        &self,
        name: impl Into<String>,
        date: DateTime<Utc>,
        total_tickets: u32,
    ) -> Result<Arc<Event>, ReservationError> {
        let id = EventId(self.next_id.fetch_add(1, Ordering::Relaxed));

        match self.events.entry(id) {
            Entry::Occupied(_) => Err(ReservationError::DuplicateId),
            Entry::Vacant(entry) => {
                let event = Arc::new(Event::new(id, name, date, total_tickets));
                entry.insert(Arc::clone(&event));
                Ok(event)
            }
        }
    }

    /// Looks up an event.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::NotFound`] for an unknown ID.
    pub fn load(&self, id: EventId) -> Result<Arc<Event>, ReservationError> {
        self.events
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(ReservationError::NotFound)
    }

    /// Snapshots of every event, ordered by ID.
    pub fn snapshots(&self) -> Vec<EventSnapshot> {
        let events: Vec<Arc<Event>> = self
            .events
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        // Shard locks are released before any event lock is taken.
        let mut snapshots: Vec<EventSnapshot> = events.iter().map(|e| e.snapshot()).collect();
        snapshots.sort_unstable_by_key(|snapshot| snapshot.id);
        snapshots
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn create_assigns_sequential_ids() {
        let store = EventStore::new();
        let a = store.create("a", Utc::now(), 1).unwrap();
        let b = store.create("b", Utc::now(), 2).unwrap();
        assert_eq!(a.id(), EventId(0));
        assert_eq!(b.id(), EventId(1));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn load_unknown_is_not_found() {
        let store = EventStore::new();
        assert!(matches!(
            store.load(EventId(9)),
            Err(ReservationError::NotFound)
        ));
    }

    #[test]
    fn occupied_id_is_duplicate() {
        let store = EventStore::new();
        store.create("a", Utc::now(), 1).unwrap();
        // Rewind the sequence to collide with the existing entry.
        store.next_id.store(0, Ordering::Relaxed);
        assert!(matches!(
            store.create("b", Utc::now(), 1),
            Err(ReservationError::DuplicateId)
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn snapshots_are_sorted() {
        let store = EventStore::new();
        for i in 0..20 {
            store.create(format!("event{i}"), Utc::now(), i).unwrap();
        }
        let ids: Vec<u64> = store.snapshots().iter().map(|s| s.id.0).collect();
        assert_eq!(ids, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn concurrent_creation_yields_unique_ids() {
        let store = EventStore::new();
        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..50 {
                        store.create("e", Utc::now(), 1).unwrap();
                    }
                });
            }
        });

        let ids: HashSet<EventId> = store.snapshots().into_iter().map(|s| s.id).collect();
        assert_eq!(ids.len(), 400);
        assert_eq!(store.len(), 400);
    }
}
