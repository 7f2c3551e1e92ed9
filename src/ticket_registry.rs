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

//! Append-only record of issued tickets.
//!
//! Maps every issued ticket ID to the event it belongs to, while keeping
//! the order in which tickets were recorded.

use crate::ReservationError;
use crate::base::{EventId, TicketId};
use crossbeam::queue::SegQueue;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// A thread-safe ticket registry with duplicate detection.
///
/// Combines a [`DashMap`] for O(1) ownership lookup with a [`SegQueue`]
/// to preserve issue order.
#[derive(Debug)]
pub struct TicketRegistry {
    /// Owning event of each issued ticket.
    owners: DashMap<TicketId, EventId>,

    /// Ticket IDs in the order they were recorded.
    issued: SegQueue<TicketId>,
}

impl TicketRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self {
            owners: DashMap::new(),
            issued: SegQueue::new(),
        }
    }

    /// Records a ticket as issued for `event_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::DuplicateTicket`] if the ticket ID is
    /// already registered.
    pub fn record(&self, ticket_id: TicketId, event_id: EventId) -> Result<(), ReservationError> {
        // Use entry API for atomic check-and-insert to prevent race conditions
        match self.owners.entry(ticket_id) {
            Entry::Occupied(_) => Err(ReservationError::DuplicateTicket),
            Entry::Vacant(entry) => {
                entry.insert(event_id);
                self.issued.push(ticket_id);
                Ok(())
            }
        }
    }

    /// Returns the event a ticket was issued for.
    pub fn owner(&self, ticket_id: &TicketId) -> Option<EventId> {
        self.owners.get(ticket_id).map(|entry| *entry.value())
    }

    /// Number of tickets issued for `event_id`.
    pub fn issued_for(&self, event_id: EventId) -> usize {
        self.owners
            .iter()
            .filter(|entry| *entry.value() == event_id)
            .count()
    }

    /// Total number of issued tickets.
    pub fn len(&self) -> usize {
        self.issued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issued.is_empty()
    }
}

impl Default for TicketRegistry {
    fn default() -> Self {
        Self::new()
    }
}
