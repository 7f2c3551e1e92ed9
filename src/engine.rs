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

//! Reservation engine.
//!
//! The [`ReservationEngine`] owns the events, the registry of issued tickets
//! and the cached event listing. It enforces the booking protocol:
//!
//! 1. Look up the event.
//! 2. Wait for the attempt's admission turn (bounded by
//!    [`EngineConfig::admission_timeout`]).
//! 3. Advance the turn, whether or not the booking goes through.
//! 4. Check availability and take the tickets, all or nothing.
//! 5. Mint one ticket ID per seat and record it against the event.
//!
//! # Thread Safety
//!
//! Each event has its own lock, so bookings on different events proceed in
//! parallel. Listings are served from a [`ListCache`] that is patched on every
//! write, so readers never wait on bookings and always see completed writes.
//!
//! Lock order is event lock, then cache lock.

use crate::ReservationError;
use crate::base::{AdmissionTicket, EventId, TicketId};
use crate::config::EngineConfig;
use crate::event::{Event, EventSnapshot};
use crate::event_store::EventStore;
use crate::list_cache::ListCache;
use crate::request::{Request, Response};
use crate::ticket_registry::TicketRegistry;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Ticket reservation engine.
///
/// # Invariants
///
/// - `0 <= available <= total` for every event.
/// - `total - available` equals the number of tickets recorded for the event.
/// - Attempts on one event are admitted in ascending admission-ticket order.
#[derive(Debug, Default)]
pub struct ReservationEngine {
    events: EventStore,
    tickets: TicketRegistry,
    cache: ListCache,
    config: EngineConfig,
}

impl ReservationEngine {
    /// Creates an engine with no events and the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Creates an event and adds it to the cached listing.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::DuplicateId`] - the minted ID is already taken.
    pub fn create_event(
        &self,
        name: impl Into<String>,
        date: DateTime<Utc>,
        total_tickets: u32,
    ) -> Result<Arc<Event>, ReservationError> {
        let event = self.events.create(name, date, total_tickets)?;
        event.with_snapshot(|snapshot| self.cache.upsert(snapshot));

        tracing::info!(
            event_id = %event.id(),
            name = event.name(),
            total_tickets,
            "Created event"
        );
        Ok(event)
    }

    /// Retrieves an event by ID.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::NotFound`] - no event has this ID.
    pub fn get_event(&self, id: EventId) -> Result<Arc<Event>, ReservationError> {
        self.events.load(id)
    }

    pub fn events(&self) -> &EventStore {
        &self.events
    }

    pub fn tickets(&self) -> &TicketRegistry {
        &self.tickets
    }

    /// Hands out the next admission ticket for `event_id`.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::NotFound`] - no event has this ID.
    pub fn issue_admission(&self, event_id: EventId) -> Result<AdmissionTicket, ReservationError> {
        Ok(self.events.load(event_id)?.issue_admission())
    }

    /// Builds a reservation request, minting its admission ticket.
    ///
    /// The request must be passed to [`handle`](Self::handle) or submitted
    /// to a dispatcher. Dropping it leaves its admission number unused, and
    /// the event's next attempt then waits out one admission timeout before
    /// skipping it.
    ///
    /// An unknown event gets admission `#0`; booking it fails with
    /// [`ReservationError::NotFound`] before the ticket is looked at.
    pub fn reserve_request(&self, event_id: EventId, quantity: u32) -> Request {
        let admission = self.issue_admission(event_id).unwrap_or_default();
        Request::Reserve {
            event_id,
            quantity,
            admission,
        }
    }

    /// Returns every event, ordered by ID.
    ///
    /// Served from the cache; concurrent callers that find it empty share a
    /// single reload.
    pub fn list_events(&self) -> Arc<Vec<EventSnapshot>> {
        self.cache.get_or_load(|| self.events.snapshots())
    }

    /// Drops the cached listing.
    pub fn invalidate_listing(&self) {
        self.cache.invalidate();
    }

    /// Books `quantity` tickets for the attempt holding `admission`.
    ///
    /// Blocks until the attempt's turn arrives. Returns one fresh ticket ID
    /// per seat, or an error with no inventory change.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::NotFound`] - no event has this ID.
    /// - [`ReservationError::InvalidAdmission`] - `admission` was not issued by
    ///   the event or has already been used.
    /// - [`ReservationError::AdmissionTimeout`] - the turn did not arrive in time.
    /// - [`ReservationError::InvalidQuantity`] - `quantity` is zero.
    /// - [`ReservationError::InsufficientInventory`] - not enough tickets left.
    pub fn book_tickets(
        &self,
        event_id: EventId,
        quantity: u32,
        admission: AdmissionTicket,
    ) -> Result<Vec<TicketId>, ReservationError> {
        let event = self.events.load(event_id)?;

        let mut admitted = event.admit(admission, self.config.admission_timeout)?;
        admitted.take(quantity)?;
        // Patch under the event lock so cache updates land in admission order.
        self.cache.upsert(admitted.snapshot());
        let remaining = admitted.available();
        drop(admitted);

        let tickets: Vec<TicketId> = (0..quantity).map(|_| self.issue_ticket(event_id)).collect();

        tracing::debug!(
            %event_id,
            %admission,
            quantity,
            remaining,
            "Booked tickets"
        );
        Ok(tickets)
    }

    /// Mints and records a ticket ID, regenerating on collision.
    fn issue_ticket(&self, event_id: EventId) -> TicketId {
        loop {
            let ticket_id = TicketId::new();
            match self.tickets.record(ticket_id, event_id) {
                Ok(()) => return ticket_id,
                Err(e) => tracing::warn!(%ticket_id, error = %e, "Regenerating ticket ID"),
            }
        }
    }

    /// Runs a request and produces its response. Never fails: errors are
    /// reported inside the response.
    pub fn handle(&self, request: Request) -> Response {
        match request {
            Request::List => Response::listed(self.list_events()),
            Request::Reserve {
                event_id,
                quantity,
                admission,
            } => match self.book_tickets(event_id, quantity, admission) {
                Ok(tickets) => Response::reserved(event_id, tickets),
                Err(e) => {
                    tracing::info!(%event_id, quantity, %admission, error = %e, "Reservation rejected");
                    Response::rejected(e)
                }
            },
        }
    }
}
