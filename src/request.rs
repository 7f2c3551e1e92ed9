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

//! Request and response messages exchanged with the engine.

use crate::ReservationError;
use crate::base::{AdmissionTicket, EventId, TicketId};
use crate::event::EventSnapshot;
use std::sync::Arc;

/// Action requested by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    List,
    Reserve,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    List,
    Reserve {
        event_id: EventId,
        quantity: u32,
        /// Minted when the request was built.
        admission: AdmissionTicket,
    },
}

impl Request {
    pub fn action(&self) -> Action {
        match self {
            Self::List => Action::List,
            Self::Reserve { .. } => Action::Reserve,
        }
    }

    pub fn event_id(&self) -> Option<EventId> {
        match self {
            Self::Reserve { event_id, .. } => Some(*event_id),
            Self::List => None,
        }
    }

    pub fn quantity(&self) -> u32 {
        match self {
            Self::Reserve { quantity, .. } => *quantity,
            Self::List => 0,
        }
    }

    pub fn admission(&self) -> Option<AdmissionTicket> {
        match self {
            Self::Reserve { admission, .. } => Some(*admission),
            Self::List => None,
        }
    }
}

/// What a request produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Listed(Arc<Vec<EventSnapshot>>),
    Reserved(Vec<TicketId>),
    Rejected(ReservationError),
}

/// Exactly one of these is sent back for every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Human-readable summary of the outcome.
    pub message: String,
    pub outcome: Outcome,
}

impl Response {
    pub fn listed(events: Arc<Vec<EventSnapshot>>) -> Self {
        Self {
            message: "List of available events".to_string(),
            outcome: Outcome::Listed(events),
        }
    }

    pub fn reserved(event_id: EventId, tickets: Vec<TicketId>) -> Self {
        Self {
            message: format!(
                "Reserved {} ticket(s) for event {event_id}",
                tickets.len()
            ),
            outcome: Outcome::Reserved(tickets),
        }
    }

    pub fn rejected(error: ReservationError) -> Self {
        Self {
            message: error.to_string(),
            outcome: Outcome::Rejected(error),
        }
    }

    /// The event listing, for `List` requests.
    pub fn events(&self) -> Option<&[EventSnapshot]> {
        match &self.outcome {
            Outcome::Listed(events) => Some(events.as_slice()),
            _ => None,
        }
    }

    /// Issued tickets, for successful reservations.
    pub fn tickets(&self) -> Option<&[TicketId]> {
        match &self.outcome {
            Outcome::Reserved(tickets) => Some(tickets.as_slice()),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ReservationError> {
        match &self.outcome {
            Outcome::Rejected(error) => Some(error),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self.outcome, Outcome::Rejected(_))
    }
}
