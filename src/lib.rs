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

//! # Ticket Reservation
//!
//! This library provides a reservation engine for ticketed events: many
//! callers reserve from a limited, shared pool of tickets concurrently without
//! overselling, while others read a cached listing of all events.
//!
//! ## Core Components
//!
//! - [`ReservationEngine`]: Event creation, listing and the booking protocol
//! - [`Event`]: Inventory record with turn-ordered admission
//! - [`ListCache`]: Single-flight cache of the event listing
//! - [`TicketRegistry`]: Append-only record of issued tickets
//! - [`Dispatcher`]: Worker pool answering [`Request`]s with [`Response`]s
//! - [`ReservationError`]: Error types for reservation failures
//!
//! ## Example
//!
//! ```
//! use chrono::Utc;
//! use ticket_reservation_rs::{ReservationEngine, ReservationError};
//!
//! let engine = ReservationEngine::new();
//! let event = engine.create_event("concert", Utc::now(), 5).unwrap();
//!
//! // Each attempt takes an admission ticket, then books with it.
//! let admission = engine.issue_admission(event.id()).unwrap();
//! let tickets = engine.book_tickets(event.id(), 5, admission).unwrap();
//! assert_eq!(tickets.len(), 5);
//!
//! let admission = engine.issue_admission(event.id()).unwrap();
//! let result = engine.book_tickets(event.id(), 1, admission);
//! assert_eq!(result, Err(ReservationError::InsufficientInventory));
//! ```
//!
//! ## Thread Safety
//!
//! Every event carries its own lock, so bookings on different events run in
//! parallel. Attempts on the same event are admitted strictly in the order
//! their admission tickets were issued.

mod base;
pub mod config;
mod dispatcher;
mod engine;
pub mod error;
pub mod event;
mod event_store;
mod list_cache;
mod request;
mod ticket_registry;

pub use base::{AdmissionTicket, EventId, TicketId};
pub use config::{DispatcherConfig, EngineConfig};
pub use dispatcher::{Client, Dispatcher, ResponseHandle};
pub use engine::ReservationEngine;
pub use error::{DispatchError, ReservationError};
pub use event::{Admission, Event, EventSnapshot};
pub use event_store::EventStore;
pub use list_cache::ListCache;
pub use request::{Action, Outcome, Request, Response};
pub use ticket_registry::TicketRegistry;
