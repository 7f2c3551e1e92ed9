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

//! Event inventory records and turn-ordered admission.
//!
//! Every reservation attempt on an event carries an [`AdmissionTicket`]
//! obtained from [`Event::issue_admission`]. [`Event::admit`] blocks until
//! the event's turn reaches that ticket, then hands back an [`Admission`]
//! holding the event lock:
//!
//! ```text
//!  issue_admission ──► #k ──admit──► wait (turn == k) ──► lock held, turn = k+1
//!                                         │                      │
//!                                         │                      └─take(n)──► available -= n
//!                                         └─deadline──► abandoned (turn skips k)
//! ```
//!
//! A waiter whose deadline passes while the turn has not moved at all also
//! skips the number the turn is stuck on, so an admission that is issued
//! but never used delays its event by at most one timeout.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use chrono::Utc;
//! use ticket_reservation_rs::{Event, EventId};
//!
//! let event = Event::new(EventId(0), "concert", Utc::now(), 10);
//! let ticket = event.issue_admission();
//!
//! let mut admission = event.admit(ticket, Duration::from_secs(1)).unwrap();
//! admission.take(4).unwrap();
//! drop(admission);
//!
//! assert_eq!(event.available_tickets(), 6);
//! ```

use crate::ReservationError;
use crate::base::{AdmissionTicket, EventId};
use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Mutable state guarded by the event lock.
#[derive(Debug)]
struct EventData {
    total: u32,
    available: u32,
    /// Next admission number allowed through.
    turn: u64,
    /// Admission numbers whose waiters gave up; the turn skips them.
    abandoned: BTreeSet<u64>,
}

impl EventData {
    fn new(total: u32) -> Self {
        Self {
            total,
            available: total,
            turn: 0,
            abandoned: BTreeSet::new(),
        }
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.available <= self.total,
            "Invariant violated: available {} exceeds total {}",
            self.available,
            self.total
        );
        debug_assert!(
            self.abandoned.first().is_none_or(|&first| first > self.turn),
            "Invariant violated: abandoned admission at or behind turn {}",
            self.turn
        );
    }

    /// Moves the turn past the current holder and any abandoned numbers.
    fn advance_turn(&mut self) {
        self.turn += 1;
        while self.abandoned.remove(&self.turn) {
            self.turn += 1;
        }
        self.assert_invariants();
    }

    /// Marks a waiting admission number as given up.
    fn abandon(&mut self, ticket: u64) {
        if ticket > self.turn {
            self.abandoned.insert(ticket);
        }
        self.assert_invariants();
    }

    /// Decreases available tickets.
    fn decrease_available(&mut self, quantity: u32) -> Result<(), ReservationError> {
        if quantity == 0 {
            return Err(ReservationError::InvalidQuantity);
        }
        if self.available < quantity {
            return Err(ReservationError::InsufficientInventory);
        }
        self.available -= quantity;
        self.assert_invariants();
        Ok(())
    }
}

/// Point-in-time copy of an event, as served by the list path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSnapshot {
    pub id: EventId,
    pub name: String,
    pub date: DateTime<Utc>,
    #[serde(rename = "total")]
    pub total_tickets: u32,
    #[serde(rename = "available")]
    pub available_tickets: u32,
}

/// Ticketed event with a fixed capacity.
#[derive(Debug)]
pub struct Event {
    id: EventId,
    name: String,
    date: DateTime<Utc>,
    total_tickets: u32,
    /// Next admission number to hand out.
    next_ticket: AtomicU64,
    inner: Mutex<EventData>,
    turn_advanced: Condvar,
}

impl Event {
    pub fn new(id: EventId, name: impl Into<String>, date: DateTime<Utc>, total_tickets: u32) -> Self {
        Self {
            id,
            name: name.into(),
            date,
            total_tickets,
            next_ticket: AtomicU64::new(0),
            inner: Mutex::new(EventData::new(total_tickets)),
            turn_advanced: Condvar::new(),
        }
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    pub fn total_tickets(&self) -> u32 {
        self.total_tickets
    }

    pub fn available_tickets(&self) -> u32 {
        self.inner.lock().available
    }

    /// The admission number the event will let through next.
    pub fn turn(&self) -> AdmissionTicket {
        AdmissionTicket(self.inner.lock().turn)
    }

    /// Hands out the next admission number for a reservation attempt.
    ///
    /// Each call returns a distinct, strictly increasing number.
    pub fn issue_admission(&self) -> AdmissionTicket {
        AdmissionTicket(self.next_ticket.fetch_add(1, Ordering::AcqRel))
    }

    pub fn snapshot(&self) -> EventSnapshot {
        let data = self.inner.lock();
        self.snapshot_of(&data)
    }

    /// Runs `f` on a snapshot while the event lock is still held.
    pub(crate) fn with_snapshot<R>(&self, f: impl FnOnce(EventSnapshot) -> R) -> R {
        let data = self.inner.lock();
        f(self.snapshot_of(&data))
    }

    fn snapshot_of(&self, data: &EventData) -> EventSnapshot {
        EventSnapshot {
            id: self.id,
            name: self.name.clone(),
            date: self.date,
            total_tickets: self.total_tickets,
            available_tickets: data.available,
        }
    }

    /// Waits for `ticket`'s turn and takes the event lock.
    ///
    /// The turn is advanced before this returns, whatever the caller does
    /// with the admission afterwards, so a failed attempt never holds up
    /// the attempts queued behind it.
    ///
    /// A number nobody shows up for is not waited on forever: if the turn
    /// sits on the same number for a waiter's whole `timeout`, that waiter
    /// skips the stalled number. Its holder then gets
    /// [`ReservationError::InvalidAdmission`] if it arrives later.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::InvalidAdmission`] - `ticket` was never issued by
    ///   this event, or its turn has already passed (also when the turn
    ///   passes while waiting).
    /// - [`ReservationError::AdmissionTimeout`] - the turn did not arrive within
    ///   `timeout`. The number is then skipped when the turn reaches it.
    pub fn admit(
        &self,
        ticket: AdmissionTicket,
        timeout: Duration,
    ) -> Result<Admission<'_>, ReservationError> {
        let issued = self.next_ticket.load(Ordering::Acquire);
        let mut data = self.inner.lock();

        if ticket.0 >= issued || ticket.0 < data.turn || data.abandoned.contains(&ticket.0) {
            return Err(ReservationError::InvalidAdmission);
        }

        let deadline = Instant::now().checked_add(timeout);
        let turn_on_entry = data.turn;
        loop {
            if data.turn == ticket.0 {
                break;
            }
            if data.turn > ticket.0 {
                // Another caller was admitted with the same number.
                return Err(ReservationError::InvalidAdmission);
            }

            let timed_out = match deadline {
                Some(deadline) => self.turn_advanced.wait_until(&mut data, deadline).timed_out(),
                None => {
                    self.turn_advanced.wait(&mut data);
                    false
                }
            };
            if !timed_out || data.turn >= ticket.0 {
                continue;
            }

            if data.turn == turn_on_entry {
                let stalled = data.turn;
                data.advance_turn();
                self.turn_advanced.notify_all();
                tracing::warn!(
                    event_id = %self.id,
                    stalled,
                    turn = data.turn,
                    "Skipped stalled admission"
                );
                if data.turn == ticket.0 {
                    break;
                }
            }

            data.abandon(ticket.0);
            tracing::warn!(
                event_id = %self.id,
                %ticket,
                turn = data.turn,
                "Admission timed out"
            );
            return Err(ReservationError::AdmissionTimeout);
        }

        data.advance_turn();
        self.turn_advanced.notify_all();
        tracing::debug!(event_id = %self.id, %ticket, "Admitted");

        Ok(Admission {
            event: self,
            ticket,
            data,
        })
    }
}

/// An admitted reservation attempt holding the event lock.
///
/// Dropping it releases the lock.
#[must_use = "dropping an admission releases the event lock immediately"]
pub struct Admission<'a> {
    event: &'a Event,
    ticket: AdmissionTicket,
    data: MutexGuard<'a, EventData>,
}

impl Admission<'_> {
    pub fn ticket(&self) -> AdmissionTicket {
        self.ticket
    }

    pub fn available(&self) -> u32 {
        self.data.available
    }

    /// Removes `quantity` tickets from the available pool.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::InvalidQuantity`] - `quantity` is zero.
    /// - [`ReservationError::InsufficientInventory`] - fewer than `quantity`
    ///   tickets remain. Nothing changes.
    pub fn take(&mut self, quantity: u32) -> Result<(), ReservationError> {
        self.data.decrease_available(quantity)
    }

    /// Snapshot reflecting any change made through this admission.
    pub fn snapshot(&self) -> EventSnapshot {
        self.event.snapshot_of(&self.data)
    }
}
