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

//! Property-based tests for the reservation engine.
//!
//! These tests verify invariants that should hold for any sequence of
//! reservation attempts.

use chrono::Utc;
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use ticket_reservation_rs::{ReservationEngine, ReservationError, TicketId};

// =============================================================================
// Arbitrary Strategies
// =============================================================================

/// Event capacity, including sold-out-on-arrival events.
fn arb_total() -> impl Strategy<Value = u32> {
    0u32..=200
}

/// Requested quantity, including the invalid zero.
fn arb_quantity() -> impl Strategy<Value = u32> {
    prop_oneof![
        1 => Just(0u32),
        9 => 1u32..=25,
    ]
}

/// Expected per-attempt outcome when attempts are admitted in order.
fn replay(total: u32, quantities: &[u32]) -> Vec<Result<u32, ReservationError>> {
    let mut available = total;
    quantities
        .iter()
        .map(|&quantity| {
            if quantity == 0 {
                Err(ReservationError::InvalidQuantity)
            } else if quantity > available {
                Err(ReservationError::InsufficientInventory)
            } else {
                available -= quantity;
                Ok(quantity)
            }
        })
        .collect()
}

// =============================================================================
// Sequential Invariants
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Available stays within [0, total] and matches the registry.
    #[test]
    fn availability_bounded_and_matches_registry(
        total in arb_total(),
        quantities in prop::collection::vec(arb_quantity(), 0..30),
    ) {
        let engine = ReservationEngine::new();
        let event = engine.create_event("show", Utc::now(), total).unwrap();

        for quantity in &quantities {
            let admission = event.issue_admission();
            let _ = engine.book_tickets(event.id(), *quantity, admission);

            let available = event.available_tickets();
            prop_assert!(available <= total);
            prop_assert_eq!(
                engine.tickets().issued_for(event.id()),
                (total - available) as usize
            );
        }
    }

    /// Sequential bookings behave like first-fit over the admission order.
    #[test]
    fn sequential_matches_model(
        total in arb_total(),
        quantities in prop::collection::vec(arb_quantity(), 0..30),
    ) {
        let engine = ReservationEngine::new();
        let event = engine.create_event("show", Utc::now(), total).unwrap();

        let actual: Vec<Result<u32, ReservationError>> = quantities
            .iter()
            .map(|&quantity| {
                let admission = event.issue_admission();
                engine
                    .book_tickets(event.id(), quantity, admission)
                    .map(|tickets| tickets.len() as u32)
            })
            .collect();

        prop_assert_eq!(actual, replay(total, &quantities));
    }

    /// Cached listing always agrees with the events after each write.
    #[test]
    fn listing_tracks_writes(
        totals in prop::collection::vec(1u32..50, 1..5),
        bookings in prop::collection::vec((0usize..5, 1u32..10), 0..20),
    ) {
        let engine = ReservationEngine::new();
        let events: Vec<_> = totals
            .iter()
            .map(|&total| engine.create_event("show", Utc::now(), total).unwrap())
            .collect();
        engine.list_events();

        for (index, quantity) in bookings {
            let event = &events[index % events.len()];
            let _ = engine.book_tickets(event.id(), quantity, event.issue_admission());

            let listing = engine.list_events();
            prop_assert_eq!(listing.len(), events.len());
            for (snapshot, event) in listing.iter().zip(&events) {
                prop_assert_eq!(snapshot.id, event.id());
                prop_assert_eq!(snapshot.available_tickets, event.available_tickets());
            }
        }
    }
}

// =============================================================================
// Concurrent Invariants
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Concurrent attempts produce exactly the in-order outcome, with
    /// pairwise-disjoint ticket sets.
    #[test]
    fn concurrent_matches_model(
        total in arb_total(),
        quantities in prop::collection::vec(arb_quantity(), 1..12),
    ) {
        let engine = Arc::new(ReservationEngine::new());
        let event = engine.create_event("show", Utc::now(), total).unwrap();
        let admissions: Vec<_> = quantities.iter().map(|_| event.issue_admission()).collect();

        // Spawn in reverse admission order.
        let handles: Vec<_> = admissions
            .iter()
            .zip(&quantities)
            .rev()
            .map(|(&admission, &quantity)| {
                let engine = Arc::clone(&engine);
                let event_id = event.id();
                thread::spawn(move || engine.book_tickets(event_id, quantity, admission))
            })
            .collect();
        let mut results: Vec<Result<Vec<TicketId>, ReservationError>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        results.reverse();

        let counts: Vec<Result<u32, ReservationError>> = results
            .iter()
            .map(|r| r.as_ref().map(|t| t.len() as u32).map_err(Clone::clone))
            .collect();
        prop_assert_eq!(counts, replay(total, &quantities));

        let mut seen = HashSet::new();
        for tickets in results.iter().flatten() {
            for ticket in tickets {
                prop_assert!(seen.insert(*ticket));
            }
        }
        prop_assert_eq!(seen.len() as u32, total - event.available_tickets());
    }
}
