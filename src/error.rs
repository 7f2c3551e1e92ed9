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

//! Error types for reservations and request dispatch.

use thiserror::Error;

/// Reservation and event management errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReservationError {
    /// Referenced event does not exist
    #[error("event not found")]
    NotFound,

    /// Requested quantity exceeds the tickets still available
    #[error("not enough tickets available")]
    InsufficientInventory,

    /// Event ID collision on creation
    #[error("event id already exists")]
    DuplicateId,

    /// Quantity is zero
    #[error("invalid ticket quantity (must be positive)")]
    InvalidQuantity,

    /// Admission ticket was never issued or its turn has already passed
    #[error("invalid admission ticket")]
    InvalidAdmission,

    /// The attempt's turn did not arrive before the deadline
    #[error("timed out waiting for admission")]
    AdmissionTimeout,

    /// Ticket ID collision in the registry
    #[error("duplicate ticket ID")]
    DuplicateTicket,
}

/// Errors raised at the client/dispatcher boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The request queue is closed; no worker will pick the request up
    #[error("dispatcher is shut down")]
    Closed,

    /// The worker dropped the response channel without answering
    #[error("response channel closed without a response")]
    Disconnected,
}
