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

//! Tuning knobs for the engine and the dispatcher.

use std::time::Duration;

/// Default upper bound on how long an attempt waits for its turn.
pub const DEFAULT_ADMISSION_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of dispatcher worker threads.
pub const DEFAULT_WORKERS: usize = 16;

/// Default capacity of the shared request queue.
pub const DEFAULT_QUEUE_DEPTH: usize = 256;

/// Engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// How long a reservation attempt may wait for its admission turn
    /// before failing with
    /// [`ReservationError::AdmissionTimeout`](crate::ReservationError::AdmissionTimeout).
    pub admission_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            admission_timeout: DEFAULT_ADMISSION_TIMEOUT,
        }
    }
}

/// Dispatcher configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Worker threads draining the request queue. Clamped to at least one.
    pub workers: usize,
    /// Requests that may sit in the queue before senders block.
    /// Zero makes every send a rendezvous with a worker.
    pub queue_depth: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}
