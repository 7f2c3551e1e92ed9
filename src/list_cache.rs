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

//! Cached event listing.
//!
//! While no listing is cached, the first reader becomes the leader and
//! recomputes it; readers arriving meanwhile wait for the leader and share
//! its result. Writers keep a cached listing current with [`ListCache::upsert`]
//! instead of discarding it.
//!
//! Every write bumps a generation counter. A leader only installs its result
//! if no write happened while it was loading, so a listing computed from a
//! store that has since changed is never served to later readers. Readers
//! that were already waiting on that leader still get its result.

use crate::base::EventId;
use crate::event::EventSnapshot;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

#[derive(Debug, Default)]
struct CacheState {
    listing: Option<Arc<Vec<EventSnapshot>>>,
    generation: u64,
    /// Generation the current leader started loading at.
    inflight: Option<u64>,
    /// Result of the last finished load, tagged with its starting generation.
    last_load: Option<(u64, Arc<Vec<EventSnapshot>>)>,
}

/// Single-flight cache of the ordered event listing.
#[derive(Debug, Default)]
pub struct ListCache {
    state: Mutex<CacheState>,
    loaded: Condvar,
}

/// Clears the in-flight marker and wakes followers, even if the load panics.
struct Leader<'a> {
    cache: &'a ListCache,
    generation: u64,
}

impl Drop for Leader<'_> {
    fn drop(&mut self) {
        let mut state = self.cache.state.lock();
        if state.inflight == Some(self.generation) {
            state.inflight = None;
        }
        self.cache.loaded.notify_all();
    }
}

impl ListCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached listing, loading it with `load` if absent.
    ///
    /// At most one caller runs `load` per generation; concurrent callers
    /// block until it finishes. `load` runs without the cache lock held and
    /// must return snapshots sorted by ID.
    pub fn get_or_load<F>(&self, load: F) -> Arc<Vec<EventSnapshot>>
    where
        F: FnOnce() -> Vec<EventSnapshot>,
    {
        let mut state = self.state.lock();
        let mut joined = None;
        loop {
            if let Some(listing) = &state.listing {
                return Arc::clone(listing);
            }
            if let (Some(generation), Some((loaded_at, listing))) = (joined, &state.last_load) {
                if *loaded_at == generation {
                    return Arc::clone(listing);
                }
            }
            if state.inflight != Some(state.generation) {
                break;
            }
            joined = Some(state.generation);
            self.loaded.wait(&mut state);
        }

        let generation = state.generation;
        state.inflight = Some(generation);
        drop(state);

        let leader = Leader {
            cache: self,
            generation,
        };
        let listing = Arc::new(load());

        let mut state = self.state.lock();
        state.last_load = Some((generation, Arc::clone(&listing)));
        if state.generation == generation {
            state.listing = Some(Arc::clone(&listing));
        } else {
            tracing::debug!(generation, "Discarding listing loaded before a write");
        }
        drop(state);
        drop(leader);

        listing
    }

    /// Inserts or overwrites the entry for `snapshot.id`.
    ///
    /// A no-op on the listing itself when nothing is cached, but it still
    /// fences off any load in progress.
    pub fn upsert(&self, snapshot: EventSnapshot) {
        let mut state = self.state.lock();
        state.generation += 1;
        if let Some(listing) = state.listing.as_mut() {
            let listing = Arc::make_mut(listing);
            match listing.binary_search_by_key(&snapshot.id, |entry| entry.id) {
                Ok(index) => listing[index] = snapshot,
                Err(index) => listing.insert(index, snapshot),
            }
        }
    }

    /// Drops the cached listing so the next reader reloads it.
    pub fn invalidate(&self) {
        let mut state = self.state.lock();
        state.generation += 1;
        state.listing = None;
    }

    /// The cached listing, if any, without loading.
    pub fn cached(&self) -> Option<Arc<Vec<EventSnapshot>>> {
        self.state.lock().listing.clone()
    }

    /// The cached entry for `id`, if any.
    pub fn cached_entry(&self, id: EventId) -> Option<EventSnapshot> {
        let state = self.state.lock();
        let listing = state.listing.as_ref()?;
        listing
            .binary_search_by_key(&id, |entry| entry.id)
            .ok()
            .map(|index| listing[index].clone())
    }
}
