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

//! Request dispatch over in-process channels.
//!
//! Clients push requests into one bounded queue shared with a fixed pool of
//! worker threads. Each request carries its own single-use response channel:
//! the worker sends exactly one [`Response`] on it and then drops the sender,
//! which closes the channel.
//!
//! ```text
//!  Client ──reserve──► [ queue (bounded) ] ──► worker 0 ──► engine.handle ──► response channel
//!  Client ──list─────►                     ──► worker 1 ──►     ...
//! ```
//!
//! For reservations the client mints the admission ticket and enqueues the
//! request under one submission lock, so the queue holds each event's
//! attempts in admission order. A worker that waits for its turn is therefore
//! always waiting on an attempt another worker has already picked up.

use crate::base::EventId;
use crate::config::DispatcherConfig;
use crate::engine::ReservationEngine;
use crate::error::DispatchError;
use crate::request::{Request, Response};
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A request together with the channel its response goes to.
struct Envelope {
    request: Request,
    respond_to: Sender<Response>,
}

/// Shared request queue. `None` once the dispatcher has shut down.
type Queue = Arc<Mutex<Option<Sender<Envelope>>>>;

/// Worker pool serving requests against a [`ReservationEngine`].
pub struct Dispatcher {
    engine: Arc<ReservationEngine>,
    queue: Queue,
    workers: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    /// Spawns the worker pool.
    ///
    /// # Errors
    ///
    /// Returns the OS error if a worker thread cannot be spawned. Workers
    /// already started are shut down first.
    pub fn start(engine: Arc<ReservationEngine>, config: DispatcherConfig) -> io::Result<Self> {
        let (sender, receiver) = channel::bounded(config.queue_depth);
        let mut dispatcher = Dispatcher {
            engine,
            queue: Arc::new(Mutex::new(Some(sender))),
            workers: Vec::with_capacity(config.workers.max(1)),
        };

        for index in 0..config.workers.max(1) {
            let engine = Arc::clone(&dispatcher.engine);
            let requests = receiver.clone();
            let worker = thread::Builder::new()
                .name(format!("dispatch-worker-{index}"))
                .spawn(move || run_worker(index, &engine, &requests))?;
            dispatcher.workers.push(worker);
        }

        tracing::info!(
            workers = dispatcher.workers.len(),
            queue_depth = config.queue_depth,
            "Dispatcher started"
        );
        Ok(dispatcher)
    }

    /// Returns a new client handle. Clients are cheap to clone and can be
    /// moved to other threads.
    pub fn client(&self) -> Client {
        Client {
            engine: Arc::clone(&self.engine),
            queue: Arc::clone(&self.queue),
        }
    }

    pub fn engine(&self) -> &Arc<ReservationEngine> {
        &self.engine
    }

    /// Closes the queue and waits for the workers to finish.
    ///
    /// Requests already queued are still served. Later submissions fail
    /// with [`DispatchError::Closed`].
    pub fn shutdown(mut self) {
        self.close_and_join();
    }

    fn close_and_join(&mut self) {
        // Dropping the only sender disconnects the queue once it drains.
        drop(self.queue.lock().take());

        for worker in self.workers.drain(..) {
            let name = worker.thread().name().unwrap_or("dispatch-worker").to_string();
            if worker.join().is_err() {
                tracing::error!(worker = %name, "Worker panicked");
            }
        }
        tracing::info!("Dispatcher stopped");
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.close_and_join();
        }
    }
}

fn run_worker(index: usize, engine: &ReservationEngine, requests: &Receiver<Envelope>) {
    for Envelope {
        request,
        respond_to,
    } in requests.iter()
    {
        tracing::debug!(worker = index, ?request, "Handling request");
        let response = engine.handle(request);
        if respond_to.send(response).is_err() {
            tracing::debug!(worker = index, "Client stopped waiting for response");
        }
        // `respond_to` is dropped here, closing the response channel.
    }
}

/// Handle for submitting requests to a [`Dispatcher`].
#[derive(Clone)]
pub struct Client {
    engine: Arc<ReservationEngine>,
    queue: Queue,
}

impl Client {
    /// Requests the event listing.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::Closed`] - the dispatcher has shut down.
    pub fn list(&self) -> Result<ResponseHandle, DispatchError> {
        self.submit(Request::List)
    }

    /// Requests `quantity` tickets for `event_id`.
    ///
    /// Mints the attempt's admission ticket and enqueues it atomically with
    /// respect to other clients. Blocks while the queue is full.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::Closed`] - the dispatcher has shut down.
    pub fn reserve(&self, event_id: EventId, quantity: u32) -> Result<ResponseHandle, DispatchError> {
        let queue = self.queue.lock();
        let sender = queue.as_ref().ok_or(DispatchError::Closed)?;
        let request = self.engine.reserve_request(event_id, quantity);
        enqueue(sender, request)
    }

    /// Enqueues a prebuilt request.
    ///
    /// Reservations submitted this way should carry admission tickets in
    /// the order they are submitted; a ticket stuck behind a later one in
    /// the queue may wait out the admission timeout.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::Closed`] - the dispatcher has shut down.
    pub fn submit(&self, request: Request) -> Result<ResponseHandle, DispatchError> {
        let queue = self.queue.lock();
        let sender = queue.as_ref().ok_or(DispatchError::Closed)?;
        enqueue(sender, request)
    }
}

fn enqueue(sender: &Sender<Envelope>, request: Request) -> Result<ResponseHandle, DispatchError> {
    let (respond_to, responses) = channel::bounded(1);
    sender
        .send(Envelope {
            request,
            respond_to,
        })
        .map_err(|err| {
            if let Request::Reserve {
                event_id,
                admission,
                ..
            } = err.into_inner().request
            {
                tracing::warn!(%event_id, %admission, "Admission ticket lost: no worker left");
            }
            DispatchError::Closed
        })?;
    Ok(ResponseHandle { responses })
}

/// Pending response to a submitted request.
#[must_use = "a response handle does nothing unless waited on"]
pub struct ResponseHandle {
    responses: Receiver<Response>,
}

impl ResponseHandle {
    /// Blocks until the response arrives.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::Disconnected`] - the worker dropped the request
    ///   without answering.
    pub fn wait(self) -> Result<Response, DispatchError> {
        self.responses.recv().map_err(|_| DispatchError::Disconnected)
    }
}

