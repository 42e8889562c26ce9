// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Load queue
//!
//! Tracks addresses whose fetch is outstanding. The queue draining to empty
//! is the only signal that a dependency graph has been fully fetched, so a
//! module's discovered dependencies must be enqueued before the module
//! itself is dequeued.

use tracing::debug;

type DrainListener = Box<dyn FnMut(u64)>;

/// Outstanding fetches
#[derive(Default)]
pub struct LoadQueue {
    /// Addresses in request order
    pending: Vec<String>,
    /// Called with the drain count each time the queue empties
    listeners: Vec<DrainListener>,
    /// Number of drains observed
    drains: u64,
}

impl LoadQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an address; returns false if it is already outstanding
    pub fn enqueue(&mut self, address: &str) -> bool {
        if self.contains(address) {
            debug!("Already queued: {}", address);
            return false;
        }
        self.pending.push(address.to_string());
        debug!("Queued {} ({} outstanding)", address, self.pending.len());
        true
    }

    /// Remove an address; returns true if this removal drained the queue
    pub fn dequeue(&mut self, address: &str) -> bool {
        let Some(idx) = self.pending.iter().position(|a| a == address) else {
            return false;
        };
        self.pending.remove(idx);
        debug!("Dequeued {} ({} outstanding)", address, self.pending.len());

        if !self.pending.is_empty() {
            return false;
        }

        self.drains += 1;
        let count = self.drains;
        for listener in self.listeners.iter_mut() {
            listener(count);
        }
        true
    }

    /// Check if an address is outstanding
    pub fn contains(&self, address: &str) -> bool {
        self.pending.iter().any(|a| a == address)
    }

    /// Number of outstanding addresses
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Check if nothing is outstanding
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Register a drain listener
    pub fn on_drain(&mut self, listener: impl FnMut(u64) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Number of drains observed so far
    pub fn drain_count(&self) -> u64 {
        self.drains
    }
}
