// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! In-memory transport

use super::{Fetched, SourceFetcher};
use crate::error::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Serves module source from a table, recording every request.
///
/// Lookups ignore the query string, so cache-busting tokens do not affect
/// which entry is served. The log keeps the full requested address.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    sources: Mutex<HashMap<String, String>>,
    log: Mutex<Vec<String>>,
}

impl MemoryFetcher {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the source at an address
    pub fn insert(&self, address: impl Into<String>, source: impl Into<String>) -> &Self {
        self.sources
            .lock()
            .insert(address.into().to_lowercase(), source.into());
        self
    }

    /// Builder form of [`MemoryFetcher::insert`]
    pub fn with(self, address: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(address, source);
        self
    }

    /// Every address requested so far, in order
    pub fn requests(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    /// Number of requests for an address (query ignored)
    pub fn request_count(&self, address: &str) -> usize {
        self.log
            .lock()
            .iter()
            .filter(|url| strip_query(url) == address)
            .count()
    }
}

fn strip_query(url: &str) -> &str {
    url.split_once('?').map(|(path, _)| path).unwrap_or(url)
}

#[async_trait]
impl SourceFetcher for MemoryFetcher {
    async fn fetch(&self, url: &str) -> Result<Fetched> {
        self.log.lock().push(url.to_string());
        let key = strip_query(url).to_lowercase();
        Ok(match self.sources.lock().get(&key) {
            Some(source) => Fetched::Source(source.clone()),
            None => Fetched::not_found(),
        })
    }
}
