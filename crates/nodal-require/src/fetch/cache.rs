// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Cache-busting query tokens

use crate::config::CachingFrequency;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Query parameter carrying the token
pub const CACHE_PARAM: &str = "cache";

/// Appends a `cache=<token>` query to fetch addresses.
///
/// The decorated address is only ever handed to the transport; registry
/// keys stay undecorated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheBuster {
    frequency: CachingFrequency,
}

impl CacheBuster {
    /// Create a cache buster for a mode
    pub fn new(frequency: CachingFrequency) -> Self {
        Self { frequency }
    }

    /// The configured mode
    pub fn frequency(&self) -> CachingFrequency {
        self.frequency
    }

    /// Token for `now`, or none when caching is left to the transport
    pub fn token_at(&self, now: DateTime<Utc>) -> Option<String> {
        match self.frequency {
            CachingFrequency::Auto => None,
            CachingFrequency::Never => Some(Uuid::new_v4().simple().to_string()),
            frequency => frequency.interval_millis().map(|interval| {
                let millis = now.timestamp_millis();
                (millis - millis.rem_euclid(interval)).to_string()
            }),
        }
    }

    /// Decorate an address for fetching at `now`
    pub fn apply_at(&self, address: &str, now: DateTime<Utc>) -> String {
        match self.token_at(now) {
            Some(token) => {
                let sep = if address.contains('?') { '&' } else { '?' };
                format!("{}{}{}={}", address, sep, CACHE_PARAM, token)
            }
            None => address.to_string(),
        }
    }

    /// Decorate an address for fetching now
    pub fn apply(&self, address: &str) -> String {
        self.apply_at(address, Utc::now())
    }
}
