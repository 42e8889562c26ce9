// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Source transports
//!
//! The loader asks a [`SourceFetcher`] for the text at an address and only
//! distinguishes "got source" from "did not". Whether a miss triggers an
//! ascent or a terminal failure is decided by the loader.

mod cache;
mod file;
mod http;
mod memory;

pub use cache::CacheBuster;
pub use file::FileFetcher;
pub use http::HttpFetcher;
pub use memory::MemoryFetcher;

use crate::config::LoaderConfig;
use crate::error::{LoaderError, Result};
use async_trait::async_trait;

/// Outcome of a fetch that reached the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched {
    /// Source text
    Source(String),
    /// The transport answered but has nothing at this address
    Missing {
        /// Transport status (HTTP-style)
        status: u16,
    },
}

impl Fetched {
    /// Status used for a missing file or table entry
    pub const NOT_FOUND: u16 = 404;

    /// Shorthand for a 404 miss
    pub fn not_found() -> Self {
        Self::Missing {
            status: Self::NOT_FOUND,
        }
    }
}

/// Retrieves module source text by address
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Fetch the text at `url`.
    ///
    /// `Err` means the transport itself failed; the loader treats it like a
    /// miss.
    async fn fetch(&self, url: &str) -> Result<Fetched>;
}

/// Routes addresses to a transport by scheme
pub struct SchemeFetcher {
    http: HttpFetcher,
    file: FileFetcher,
}

impl SchemeFetcher {
    /// Create a fetcher handling `http`, `https` and `file` addresses
    pub fn new(config: &LoaderConfig) -> Result<Self> {
        Ok(Self {
            http: HttpFetcher::new(config.timeout)?,
            file: FileFetcher::new(),
        })
    }
}

#[async_trait]
impl SourceFetcher for SchemeFetcher {
    async fn fetch(&self, url: &str) -> Result<Fetched> {
        let scheme = url.split_once("://").map(|(s, _)| s.to_ascii_lowercase());
        match scheme.as_deref() {
            Some("http") | Some("https") => self.http.fetch(url).await,
            Some("file") => self.file.fetch(url).await,
            _ => Err(LoaderError::invalid_address(
                url,
                "",
                "no transport for this scheme",
            )),
        }
    }
}
