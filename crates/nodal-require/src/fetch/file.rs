// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! `file://` transport

use super::{Fetched, SourceFetcher};
use crate::error::{LoaderError, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use tracing::debug;
use url::Url;

/// Reads module source from the local file system
#[derive(Debug, Default, Clone, Copy)]
pub struct FileFetcher;

impl FileFetcher {
    /// Create a file fetcher
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SourceFetcher for FileFetcher {
    async fn fetch(&self, url: &str) -> Result<Fetched> {
        let mut parsed =
            Url::parse(url).map_err(|e| LoaderError::invalid_address(url, "", e))?;
        parsed.set_query(None);
        let path = parsed
            .to_file_path()
            .map_err(|_| LoaderError::invalid_address(url, "", "not a file address"))?;

        match tokio::fs::read_to_string(&path).await {
            Ok(source) => Ok(Fetched::Source(source)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No file at {}", path.display());
                Ok(Fetched::not_found())
            }
            Err(e) => Err(e.into()),
        }
    }
}
