// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! HTTP transport

use super::{Fetched, SourceFetcher};
use crate::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};

/// Fetches module source over HTTP(S)
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher; `timeout` is in seconds, none waits forever.
    pub fn new(timeout: Option<u64>) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(format!("nodal/{}", env!("CARGO_PKG_VERSION")));

        if let Some(secs) = timeout {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<Fetched> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        debug!("GET {} -> {}", url, status);

        if !status.is_success() {
            return Ok(Fetched::Missing {
                status: status.as_u16(),
            });
        }

        Ok(Fetched::Source(response.text().await?))
    }
}
