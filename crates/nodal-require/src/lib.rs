// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # nodal-require
//!
//! A runtime module loader with CommonJS `require()` semantics for hosts
//! that have no module system of their own.
//!
//! This crate provides:
//!
//! - Canonical addressing of specifiers (relative, root-relative, absolute, bare)
//! - `node_modules` lookup up the origin's lineage, with alias convergence
//! - On-demand fetching with in-flight de-duplication
//! - Lazy, at-most-once execution of module bodies
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use nodal_require::{LinkedHost, LoaderConfig, LoaderContext, RequireRequest};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut host = LinkedHost::new();
//!     host.link("https://example.com/static/app.js", |require, exports, _, _, _| {
//!         let util = require.call("./util")?;
//!         exports.as_object().unwrap().set("util", util);
//!         Ok(())
//!     });
//!
//!     let mut loader = LoaderContext::from_config(LoaderConfig::load()?)?.with_host(host);
//!     let app = loader
//!         .require_async(RequireRequest::new("./app").origin("https://example.com/static"))
//!         .await?;
//!     println!("{}", app.exports());
//!     Ok(())
//! }
//! ```
//!
//! Module bodies are supplied by a [`CodeHost`]. The loader fetches source
//! for dependency discovery only; evaluating it is the host's business.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod fetch;
pub mod host;
pub mod module_system;
pub mod value;

// Re-exports
pub use config::{CachingFrequency, LoaderConfig};
pub use error::{LoaderError, ModuleError, Result};
pub use fetch::{CacheBuster, Fetched, FileFetcher, HttpFetcher, MemoryFetcher, SchemeFetcher, SourceFetcher};
pub use host::{CodeHost, LinkedHost, NoCodeHost};
pub use module_system::{
    factory, Factory, LoaderContext, Module, ModuleHandle, ModuleKind, ModuleResolver, Require,
    RequireRequest,
};
pub use value::{NativeFunction, Object, Value};

/// Version of the nodal-require crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
