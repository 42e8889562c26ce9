// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! CommonJS-style module system
//!
//! ## Loading
//! - Specifiers resolve to canonical, lower-cased absolute addresses
//! - Bare specifiers are searched in `node_modules` up the origin's lineage
//! - Sources are scanned for `require("...")` and their dependencies fetched
//!   before the requesting module counts as loaded
//!
//! ## Initialization
//! - Each module body runs at most once, the first time its exports are needed
//! - `require()` inside a body is synchronous and bound to the module's directory
//! - Circular requires observe partially populated exports

mod initializer;
mod loader;
mod module;
mod queue;
mod registry;
mod resolver;
mod scanner;

pub use initializer::{ModuleInitializer, Require};
pub use loader::{LoaderContext, ReadyCallback, RequireRequest};
pub use module::{directory_of, factory, Factory, InitState, Module, ModuleHandle, ModuleKind};
pub use queue::LoadQueue;
pub use registry::ModuleRegistry;
pub use resolver::{Lineage, LineageStep, ModuleResolver, SCHEMES};
pub use scanner::scan;
