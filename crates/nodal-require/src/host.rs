// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Code hosts turn fetched modules into runnable bodies.
//!
//! The loader itself never evaluates text. A host embedding a scripting
//! engine can compile `module.source`; hosts without one link pre-built
//! units by address, in which case the fetched source is only used for
//! dependency discovery.

use crate::module_system::{factory, Factory, Module};
use crate::value::Value;
use crate::Require;
use crate::ModuleHandle;
use anyhow::anyhow;
use std::collections::HashMap;

/// Produces a module body for a fetched module
pub trait CodeHost {
    /// Build the body for `module`; failures are recorded as execution errors
    fn compile(&self, module: &Module) -> anyhow::Result<Factory>;
}

/// Host with no dynamic code support; only functional modules can run
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCodeHost;

impl CodeHost for NoCodeHost {
    fn compile(&self, module: &Module) -> anyhow::Result<Factory> {
        Err(anyhow!(
            "no code host available to evaluate source of {}",
            module.address
        ))
    }
}

/// Host that links pre-compiled bodies by canonical address
#[derive(Default, Clone)]
pub struct LinkedHost {
    units: HashMap<String, Factory>,
}

impl LinkedHost {
    /// Create an empty host
    pub fn new() -> Self {
        Self::default()
    }

    /// Link a body to an address (matched case-insensitively)
    pub fn link(
        &mut self,
        address: impl Into<String>,
        body: impl Fn(&Require<'_>, &Value, &ModuleHandle, &str, &str) -> anyhow::Result<()> + 'static,
    ) -> &mut Self {
        self.units.insert(address.into().to_lowercase(), factory(body));
        self
    }

    /// Check if an address has a linked body
    pub fn is_linked(&self, address: &str) -> bool {
        self.units.contains_key(&address.to_lowercase())
    }
}

impl CodeHost for LinkedHost {
    fn compile(&self, module: &Module) -> anyhow::Result<Factory> {
        self.units
            .get(&module.address)
            .cloned()
            .ok_or_else(|| anyhow!("no linked unit for {}", module.address))
    }
}
