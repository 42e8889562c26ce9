// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module registry keyed by canonical address

use crate::module_system::module::ModuleHandle;
use std::collections::HashMap;
use tracing::debug;

/// Registry of module records.
///
/// Several addresses may map to one record: every address a lineage search
/// tried before succeeding stays registered as an alias of the winner.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, ModuleHandle>,
}

impl ModuleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a module by address
    pub fn get(&self, address: &str) -> Option<ModuleHandle> {
        self.modules.get(address).cloned()
    }

    /// Check if an address is registered
    pub fn contains(&self, address: &str) -> bool {
        self.modules.contains_key(address)
    }

    /// Register a module at its own address, replacing any previous record
    pub fn register(&mut self, module: ModuleHandle) -> Option<ModuleHandle> {
        let address = module.address();
        self.alias(address, module)
    }

    /// Point an address at an existing record
    pub fn alias(&mut self, address: impl Into<String>, module: ModuleHandle) -> Option<ModuleHandle> {
        let address = address.into();
        debug!("Registering {} -> {}", address, module.address());
        self.modules.insert(address, module)
    }

    /// Repoint every address in `addresses` at `module`
    pub fn converge<'a>(&mut self, addresses: impl IntoIterator<Item = &'a String>, module: &ModuleHandle) {
        for address in addresses {
            self.alias(address.clone(), module.clone());
        }
    }

    /// Every registered address, sorted
    pub fn addresses(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.modules.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Every address that reaches the given record, sorted
    pub fn aliases_of(&self, module: &ModuleHandle) -> Vec<String> {
        let mut keys: Vec<String> = self
            .modules
            .iter()
            .filter(|(_, m)| m.ptr_eq(module))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Number of registered addresses (aliases included)
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
