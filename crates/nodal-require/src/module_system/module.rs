// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module records and the handles shared between registry aliases

use crate::error::ModuleError;
use crate::module_system::initializer::Require;
use crate::value::Value;
use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

/// A ready-to-run module body.
///
/// Invoked as `(require, exports, module, address, directory)`. The body may
/// mutate `exports` in place or replace it through
/// [`ModuleHandle::set_exports`]; only its error is observed.
pub type Factory =
    Rc<dyn Fn(&Require<'_>, &Value, &ModuleHandle, &str, &str) -> anyhow::Result<()>>;

/// Wrap a closure as a [`Factory`].
pub fn factory(
    body: impl Fn(&Require<'_>, &Value, &ModuleHandle, &str, &str) -> anyhow::Result<()> + 'static,
) -> Factory {
    Rc::new(body)
}

/// How a module was located
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// Explicit relative, root-relative or absolute address; never ascends
    Local,
    /// Bare specifier found in a dependency folder along the lineage
    Nodal,
    /// Registered directly from a factory
    Functional,
}

impl ModuleKind {
    /// Lower-case name used in logs and listings
    pub fn as_str(self) -> &'static str {
        match self {
            ModuleKind::Local => "local",
            ModuleKind::Nodal => "nodal",
            ModuleKind::Functional => "functional",
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution progress of a module body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    /// Body has not run
    Uninitialized,
    /// Body is on the stack; cyclic requires see partial exports
    Executing,
    /// Body ran (successfully or not)
    Initialized,
}

/// Module record
pub struct Module {
    /// Canonical address; the registry key of the winning location
    pub address: String,
    /// Address up to its last `/`; origin for the module's own requires
    pub directory: String,
    /// How the module was located
    pub kind: ModuleKind,
    /// Source text, once fetched
    pub source: Option<String>,
    /// Body supplied by the embedder or produced by the code host
    pub factory: Option<Factory>,
    /// Exports handed to every importer
    pub exports: Value,
    /// Execution progress
    pub state: InitState,
    /// Load or execution failure
    pub error: Option<ModuleError>,
}

impl Module {
    /// Create an unloaded record for an address.
    pub fn new(address: impl Into<String>, kind: ModuleKind) -> Self {
        let address = address.into();
        Self {
            directory: directory_of(&address).to_string(),
            address,
            kind,
            source: None,
            factory: None,
            exports: Value::object(),
            state: InitState::Uninitialized,
            error: None,
        }
    }

    /// Create a functional record around a factory.
    pub fn functional(address: impl Into<String>, factory: Factory) -> Self {
        let mut module = Self::new(address, ModuleKind::Functional);
        module.factory = Some(factory);
        module
    }

    /// Move the record to another search address, resetting its exports.
    pub fn relocate(&mut self, address: impl Into<String>) {
        self.address = address.into();
        self.directory = directory_of(&self.address).to_string();
        self.exports = Value::object();
    }

    /// Whether the body has run.
    pub fn is_initialized(&self) -> bool {
        self.state == InitState::Initialized
    }

    /// Whether source (or a factory) is available.
    pub fn is_loaded(&self) -> bool {
        self.source.is_some() || self.factory.is_some()
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("address", &self.address)
            .field("kind", &self.kind)
            .field("loaded", &self.is_loaded())
            .field("state", &self.state)
            .field("error", &self.error)
            .finish()
    }
}

/// Shared handle to a module record.
///
/// Registry aliases are clones of one handle, so every key reaching the
/// same physical module sees one `exports` value.
#[derive(Clone)]
pub struct ModuleHandle(Rc<RefCell<Module>>);

impl ModuleHandle {
    /// Wrap a record.
    pub fn new(module: Module) -> Self {
        Self(Rc::new(RefCell::new(module)))
    }

    /// Borrow the record.
    ///
    /// Do not hold the borrow across a call into module code.
    pub fn borrow(&self) -> Ref<'_, Module> {
        self.0.borrow()
    }

    /// Mutate the record.
    pub fn update<R>(&self, f: impl FnOnce(&mut Module) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }

    /// Current canonical address.
    pub fn address(&self) -> String {
        self.0.borrow().address.clone()
    }

    /// Current directory.
    pub fn directory(&self) -> String {
        self.0.borrow().directory.clone()
    }

    /// Module kind.
    pub fn kind(&self) -> ModuleKind {
        self.0.borrow().kind
    }

    /// Current exports value.
    pub fn exports(&self) -> Value {
        self.0.borrow().exports.clone()
    }

    /// Replace the exports wholesale (`module.exports = ...`).
    pub fn set_exports(&self, exports: Value) {
        self.0.borrow_mut().exports = exports;
    }

    /// Recorded failure, if any.
    pub fn error(&self) -> Option<ModuleError> {
        self.0.borrow().error.clone()
    }

    /// Whether the body has run.
    pub fn is_initialized(&self) -> bool {
        self.0.borrow().is_initialized()
    }

    /// Whether two handles refer to one record.
    pub fn ptr_eq(&self, other: &ModuleHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ModuleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(module) => fmt::Debug::fmt(&*module, f),
            Err(_) => f.write_str("Module(<borrowed>)"),
        }
    }
}

/// Containing location of an address (everything before the last `/`).
pub fn directory_of(address: &str) -> &str {
    address
        .rfind('/')
        .map(|idx| &address[..idx])
        .unwrap_or("")
}
