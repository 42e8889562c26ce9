// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Lazy module initialization and the bound `require()`

use crate::error::{LoaderError, ModuleError, Result};
use crate::host::CodeHost;
use crate::module_system::module::{InitState, ModuleHandle};
use crate::module_system::registry::ModuleRegistry;
use crate::module_system::resolver::ModuleResolver;
use crate::value::Value;
use anyhow::anyhow;
use tracing::{debug, error};

/// Runs module bodies on first use.
///
/// Everything here is synchronous: by the time a body runs, the load queue
/// has drained and every statically discovered dependency is registered.
pub struct ModuleInitializer<'a> {
    registry: &'a ModuleRegistry,
    resolver: &'a ModuleResolver,
    host: &'a dyn CodeHost,
}

impl<'a> ModuleInitializer<'a> {
    /// Create an initializer over a registry
    pub fn new(
        registry: &'a ModuleRegistry,
        resolver: &'a ModuleResolver,
        host: &'a dyn CodeHost,
    ) -> Self {
        Self {
            registry,
            resolver,
            host,
        }
    }

    /// Run the module body if it has not run yet.
    ///
    /// Failures are stored on the module and the module still ends up
    /// initialized, so a broken module is never retried.
    pub fn initialize(&self, module: &ModuleHandle) {
        let (unit, address, directory, exports) = {
            let record = module.borrow();
            if record.state != InitState::Uninitialized {
                return;
            }
            if record.error.is_some() {
                drop(record);
                module.update(|m| m.state = InitState::Initialized);
                return;
            }

            let unit = match (&record.factory, &record.source) {
                (Some(factory), _) => Ok(factory.clone()),
                (None, Some(_)) => self.host.compile(&record),
                (None, None) => Err(anyhow!("module {} has no source", record.address)),
            };
            (
                unit,
                record.address.clone(),
                record.directory.clone(),
                record.exports.clone(),
            )
        };

        debug!("Initializing {}", address);
        module.update(|m| m.state = InitState::Executing);

        let result = unit.and_then(|body| {
            let require = Require {
                initializer: self,
                directory: directory.clone(),
            };
            body(&require, &exports, module, &address, &directory)
        });

        module.update(|m| {
            if let Err(err) = result {
                error!("Error executing module {}: {:#}", address, err);
                m.error = Some(ModuleError::ExecutionFailure {
                    address: address.clone(),
                    message: format!("{:#}", err),
                });
            }
            m.state = InitState::Initialized;
        });
    }

    /// Resolve `specifier` from `origin`, initialize the target, return its exports
    pub fn require(&self, specifier: &str, origin: &str) -> Result<Value> {
        let address = self.resolver.resolve(specifier, origin)?;
        let module = self
            .registry
            .get(&address)
            .ok_or_else(|| LoaderError::UnregisteredModule(address.clone()))?;

        if let Some(err) = module.error().filter(ModuleError::is_load_failure) {
            return Err(err.into());
        }

        // A module still executing is part of a cycle: hand out what it has so far.
        self.initialize(&module);
        Ok(module.exports())
    }
}

/// The `require` handed to a module body, bound to the module's directory
pub struct Require<'a> {
    initializer: &'a ModuleInitializer<'a>,
    directory: String,
}

impl Require<'_> {
    /// `require(specifier)`
    pub fn call(&self, specifier: &str) -> Result<Value> {
        self.initializer.require(specifier, &self.directory)
    }

    /// `require.resolve(specifier)`
    pub fn resolve(&self, specifier: &str) -> Result<String> {
        self.initializer.resolver.resolve(specifier, &self.directory)
    }

    /// Directory relative specifiers resolve against
    pub fn directory(&self) -> &str {
        &self.directory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{LinkedHost, NoCodeHost};
    use crate::module_system::module::{factory, Factory, Module, ModuleKind};
    use std::cell::Cell;
    use std::rc::Rc;

    fn functional(address: &str, factory: Factory) -> ModuleHandle {
        ModuleHandle::new(Module::functional(address, factory))
    }

    #[test]
    fn test_body_runs_once() {
        let runs = Rc::new(Cell::new(0));
        let counter = Rc::clone(&runs);
        let mut registry = ModuleRegistry::new();
        let module = functional(
            "http://h/a.js",
            factory(move |_, exports, _, _, _| {
                counter.set(counter.get() + 1);
                exports.as_object().unwrap().set("n", 1.0);
                Ok(())
            }),
        );
        registry.register(module.clone());

        let resolver = ModuleResolver::new();
        let init = ModuleInitializer::new(&registry, &resolver, &NoCodeHost);
        let first = init.require("./a", "http://h").unwrap();
        let second = init.require("./a", "http://h").unwrap();

        assert_eq!(runs.get(), 1);
        assert!(first.same_value(&second));
        assert_eq!(first.get("n").as_number(), Some(1.0));
        assert!(module.is_initialized());
    }

    #[test]
    fn test_execution_failure_is_stored_not_retried() {
        let runs = Rc::new(Cell::new(0));
        let counter = Rc::clone(&runs);
        let mut registry = ModuleRegistry::new();
        let module = functional(
            "http://h/broken.js",
            factory(move |_, _, _, _, _| {
                counter.set(counter.get() + 1);
                anyhow::bail!("ReferenceError: Globa is not defined")
            }),
        );
        registry.register(module.clone());

        let resolver = ModuleResolver::new();
        let init = ModuleInitializer::new(&registry, &resolver, &NoCodeHost);
        init.initialize(&module);
        init.initialize(&module);

        assert_eq!(runs.get(), 1);
        assert!(module.is_initialized());
        assert!(matches!(
            module.error(),
            Some(ModuleError::ExecutionFailure { ref message, .. }) if message.contains("Globa")
        ));
        // Exports are still handed out
        assert!(init.require("./broken", "http://h").is_ok());
    }

    #[test]
    fn test_unregistered_module() {
        let registry = ModuleRegistry::new();
        let resolver = ModuleResolver::new();
        let init = ModuleInitializer::new(&registry, &resolver, &NoCodeHost);
        assert!(matches!(
            init.require("./missing", "http://h"),
            Err(LoaderError::UnregisteredModule(addr)) if addr == "http://h/missing.js"
        ));
    }

    #[test]
    fn test_source_without_host_is_execution_failure() {
        let mut registry = ModuleRegistry::new();
        let module = ModuleHandle::new(Module::new("http://h/a.js", ModuleKind::Local));
        module.update(|m| m.source = Some("exports.a = 1;".to_string()));
        registry.register(module.clone());

        let resolver = ModuleResolver::new();
        let init = ModuleInitializer::new(&registry, &resolver, &NoCodeHost);
        init.initialize(&module);
        assert!(matches!(module.error(), Some(ModuleError::ExecutionFailure { .. })));
    }

    #[test]
    fn test_require_is_bound_to_module_directory() {
        let mut host = LinkedHost::new();
        host.link("http://h/lib/a.js", |require, exports, _, _, _| {
            let b = require.call("./b")?;
            exports.as_object().unwrap().set("b", b);
            Ok(())
        });
        host.link("http://h/lib/b.js", |_, _, module, _, _| {
            module.set_exports(Value::from("from b"));
            Ok(())
        });

        let mut registry = ModuleRegistry::new();
        for address in ["http://h/lib/a.js", "http://h/lib/b.js"] {
            let module = ModuleHandle::new(Module::new(address, ModuleKind::Local));
            module.update(|m| m.source = Some(String::new()));
            registry.register(module);
        }

        let resolver = ModuleResolver::new();
        let init = ModuleInitializer::new(&registry, &resolver, &host);
        let a = init.require("./lib/a", "http://h").unwrap();
        assert_eq!(a.get("b").as_str(), Some("from b"));
    }

    #[test]
    fn test_cycle_sees_partial_exports() {
        let mut host = LinkedHost::new();
        host.link("http://h/a.js", |require, exports, _, _, _| {
            exports.as_object().unwrap().set("early", true);
            let b = require.call("./b")?;
            exports.as_object().unwrap().set("b_saw_early", b.get("saw_early"));
            Ok(())
        });
        host.link("http://h/b.js", |require, exports, _, _, _| {
            let a = require.call("./a")?;
            exports.as_object().unwrap().set("saw_early", a.get("early"));
            Ok(())
        });

        let mut registry = ModuleRegistry::new();
        for address in ["http://h/a.js", "http://h/b.js"] {
            let module = ModuleHandle::new(Module::new(address, ModuleKind::Local));
            module.update(|m| m.source = Some(String::new()));
            registry.register(module);
        }

        let resolver = ModuleResolver::new();
        let init = ModuleInitializer::new(&registry, &resolver, &host);
        let a = init.require("./a", "http://h").unwrap();
        assert!(matches!(a.get("b_saw_early"), Value::Boolean(true)));
    }
}
