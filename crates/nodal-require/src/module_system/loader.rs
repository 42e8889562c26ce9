// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Loader context and sessions
//!
//! A session starts from one root specifier, fetches everything reachable
//! through statically visible `require` calls, and completes when the load
//! queue drains. Only then is the root initialized; its body pulls the rest
//! of the graph in synchronously through the bound `require`.
//!
//! Fetch completions are processed one at a time on the caller's task, so
//! registry and queue mutation is never concurrent.

use crate::config::LoaderConfig;
use crate::error::{LoaderError, ModuleError, Result};
use crate::fetch::{CacheBuster, Fetched, SchemeFetcher, SourceFetcher};
use crate::host::{CodeHost, NoCodeHost};
use crate::module_system::initializer::ModuleInitializer;
use crate::module_system::module::{Factory, Module, ModuleHandle, ModuleKind};
use crate::module_system::queue::LoadQueue;
use crate::module_system::registry::ModuleRegistry;
use crate::module_system::resolver::ModuleResolver;
use crate::module_system::scanner::scan;
use crate::value::Value;
use futures::future::LocalBoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Callback fired once per session with the root module and the id as requested
pub type ReadyCallback = Box<dyn FnOnce(&ModuleHandle, &str)>;

/// Parameters of [`LoaderContext::require_async`]
pub struct RequireRequest {
    /// Specifier of the root module
    pub id: String,
    /// Location `id` is resolved against
    pub origin: String,
    /// Fired after the root module has been initialized
    pub on_ready: Option<ReadyCallback>,
    /// Ready-to-run body; skips fetching entirely
    pub factory: Option<Factory>,
}

impl RequireRequest {
    /// Request `id` with an empty origin
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            origin: String::new(),
            on_ready: None,
            factory: None,
        }
    }

    /// Set the origin
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Set the completion callback
    pub fn on_ready(mut self, callback: impl FnOnce(&ModuleHandle, &str) + 'static) -> Self {
        self.on_ready = Some(Box::new(callback));
        self
    }

    /// Supply the body directly
    pub fn factory(mut self, factory: Factory) -> Self {
        self.factory = Some(factory);
        self
    }
}

/// Progress of a bare specifier up its origin's lineage
#[derive(Debug, Clone)]
struct Search {
    specifier: String,
    origin: String,
    /// Addresses that missed, nearest first
    tried: Vec<String>,
}

/// A finished fetch, carried back to the session driver
struct FetchCompletion {
    address: String,
    search: Option<Search>,
    outcome: Result<Fetched>,
}

/// State of the session in progress
struct Session {
    id: String,
    address: String,
    on_ready: Option<ReadyCallback>,
    failures: Vec<ModuleError>,
}

/// Owns the registry shared by every session of one loader
pub struct LoaderContext {
    config: LoaderConfig,
    resolver: ModuleResolver,
    registry: ModuleRegistry,
    queue: LoadQueue,
    fetcher: Arc<dyn SourceFetcher>,
    host: Box<dyn CodeHost>,
    cache: CacheBuster,
    session: Option<Session>,
    in_flight: FuturesUnordered<LocalBoxFuture<'static, FetchCompletion>>,
}

impl LoaderContext {
    /// Create a loader over a transport; no code host is installed
    pub fn new(config: LoaderConfig, fetcher: Arc<dyn SourceFetcher>) -> Self {
        Self {
            resolver: ModuleResolver::from_config(&config),
            cache: CacheBuster::new(config.caching_frequency),
            config,
            registry: ModuleRegistry::new(),
            queue: LoadQueue::new(),
            fetcher,
            host: Box::new(NoCodeHost),
            session: None,
            in_flight: FuturesUnordered::new(),
        }
    }

    /// Create a loader fetching `http(s)` and `file` addresses
    pub fn from_config(config: LoaderConfig) -> Result<Self> {
        let fetcher = SchemeFetcher::new(&config)?;
        Ok(Self::new(config, Arc::new(fetcher)))
    }

    /// Install the code host used for fetched modules
    pub fn with_host(mut self, host: impl CodeHost + 'static) -> Self {
        self.host = Box::new(host);
        self
    }

    /// Loader configuration
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Module registry
    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Address resolver
    pub fn resolver(&self) -> &ModuleResolver {
        &self.resolver
    }

    /// Canonical address for `id` from `origin` (`require.resolve`)
    pub fn resolve(&self, id: &str, origin: &str) -> Result<String> {
        self.resolver.resolve(id, origin)
    }

    /// Register a listener fired each time the load queue drains
    pub fn on_drain(&mut self, listener: impl FnMut(u64) + 'static) {
        self.queue.on_drain(listener);
    }

    /// Load `request.id` and everything it statically requires, then
    /// initialize it.
    ///
    /// Returns the root module, or the first terminal load failure of the
    /// session (every failure is logged).
    #[instrument(skip_all, fields(id = %request.id, origin = %request.origin))]
    pub async fn require_async(&mut self, request: RequireRequest) -> Result<ModuleHandle> {
        let RequireRequest {
            id,
            origin,
            on_ready,
            factory,
        } = request;

        let address = self.resolver.resolve(&id, &origin)?;
        let session = Session {
            id: id.clone(),
            address,
            on_ready,
            failures: Vec::new(),
        };

        if let Some(factory) = factory {
            self.session = Some(session);
            let result = self.require_from_factory(&id, &origin, factory);
            self.session = None;
            return result;
        }

        self.run_session(session, &origin, true).await
    }

    /// Fetch and register the graph rooted at `id` without running anything
    #[instrument(skip(self))]
    pub async fn preload(&mut self, id: &str, origin: &str) -> Result<ModuleHandle> {
        let address = self.resolver.resolve(id, origin)?;
        let session = Session {
            id: id.to_string(),
            address,
            on_ready: None,
            failures: Vec::new(),
        };
        self.run_session(session, origin, false).await
    }

    /// Register a ready-to-run body at the address of `id` and initialize it.
    ///
    /// Replaces whatever was registered at that address. Importers that
    /// already hold the previous exports keep them.
    pub fn require_from_factory(
        &mut self,
        id: &str,
        origin: &str,
        factory: Factory,
    ) -> Result<ModuleHandle> {
        let address = self.resolver.resolve(id, origin)?;
        let module = ModuleHandle::new(Module::functional(address.clone(), factory));

        if self.registry.register(module.clone()).is_some() {
            debug!("Replaced module at {} with a functional module", address);
        }

        self.initializer().initialize(&module);

        if let Some(session) = self.session.as_mut() {
            if let Some(callback) = session.on_ready.take() {
                callback(&module, &session.id);
            }
        }

        Ok(module)
    }

    /// Synchronous `require` against modules registered by earlier sessions
    pub fn require(&self, id: &str, origin: &str) -> Result<Value> {
        self.initializer().require(id, origin)
    }

    fn initializer(&self) -> ModuleInitializer<'_> {
        ModuleInitializer::new(&self.registry, &self.resolver, self.host.as_ref())
    }

    async fn run_session(
        &mut self,
        session: Session,
        origin: &str,
        initialize: bool,
    ) -> Result<ModuleHandle> {
        info!("Loading '{}' from '{}'", session.id, origin);
        let id = session.id.clone();
        let address = session.address.clone();
        self.session = Some(session);

        if let Err(e) = self.request(&id, origin) {
            self.session = None;
            return Err(e);
        }

        while !self.queue.is_empty() {
            match self.in_flight.next().await {
                Some(completion) => self.complete(completion),
                None => break,
            }
        }

        let session = self
            .session
            .take()
            .ok_or(LoaderError::UnregisteredModule(address))?;
        self.finish(session, initialize)
    }

    /// Resolve a specifier and make sure its address is registered and fetched
    fn request(&mut self, specifier: &str, origin: &str) -> Result<()> {
        let address = self.resolver.resolve(specifier, origin)?;
        let kind = self.resolver.kind_of(specifier);
        let search = (kind == ModuleKind::Nodal).then(|| Search {
            specifier: specifier.to_string(),
            origin: origin.to_string(),
            tried: Vec::new(),
        });
        self.request_address(address, kind, search, None);
        Ok(())
    }

    /// Register `address` and start its fetch unless it is known already.
    ///
    /// `alias` is the record of a lineage search moving up one level.
    fn request_address(
        &mut self,
        address: String,
        kind: ModuleKind,
        search: Option<Search>,
        alias: Option<ModuleHandle>,
    ) {
        if self.queue.contains(&address) || self.registry.contains(&address) {
            debug!("Already requested: {}", address);
            let Some(existing) = self.registry.get(&address) else {
                return;
            };
            if let Some(search) = &search {
                self.registry.converge(&search.tried, &existing);
            }
            // Failed in an earlier session: report it again rather than refetching
            if let Some(err) = existing.error().filter(ModuleError::is_load_failure) {
                if let Some(session) = self.session.as_mut() {
                    if !session.failures.contains(&err) {
                        error!("{}", err);
                        session.failures.push(err);
                    }
                }
            }
            return;
        }

        let module = match alias {
            Some(module) => {
                module.update(|m| m.relocate(address.clone()));
                module
            }
            None => ModuleHandle::new(Module::new(address.clone(), kind)),
        };
        self.registry.alias(address.clone(), module);
        self.queue.enqueue(&address);

        let url = self.cache.apply(&address);
        let fetcher = Arc::clone(&self.fetcher);
        debug!("Fetching {}", url);
        self.in_flight.push(
            async move {
                let outcome = fetcher.fetch(&url).await;
                FetchCompletion {
                    address,
                    search,
                    outcome,
                }
            }
            .boxed_local(),
        );
    }

    fn complete(&mut self, completion: FetchCompletion) {
        let FetchCompletion {
            address,
            search,
            outcome,
        } = completion;

        let module = match self.registry.get(&address) {
            Some(module) if module.kind() != ModuleKind::Functional => module,
            _ => {
                debug!("Discarding fetch of {}; record was replaced", address);
                self.queue.dequeue(&address);
                return;
            }
        };

        match outcome {
            Ok(Fetched::Source(source)) => {
                let directory = module.directory();
                let dependencies = scan(&source);
                module.update(|m| m.source = Some(source));

                // Dependencies go in before this module comes out, or the queue could drain early
                for specifier in dependencies {
                    if let Err(e) = self.request(&specifier, &directory) {
                        warn!("Skipping '{}' required by {}: {}", specifier, address, e);
                    }
                }
            }
            Ok(Fetched::Missing { status }) => {
                self.miss(&module, &address, search, Some(status), missing_reason(status));
            }
            Err(e) => {
                self.miss(&module, &address, search, None, e.to_string());
            }
        }

        self.queue.dequeue(&address);
    }

    /// Handle a fetch that produced no source
    fn miss(
        &mut self,
        module: &ModuleHandle,
        address: &str,
        search: Option<Search>,
        status: Option<u16>,
        reason: String,
    ) {
        let Some(mut search) = search else {
            self.fail(
                module,
                ModuleError::FetchFailure {
                    address: address.to_string(),
                    status,
                    reason,
                },
            );
            return;
        };

        search.tried.push(address.to_string());
        let next = self
            .resolver
            .lineage(&search.specifier, &search.origin)
            .nth(search.tried.len());

        match next {
            Some(step) => {
                debug!("'{}' not at {} ({}), trying {}", search.specifier, address, reason, step.address);
                self.request_address(step.address, ModuleKind::Nodal, Some(search), Some(module.clone()));
            }
            None => {
                warn!("'{}' not found along its lineage", search.specifier);
                self.fail(
                    module,
                    ModuleError::LineageExhausted {
                        specifier: search.specifier,
                        tried: search.tried,
                    },
                );
            }
        }
    }

    fn fail(&mut self, module: &ModuleHandle, err: ModuleError) {
        error!("{}", err);
        module.update(|m| m.error = Some(err.clone()));
        if let Some(session) = self.session.as_mut() {
            session.failures.push(err);
        }
    }

    /// Wrap up the session once nothing is outstanding
    fn finish(&self, session: Session, initialize: bool) -> Result<ModuleHandle> {
        let Session {
            id,
            address,
            on_ready,
            mut failures,
        } = session;

        if !failures.is_empty() {
            error!("Loading '{}' failed with {} error(s)", id, failures.len());
            return Err(failures.remove(0).into());
        }

        let module = self
            .registry
            .get(&address)
            .ok_or_else(|| LoaderError::UnregisteredModule(address.clone()))?;

        if let Some(err) = self.reachable_load_failure(&module) {
            error!("Loading '{}' failed: {}", id, err);
            return Err(err.into());
        }

        if initialize {
            self.initializer().initialize(&module);
        }
        if let Some(callback) = on_ready {
            callback(&module, &id);
        }

        info!("Loaded '{}' as {}", id, module.address());
        Ok(module)
    }

    /// First load failure in the registered graph below `root`, root included.
    ///
    /// Records loaded by earlier sessions are not refetched, so their
    /// dependencies are walked through the registry instead.
    fn reachable_load_failure(&self, root: &ModuleHandle) -> Option<ModuleError> {
        let mut visited = HashSet::new();
        let mut pending = vec![root.clone()];

        while let Some(module) = pending.pop() {
            if !visited.insert(module.address()) {
                continue;
            }
            if let Some(err) = module.error().filter(ModuleError::is_load_failure) {
                return Some(err);
            }

            let record = module.borrow();
            let Some(source) = &record.source else {
                continue;
            };
            for specifier in scan(source) {
                let dependency = self
                    .resolver
                    .resolve(&specifier, &record.directory)
                    .ok()
                    .and_then(|address| self.registry.get(&address));
                if let Some(dependency) = dependency {
                    pending.push(dependency);
                }
            }
        }

        None
    }
}

/// Failure text for a transport answer without source
fn missing_reason(status: u16) -> String {
    match status {
        Fetched::NOT_FOUND => "not found".to_string(),
        400..=499 => "rejected by the server".to_string(),
        500..=599 => "server error".to_string(),
        _ => "no source returned".to_string(),
    }
}
