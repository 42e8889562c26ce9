// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module address resolution
//!
//! Turns a specifier plus an origin into a canonical address: absolute,
//! dot-segments collapsed, lower-cased. Resolution is pure; nothing here
//! touches the network or the registry.

use crate::config::LoaderConfig;
use crate::error::{LoaderError, Result};
use crate::module_system::module::ModuleKind;
use url::Url;

/// Address schemes treated as fully qualified
pub const SCHEMES: &[&str] = &["http://", "https://", "file://"];

/// Module resolver
#[derive(Debug, Clone)]
pub struct ModuleResolver {
    /// Folder searched for bare specifiers
    dependency_folder: String,
    /// Extension appended to specifiers
    extension: String,
    /// Loader folder, used for empty/relative origins and `/` specifiers
    base: Option<String>,
    /// Upper bound on ancestor candidates
    max_lineage_depth: usize,
}

impl ModuleResolver {
    /// Create a resolver with default settings and no base address
    pub fn new() -> Self {
        Self::from_config(&LoaderConfig::default())
    }

    /// Create a resolver from loader configuration
    pub fn from_config(config: &LoaderConfig) -> Self {
        Self {
            dependency_folder: config.dependency_folder.trim_matches('/').to_string(),
            extension: config.extension.clone(),
            base: config
                .base_address
                .as_deref()
                .map(|b| b.trim_end_matches('/').to_string()),
            max_lineage_depth: config.max_lineage_depth.max(1),
        }
    }

    /// Set the loader folder
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into().trim_end_matches('/').to_string());
        self
    }

    /// The loader folder, if configured
    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    /// Folder searched for bare specifiers
    pub fn dependency_folder(&self) -> &str {
        &self.dependency_folder
    }

    /// Check if a specifier is already a full address
    pub fn is_fully_qualified(specifier: &str) -> bool {
        let lower = specifier.get(..8).unwrap_or(specifier).to_ascii_lowercase();
        SCHEMES.iter().any(|scheme| lower.starts_with(scheme))
    }

    /// Classify a specifier
    pub fn kind_of(&self, specifier: &str) -> ModuleKind {
        if specifier.starts_with('.')
            || specifier.starts_with('/')
            || Self::is_fully_qualified(specifier)
        {
            ModuleKind::Local
        } else {
            ModuleKind::Nodal
        }
    }

    /// Resolve a module specifier against an origin
    pub fn resolve(&self, specifier: &str, origin: &str) -> Result<String> {
        if specifier.is_empty() {
            return Err(LoaderError::UnresolvedSpecifier);
        }

        // Fully qualified: verbatim
        if Self::is_fully_qualified(specifier) {
            return Ok(specifier.to_lowercase());
        }

        let (directory, relative) = if let Some(rest) = specifier.strip_prefix("./") {
            (self.absolute_origin(specifier, origin)?, rest.to_string())
        } else if specifier.starts_with("../") {
            (self.absolute_origin(specifier, origin)?, specifier.to_string())
        } else if let Some(rest) = specifier.strip_prefix('/') {
            (self.root_directory(specifier, origin)?, rest.to_string())
        } else {
            (
                self.absolute_origin(specifier, origin)?,
                format!("{}/{}", self.dependency_folder, specifier),
            )
        };

        let relative = self.with_extension(relative);
        let joined = format!("{}/{}", directory, relative);
        let url = Url::parse(&joined)
            .map_err(|e| LoaderError::invalid_address(specifier, origin, e))?;

        Ok(url.as_str().to_lowercase())
    }

    /// Candidate addresses for a bare specifier, nearest first
    pub fn lineage<'a>(&'a self, specifier: &'a str, origin: &str) -> Lineage<'a> {
        Lineage {
            resolver: self,
            specifier,
            origin: origin.to_string(),
            last: None,
            depth: 0,
        }
    }

    fn with_extension(&self, mut relative: String) -> String {
        if !self.extension.is_empty()
            && !relative
                .to_lowercase()
                .ends_with(&self.extension.to_lowercase())
        {
            relative.push_str(&self.extension);
        }
        relative
    }

    /// Absolute form of the origin, without a trailing slash
    fn absolute_origin(&self, specifier: &str, origin: &str) -> Result<String> {
        let candidate = if Self::is_fully_qualified(origin) {
            origin.to_string()
        } else {
            match &self.base {
                Some(base) if origin.is_empty() => base.clone(),
                Some(base) => format!("{}/{}", base, origin.trim_start_matches("./")),
                None => {
                    return Err(LoaderError::invalid_address(
                        specifier,
                        origin,
                        "origin is not absolute and no base address is configured",
                    ));
                }
            }
        };

        let url = Url::parse(&candidate)
            .map_err(|e| LoaderError::invalid_address(specifier, origin, e))?;
        Ok(url.as_str().trim_end_matches('/').to_string())
    }

    /// Directory `/`-prefixed specifiers are searched from
    fn root_directory(&self, specifier: &str, origin: &str) -> Result<String> {
        if let Some(base) = &self.base {
            return self.absolute_origin(specifier, base);
        }

        let url = Url::parse(&self.absolute_origin(specifier, origin)?)
            .map_err(|e| LoaderError::invalid_address(specifier, origin, e))?;
        let root = url
            .join("/")
            .map_err(|e| LoaderError::invalid_address(specifier, origin, e))?;
        Ok(root.as_str().trim_end_matches('/').to_string())
    }
}

impl Default for ModuleResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// One step of a lineage search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineageStep {
    /// Origin the candidate was resolved from
    pub origin: String,
    /// Candidate address
    pub address: String,
}

/// Walks a bare specifier up the origin's ancestors.
///
/// Each step appends one `/..` to the origin. Iteration ends when two
/// consecutive candidates coincide (the root was reached), when the
/// configured depth is used up, or when a candidate fails to resolve.
pub struct Lineage<'a> {
    resolver: &'a ModuleResolver,
    specifier: &'a str,
    origin: String,
    last: Option<String>,
    depth: usize,
}

impl Iterator for Lineage<'_> {
    type Item = LineageStep;

    fn next(&mut self) -> Option<Self::Item> {
        if self.depth >= self.resolver.max_lineage_depth {
            return None;
        }

        let origin = if self.depth == 0 {
            self.origin.clone()
        } else {
            format!("{}{}", self.origin, "/..".repeat(self.depth))
        };
        let address = self.resolver.resolve(self.specifier, &origin).ok()?;

        if self.last.as_deref() == Some(address.as_str()) {
            self.depth = self.resolver.max_lineage_depth;
            return None;
        }

        self.depth += 1;
        self.last = Some(address.clone());
        Some(LineageStep { origin, address })
    }
}
