// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the module loader

use thiserror::Error;

/// Result type for loader operations
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Failures recorded on a module record.
///
/// These are cloned out of the registry whenever a caller consults the
/// failed module, so they only carry owned text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleError {
    /// The transport could not deliver the module source
    #[error("Can't load module '{address}'{}: {reason}", status_suffix(.status))]
    FetchFailure {
        /// Address that was requested
        address: String,
        /// Transport status, when the transport produced one
        status: Option<u16>,
        /// Human readable cause
        reason: String,
    },

    /// A bare specifier was not found anywhere along the origin's lineage
    #[error("Can't find module '{specifier}' (searched {})", .tried.join(", "))]
    LineageExhausted {
        /// The specifier as written by the importer
        specifier: String,
        /// Every address attempted, nearest first
        tried: Vec<String>,
    },

    /// The module body failed while being compiled or run
    #[error("Error executing module '{address}': {message}")]
    ExecutionFailure {
        /// Address of the failing module
        address: String,
        /// Error text produced by the code host or the body
        message: String,
    },
}

impl ModuleError {
    /// Whether this error means the module source never arrived
    pub fn is_load_failure(&self) -> bool {
        !matches!(self, Self::ExecutionFailure { .. })
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|code| format!(" (HTTP status {})", code))
        .unwrap_or_default()
}

/// Errors that can occur while resolving, loading, or requiring modules
#[derive(Debug, Error)]
pub enum LoaderError {
    /// No specifier was supplied
    #[error("No id supplied")]
    UnresolvedSpecifier,

    /// The specifier and origin could not be combined into an absolute address
    #[error("Cannot resolve '{specifier}' from origin '{origin}': {reason}")]
    InvalidAddress {
        /// Specifier being resolved
        specifier: String,
        /// Origin it was resolved against
        origin: String,
        /// Reason for failure
        reason: String,
    },

    /// `require` reached an address that was never registered
    #[error("Calling unregistered module '{0}'")]
    UnregisteredModule(String),

    /// A module-level failure surfaced to the caller
    #[error(transparent)]
    Module(#[from] ModuleError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system error
    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    /// Config file parsing error
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl LoaderError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid address error
    pub fn invalid_address(
        specifier: impl Into<String>,
        origin: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        Self::InvalidAddress {
            specifier: specifier.into(),
            origin: origin.into(),
            reason: reason.to_string(),
        }
    }
}
