// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the module loader

use crate::module_system::ModuleStatus;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for loader operations
pub type Result<T> = std::result::Result<T, VmError>;

/// Boxed error raised by a collaborator (script engine, evaluator)
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while resolving, linking or evaluating modules
#[derive(Debug, Error)]
pub enum VmError {
    /// The referencing module identity is not an absolute location
    #[error("Invalid referencing module identity '{0}': must be an absolute path")]
    InvalidReferencingIdentity(String),

    /// A bare specifier could not be found by package resolution
    #[error("Cannot find package '{specifier}' from '{anchor}'")]
    UnresolvedPackage {
        /// Package specifier
        specifier: String,
        /// Location resolution was anchored at
        anchor: PathBuf,
    },

    /// A legacy require id matched no file
    #[error("Cannot find module '{0}'")]
    ModuleNotFound(String),

    /// Module source text could not be read
    #[error("Cannot read module source '{path}': {source}")]
    SourceRead {
        /// Location that was read
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// The resolved location has no loadable module format
    #[error("Cannot load '{0}': unsupported module format")]
    UnsupportedModuleFormat(String),

    /// The entry module location is not absolute
    #[error("Invalid entry location '{0}': must be an absolute path")]
    InvalidEntryLocation(PathBuf),

    /// A reserved capability was called
    #[error("{0} is unimplemented")]
    Unimplemented(&'static str),

    /// A static or dynamic edge leads back to a module on its own referencing chain
    #[error("Circular import detected: {}", .0.join(" -> "))]
    CircularImport(Vec<String>),

    /// A record was asked to move to a status it cannot reach
    #[error("Module '{identifier}' cannot move from {from} to {to}")]
    InvalidStatus {
        /// Record identifier
        identifier: String,
        /// Current status
        from: ModuleStatus,
        /// Requested status
        to: ModuleStatus,
    },

    /// A record was evaluated before linking finished
    #[error("Module '{0}' must be linked before evaluation")]
    NotLinked(String),

    /// A record already failed and cannot be linked or evaluated again
    #[error("Module '{identifier}' previously failed: {reason}")]
    ModuleErrored {
        /// Record identifier
        identifier: String,
        /// Message of the original failure
        reason: String,
    },

    /// A built-in capability name is not registered with the host
    #[error("No such built-in module: '{0}'")]
    UnknownBuiltin(String),

    /// Invalid loader configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Failure raised by the script engine or legacy evaluator, propagated unchanged
    #[error(transparent)]
    Engine(BoxError),

    /// File system error
    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VmError {
    /// Wrap a collaborator failure
    pub fn engine(err: impl Into<BoxError>) -> Self {
        Self::Engine(err.into())
    }

    /// Create an error for a reserved, not yet implemented capability
    pub fn unimplemented(what: &'static str) -> Self {
        Self::Unimplemented(what)
    }

    /// Create an unresolved package error
    pub fn unresolved_package(specifier: impl Into<String>, anchor: impl Into<PathBuf>) -> Self {
        Self::UnresolvedPackage {
            specifier: specifier.into(),
            anchor: anchor.into(),
        }
    }

    /// Create a source read error
    pub fn source_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::SourceRead {
            path: path.into(),
            source,
        }
    }
}
