// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # spacey-vm
//!
//! Context-scoped module loading for the Spacey JavaScript engine.
//!
//! Runs an ECMAScript module graph inside an isolated execution context:
//!
//! - Specifier resolution (built-ins, relative and absolute paths, packages)
//! - Format dispatch by extension and nearest `package.json` `"type"`
//! - Source records linked and evaluated depth first, with `import()`
//! - Synthetic records wrapping built-ins and CommonJS/JSON exports
//! - A CommonJS loader with scoped require hooks
//!
//! The script engine itself is a collaborator behind [`ScriptEngine`] and
//! [`CommonJsEvaluator`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use spacey_vm::{BuiltinRegistry, CommonJsLoader, Linker, RunOptions};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> spacey_vm::Result<()> {
//!     let builtins = BuiltinRegistry::with_defaults("node:");
//!     let legacy = Arc::new(CommonJsLoader::new(my_evaluator(), builtins.clone()));
//!     let linker = Linker::builder(my_engine(), legacy).builtins(builtins).build();
//!
//!     let record = linker.run("/srv/app/main.mjs", RunOptions::default()).await?;
//!     println!("{:?}", record.namespace());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builtins;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod fs;
pub mod legacy;
pub mod module_system;
pub mod value;

// Re-exports
pub use builtins::BuiltinRegistry;
pub use config::{ExportMode, LoaderConfig};
pub use context::ExecutionContext;
pub use engine::{CompileOptions, CompiledModule, ImportMeta, ModuleEnvironment, ScriptEngine};
pub use error::{Result, VmError};
pub use legacy::{
    install_require_hook, CommonJsEvaluator, CommonJsLoader, CommonJsModule, LegacyLoader,
    RequireHookGuard, RequireHooks,
};
pub use module_system::{
    DynamicImporter, Linker, ModuleFormat, ModuleRecord, ModuleStatus, Referrer, RunOptions,
};
pub use value::{Namespace, NativeFunction, Object, Value};

/// Version of the spacey-vm crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
