// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Context-scoped module graph
//!
//! Turns specifiers into module records, links them into a graph bound to
//! one execution context, and evaluates the graph.
//!
//! ## Records
//! - source records, compiled from `.mjs` (or `"type": "module"` `.js`) text
//! - synthetic records, wrapping a built-in capability or a CommonJS/JSON
//!   export object behind a fixed export list
//!
//! ## Flow
//! - [`Linker::run`] builds the entry record, links, evaluates
//! - [`Linker::link`] dispatches one edge to a builder
//! - [`Linker::link_module`] / [`Linker::evaluate`] drive status transitions
//! - [`DynamicImporter`] re-enters the linker for `import()`
//!
//! There is no module cache: every edge traversal builds a fresh record.

mod format;
mod linker;
mod record;
mod resolver;
mod runner;
mod source;
mod synthetic;

pub use format::{Dispatch, ModuleFormat};
pub use linker::{DynamicImporter, Linker, LinkerBuilder};
pub use record::{ModuleKind, ModuleRecord, ModuleStatus, Referrer, SourceModule, SyntheticModule};
pub use resolver::{is_relative_path, normalize_path, Location, SpecifierResolver};
pub use runner::RunOptions;
