// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Legacy (CommonJS) loader seam
//!
//! The module graph reaches CommonJS and JSON code, and third-party package
//! resolution, only through [`LegacyLoader`]. [`CommonJsLoader`] is the
//! bundled implementation.
//!
//! Legacy modules evaluate in the loader's own host context and are cached
//! per loader by absolute location, so every execution context that reaches a
//! legacy module shares one export object and one global scope. Use one
//! loader per isolation domain when that sharing is unwanted.

mod cache;
mod commonjs;
mod hook;
mod resolver;

pub use cache::{CachedModule, ModuleCache};
pub use commonjs::{CommonJsEvaluator, CommonJsLoader, CommonJsModule};
pub use hook::{install_require_hook, HookFn, RequireCall, RequireHookGuard, RequireHooks, RequireInterceptor};
pub use resolver::{ModuleResolver, ResolveResult};

use crate::context::ExecutionContext;
use crate::error::Result;
use crate::value::Value;
use std::path::{Path, PathBuf};

/// Synchronous legacy module loader
pub trait LegacyLoader: Send + Sync {
    /// Resolve a bare package specifier to its entry file, searching from `anchor`
    fn resolve_package(&self, specifier: &str, anchor: &Path) -> Result<PathBuf>;

    /// Load `id` on behalf of the module at `parent` and return its exports.
    ///
    /// This is the lookup entry point observed by installed require hooks.
    fn require(&self, id: &str, parent: &Path) -> Result<Value>;

    /// Drop the cache entry for an absolute location. Entries it required
    /// stay cached.
    fn evict(&self, location: &Path) -> bool;

    /// Interception point of [`require`](Self::require)
    fn interceptor(&self) -> &RequireInterceptor;

    /// Global scope legacy modules evaluate against
    fn host_context(&self) -> &ExecutionContext;
}
