// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Require interception
//!
//! Each loader owns a [`RequireInterceptor`] holding a stack of layers in
//! front of its real lookup. Installing hooks pushes a layer; the returned
//! [`RequireHookGuard`] takes that layer out again when restored or dropped.
//!
//! Hooks are commonly used to evict stale cache entries before a lookup.
//! Eviction only removes the named entry: modules it required stay cached and
//! are served stale on the next load.

use super::LegacyLoader;
use crate::error::Result;
use crate::value::Value;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;

/// One intercepted lookup
#[derive(Debug, Clone, Copy)]
pub struct RequireCall<'a> {
    /// Id passed to require
    pub id: &'a str,
    /// Module performing the require
    pub parent: &'a Path,
}

/// Callback observing a lookup
pub type HookFn = Arc<dyn Fn(&RequireCall<'_>) + Send + Sync>;

/// `before`/`after` callbacks for [`install_require_hook`]
#[derive(Clone, Default)]
pub struct RequireHooks {
    before: Option<HookFn>,
    after: Option<HookFn>,
}

impl RequireHooks {
    /// No callbacks
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` immediately before each lookup
    pub fn before(mut self, f: impl Fn(&RequireCall<'_>) + Send + Sync + 'static) -> Self {
        self.before = Some(Arc::new(f));
        self
    }

    /// Run `f` immediately after each lookup, whether it succeeded or not
    pub fn after(mut self, f: impl Fn(&RequireCall<'_>) + Send + Sync + 'static) -> Self {
        self.after = Some(Arc::new(f));
        self
    }
}

struct Layer {
    id: u64,
    hooks: RequireHooks,
}

#[derive(Default)]
struct LayerStack {
    next_id: u64,
    layers: Vec<Arc<Layer>>,
}

/// Runs the `after` hook when dropped, so it also fires on error and unwind
struct AfterGuard<'a, 'c> {
    after: Option<&'a HookFn>,
    call: &'a RequireCall<'c>,
}

impl Drop for AfterGuard<'_, '_> {
    fn drop(&mut self) {
        if let Some(after) = self.after {
            after(self.call);
        }
    }
}

/// Run `layers` outermost (last installed) first, ending in `base`
fn run_layers(
    layers: &[Arc<Layer>],
    call: &RequireCall<'_>,
    base: &dyn Fn(&RequireCall<'_>) -> Result<Value>,
) -> Result<Value> {
    let Some((outer, inner)) = layers.split_last() else {
        return base(call);
    };
    if let Some(before) = &outer.hooks.before {
        before(call);
    }
    let _after = AfterGuard {
        after: outer.hooks.after.as_ref(),
        call,
    };
    run_layers(inner, call, base)
}

/// Interceptable lookup entry point of a loader
#[derive(Clone, Default)]
pub struct RequireInterceptor {
    stack: Arc<RwLock<LayerStack>>,
}

impl RequireInterceptor {
    /// An interceptor with no hooks installed
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a lookup through the installed layers, ending in `base`
    pub fn call(
        &self,
        call: &RequireCall<'_>,
        base: &dyn Fn(&RequireCall<'_>) -> Result<Value>,
    ) -> Result<Value> {
        // Copy out of the lock: hooks and nested requires may install or restore.
        let layers = self.stack.read().layers.clone();
        run_layers(&layers, call, base)
    }

    /// Check whether any hook layer is active
    pub fn is_hooked(&self) -> bool {
        !self.stack.read().layers.is_empty()
    }

    /// Wrap the current lookup with `hooks`
    pub fn install(&self, hooks: RequireHooks) -> RequireHookGuard {
        let mut stack = self.stack.write();
        let id = stack.next_id;
        stack.next_id += 1;
        stack.layers.push(Arc::new(Layer { id, hooks }));
        tracing::debug!(layer = id, "require hook installed");

        RequireHookGuard {
            stack: Arc::clone(&self.stack),
            id: Some(id),
        }
    }
}

/// Installed hook. Removes its own layer exactly once, either via
/// [`restore`](Self::restore) or on drop. Layers installed before or after it
/// are left in place, so guards may be restored in any order.
#[must_use = "dropping the guard immediately removes the hook"]
pub struct RequireHookGuard {
    stack: Arc<RwLock<LayerStack>>,
    id: Option<u64>,
}

impl RequireHookGuard {
    /// Remove this hook from the lookup. Later calls do nothing.
    pub fn restore(&mut self) {
        if let Some(id) = self.id.take() {
            self.stack.write().layers.retain(|layer| layer.id != id);
            tracing::debug!(layer = id, "require hook restored");
        }
    }

    /// Check whether the hook is still installed by this guard
    pub fn is_active(&self) -> bool {
        self.id.is_some()
    }
}

impl Drop for RequireHookGuard {
    fn drop(&mut self) {
        self.restore();
    }
}

/// Intercept every lookup of `loader` until the guard is restored or dropped
pub fn install_require_hook(loader: &dyn LegacyLoader, hooks: RequireHooks) -> RequireHookGuard {
    loader.interceptor().install(hooks)
}
