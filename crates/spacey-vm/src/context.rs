// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Execution contexts.
//!
//! An [`ExecutionContext`] is an isolated global scope. Handles are cheap to
//! clone; every clone addresses the same `globalThis`. Two distinct contexts
//! never share global state.

use crate::value::{Object, Value};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

struct ContextInner {
    id: Uuid,
    name: Option<String>,
    global: Object,
}

/// Handle to an isolated global scope
#[derive(Clone)]
pub struct ExecutionContext {
    inner: Arc<ContextInner>,
}

impl ExecutionContext {
    /// Create a fresh context with an empty global scope
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Create a fresh context carrying a diagnostic name
    pub fn named(name: impl Into<String>) -> Self {
        Self::build(Some(name.into()))
    }

    fn build(name: Option<String>) -> Self {
        let id = Uuid::new_v4();
        tracing::trace!(%id, ?name, "creating execution context");
        Self {
            inner: Arc::new(ContextInner {
                id,
                name,
                global: Object::new(),
            }),
        }
    }

    /// Unique identity of this context
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Diagnostic name, if any
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// The context's `globalThis`
    pub fn global(&self) -> &Object {
        &self.inner.global
    }

    /// Read a global binding, undefined when absent
    pub fn get_global(&self, key: &str) -> Value {
        self.inner.global.get(key)
    }

    /// Write a global binding
    pub fn set_global(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.inner.global.set(key, value);
    }

    /// Check whether two handles address the same context
    pub fn same_as(&self, other: &ExecutionContext) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for ExecutionContext {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for ExecutionContext {}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .finish_non_exhaustive()
    }
}
