// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module records

use crate::context::ExecutionContext;
use crate::engine::CompiledModule;
use crate::error::{Result, VmError};
use crate::value::{Namespace, PropertyMap, Value};
use parking_lot::Mutex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

/// Lifecycle of a module record. Progress is monotonic; `Evaluated` and
/// `Errored` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleStatus {
    /// Built, dependencies not yet linked
    Unlinked,
    /// Dependencies are being linked
    Linking,
    /// Whole static graph below this record is linked
    Linked,
    /// Module body is running
    Evaluating,
    /// Namespace is available
    Evaluated,
    /// Linking or evaluation failed
    Errored,
}

impl ModuleStatus {
    /// Check whether `next` directly follows this status
    pub fn can_transition_to(self, next: ModuleStatus) -> bool {
        use ModuleStatus::*;
        matches!(
            (self, next),
            (Unlinked, Linking)
                | (Linking, Linked)
                | (Linking, Errored)
                | (Linked, Evaluating)
                | (Evaluating, Evaluated)
                | (Evaluating, Errored)
        )
    }

    /// Check if no further transition is possible
    pub fn is_terminal(self) -> bool {
        matches!(self, ModuleStatus::Evaluated | ModuleStatus::Errored)
    }

    /// Lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            ModuleStatus::Unlinked => "unlinked",
            ModuleStatus::Linking => "linking",
            ModuleStatus::Linked => "linked",
            ModuleStatus::Evaluating => "evaluating",
            ModuleStatus::Evaluated => "evaluated",
            ModuleStatus::Errored => "errored",
        }
    }
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record compiled from module text
pub struct SourceModule {
    location: PathBuf,
    url: Url,
    compiled: Arc<dyn CompiledModule>,
    requests: Vec<String>,
}

impl SourceModule {
    pub(crate) fn new(location: PathBuf, url: Url, compiled: Arc<dyn CompiledModule>) -> Self {
        let requests = compiled.requested_modules();
        Self {
            location,
            url,
            compiled,
            requests,
        }
    }

    /// Resolved location the text was read from
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Canonical origin URL exposed as `import.meta.url`
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Static import specifiers, in source order
    pub fn requests(&self) -> &[String] {
        &self.requests
    }

    pub(crate) fn compiled(&self) -> &Arc<dyn CompiledModule> {
        &self.compiled
    }
}

impl fmt::Debug for SourceModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceModule")
            .field("location", &self.location)
            .field("requests", &self.requests)
            .finish_non_exhaustive()
    }
}

/// A record exposing a precomputed namespace under a fixed export list
#[derive(Debug)]
pub struct SyntheticModule {
    export_names: Vec<String>,
    origin: Value,
    whole_as_default: bool,
}

impl SyntheticModule {
    /// Export every own key of `origin`; non-object values become `default`
    pub(crate) fn own_keys(origin: Value) -> Self {
        let keys = match &origin {
            Value::Object(obj) => Some(obj.keys()),
            Value::Namespace(ns) => Some(ns.names().map(str::to_string).collect()),
            _ => None,
        };

        match keys {
            Some(export_names) => Self {
                export_names,
                origin,
                whole_as_default: false,
            },
            None => Self::default_only(origin),
        }
    }

    /// Export the whole of `origin` as `default`
    pub(crate) fn default_only(origin: Value) -> Self {
        Self {
            export_names: vec!["default".to_string()],
            origin,
            whole_as_default: true,
        }
    }

    /// The fixed export name set
    pub fn export_names(&self) -> &[String] {
        &self.export_names
    }

    /// Copy each export's current value out of the origin
    pub(crate) fn snapshot(&self) -> Namespace {
        let exports: PropertyMap = if self.whole_as_default {
            PropertyMap::from([("default".to_string(), self.origin.clone())])
        } else {
            self.export_names
                .iter()
                .map(|name| (name.clone(), self.origin.get(name)))
                .collect()
        };
        Namespace::new(exports)
    }
}

/// The two record representations
#[derive(Debug)]
pub enum ModuleKind {
    /// Compiled from text, has dependency edges
    Source(SourceModule),
    /// Fixed export table, a leaf of the graph
    Synthetic(SyntheticModule),
}

struct RecordState {
    status: ModuleStatus,
    dependencies: Vec<(String, ModuleRecord)>,
    namespace: Option<Namespace>,
    failure: Option<String>,
}

struct RecordInner {
    identifier: String,
    context: ExecutionContext,
    lineage: Vec<String>,
    kind: ModuleKind,
    state: Mutex<RecordState>,
}

/// A node of the module graph. Cloning yields another handle to the same record.
#[derive(Clone)]
pub struct ModuleRecord {
    inner: Arc<RecordInner>,
}

impl ModuleRecord {
    pub(crate) fn new(
        identifier: String,
        context: ExecutionContext,
        lineage: Vec<String>,
        kind: ModuleKind,
    ) -> Self {
        Self {
            inner: Arc::new(RecordInner {
                identifier,
                context,
                lineage,
                kind,
                state: Mutex::new(RecordState {
                    status: ModuleStatus::Unlinked,
                    dependencies: Vec::new(),
                    namespace: None,
                    failure: None,
                }),
            }),
        }
    }

    /// Specifier or location the record was created from
    pub fn identifier(&self) -> &str {
        &self.inner.identifier
    }

    /// Context the record is bound to for its whole lifetime
    pub fn context(&self) -> &ExecutionContext {
        &self.inner.context
    }

    /// Identifiers of the referencing chain that led to this record
    pub fn lineage(&self) -> &[String] {
        &self.inner.lineage
    }

    /// Current status
    pub fn status(&self) -> ModuleStatus {
        self.inner.state.lock().status
    }

    /// Source or synthetic representation
    pub fn kind(&self) -> &ModuleKind {
        &self.inner.kind
    }

    /// Check if this is a source record
    pub fn is_source(&self) -> bool {
        matches!(self.inner.kind, ModuleKind::Source(_))
    }

    /// Check if this is a synthetic record
    pub fn is_synthetic(&self) -> bool {
        matches!(self.inner.kind, ModuleKind::Synthetic(_))
    }

    /// Export namespace, once evaluated
    pub fn namespace(&self) -> Option<Namespace> {
        self.inner.state.lock().namespace.clone()
    }

    /// Linked static dependencies as (specifier, record), in request order
    pub fn dependencies(&self) -> Vec<(String, ModuleRecord)> {
        self.inner.state.lock().dependencies.clone()
    }

    /// Message of the failure that moved the record to `Errored`
    pub fn failure(&self) -> Option<String> {
        self.inner.state.lock().failure.clone()
    }

    /// Reference identity
    pub fn ptr_eq(&self, other: &ModuleRecord) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn transition(&self, to: ModuleStatus) -> Result<()> {
        let mut state = self.inner.state.lock();
        if !state.status.can_transition_to(to) {
            return Err(VmError::InvalidStatus {
                identifier: self.inner.identifier.clone(),
                from: state.status,
                to,
            });
        }
        tracing::trace!(module = %self.inner.identifier, from = %state.status, %to, "status");
        state.status = to;
        Ok(())
    }

    pub(crate) fn add_dependency(&self, specifier: String, record: ModuleRecord) {
        self.inner.state.lock().dependencies.push((specifier, record));
    }

    pub(crate) fn complete(&self, namespace: Namespace) -> Result<()> {
        self.transition(ModuleStatus::Evaluated)?;
        self.inner.state.lock().namespace = Some(namespace);
        Ok(())
    }

    /// Move to `Errored` if the current status allows it and remember why
    pub(crate) fn fail(&self, err: &VmError) {
        let mut state = self.inner.state.lock();
        if state.status.can_transition_to(ModuleStatus::Errored) {
            tracing::debug!(module = %self.inner.identifier, error = %err, "module errored");
            state.status = ModuleStatus::Errored;
            state.failure = Some(err.to_string());
        }
    }

    pub(crate) fn errored(&self) -> VmError {
        VmError::ModuleErrored {
            identifier: self.inner.identifier.clone(),
            reason: self.failure().unwrap_or_default(),
        }
    }
}

impl fmt::Debug for ModuleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRecord")
            .field("identifier", &self.inner.identifier)
            .field("context", &self.inner.context)
            .field("status", &self.status())
            .field("kind", &self.inner.kind)
            .finish()
    }
}

/// The referencing side of an edge: identity, context and the chain above it
#[derive(Debug, Clone)]
pub struct Referrer {
    identifier: String,
    context: ExecutionContext,
    lineage: Vec<String>,
}

impl Referrer {
    /// A referrer that is not itself a module record (the virtual root of a run)
    pub fn new(identifier: impl Into<String>, context: ExecutionContext) -> Self {
        Self {
            identifier: identifier.into(),
            context,
            lineage: Vec::new(),
        }
    }

    /// `record` as the origin of a dynamic `import()`.
    ///
    /// Same identity and context, but no lineage: a dynamic request always
    /// builds afresh, even when it targets the record itself or an ancestor.
    pub fn dynamic(record: &ModuleRecord) -> Self {
        Self::new(record.identifier(), record.context().clone())
    }

    /// Identity relative specifiers are resolved against
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Context new records are bound to
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Module identifiers above a record created from this referrer
    pub fn lineage(&self) -> &[String] {
        &self.lineage
    }
}

impl From<&ModuleRecord> for Referrer {
    fn from(record: &ModuleRecord) -> Self {
        let mut lineage = record.lineage().to_vec();
        lineage.push(record.identifier().to_string());
        Self {
            identifier: record.identifier().to_string(),
            context: record.context().clone(),
            lineage,
        }
    }
}
