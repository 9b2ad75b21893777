// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Linker: specifier dispatch and graph driving

use super::format::{self, Dispatch};
use super::record::{ModuleKind, ModuleRecord, ModuleStatus, Referrer, SourceModule};
use super::resolver::{Location, SpecifierResolver};
use crate::builtins::BuiltinRegistry;
use crate::config::LoaderConfig;
use crate::engine::{ImportMeta, ModuleEnvironment, ScriptEngine};
use crate::error::{Result, VmError};
use crate::fs::{SourceReader, TokioFs};
use crate::legacy::LegacyLoader;
use crate::value::Namespace;
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::sync::Arc;

struct LinkerInner {
    engine: Arc<dyn ScriptEngine>,
    legacy: Arc<dyn LegacyLoader>,
    reader: Arc<dyn SourceReader>,
    builtins: BuiltinRegistry,
    config: LoaderConfig,
}

/// The linking service shared by every record of every graph it builds.
///
/// Cloning is cheap; all clones share the same collaborators. The linker is
/// also the resolver callback of each source record: static edges are linked
/// by [`link_module`](Self::link_module), dynamic ones through the record's
/// [`DynamicImporter`], and both re-enter [`link`](Self::link). Only static
/// edges back onto their own lineage fail with `CircularImport`.
#[derive(Clone)]
pub struct Linker {
    inner: Arc<LinkerInner>,
}

/// Builder for [`Linker`]
pub struct LinkerBuilder {
    engine: Arc<dyn ScriptEngine>,
    legacy: Arc<dyn LegacyLoader>,
    reader: Option<Arc<dyn SourceReader>>,
    builtins: Option<BuiltinRegistry>,
    config: LoaderConfig,
}

impl LinkerBuilder {
    /// Use a custom file reader (defaults to [`TokioFs`])
    pub fn reader(mut self, reader: Arc<dyn SourceReader>) -> Self {
        self.reader = Some(reader);
        self
    }

    /// Use a custom capability table (defaults to `path` and `os` under the
    /// configured scheme)
    pub fn builtins(mut self, builtins: BuiltinRegistry) -> Self {
        self.builtins = Some(builtins);
        self
    }

    /// Use a custom configuration
    pub fn config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    /// Finish the linker
    pub fn build(self) -> Linker {
        let builtins = self
            .builtins
            .unwrap_or_else(|| BuiltinRegistry::with_defaults(&self.config.builtin_scheme));

        Linker {
            inner: Arc::new(LinkerInner {
                engine: self.engine,
                legacy: self.legacy,
                reader: self.reader.unwrap_or_else(|| Arc::new(TokioFs)),
                builtins,
                config: self.config,
            }),
        }
    }
}

impl Linker {
    /// Create a linker with default reader, capabilities and configuration
    pub fn new(engine: Arc<dyn ScriptEngine>, legacy: Arc<dyn LegacyLoader>) -> Self {
        Self::builder(engine, legacy).build()
    }

    /// Start building a linker
    pub fn builder(engine: Arc<dyn ScriptEngine>, legacy: Arc<dyn LegacyLoader>) -> LinkerBuilder {
        LinkerBuilder {
            engine,
            legacy,
            reader: None,
            builtins: None,
            config: LoaderConfig::default(),
        }
    }

    /// The script engine
    pub fn engine(&self) -> &Arc<dyn ScriptEngine> {
        &self.inner.engine
    }

    /// The legacy loader
    pub fn legacy(&self) -> &Arc<dyn LegacyLoader> {
        &self.inner.legacy
    }

    /// The file reader
    pub fn reader(&self) -> &Arc<dyn SourceReader> {
        &self.inner.reader
    }

    /// The capability table
    pub fn builtins(&self) -> &BuiltinRegistry {
        &self.inner.builtins
    }

    /// The configuration
    pub fn config(&self) -> &LoaderConfig {
        &self.inner.config
    }

    /// Resolve `specifier` against the referrer's identity
    pub fn resolve_specifier(&self, specifier: &str, referrer: &Referrer) -> Result<Location> {
        SpecifierResolver::new(&self.inner.builtins, self.inner.legacy.as_ref())
            .resolve(specifier, referrer.identifier())
    }

    /// Produce the record for one edge of the graph.
    ///
    /// Built-ins and legacy formats become synthetic records, declarative
    /// source becomes a source record. Nothing is cached: every call builds
    /// afresh.
    pub async fn link(&self, specifier: &str, referrer: &Referrer) -> Result<ModuleRecord> {
        if self.builtins().is_builtin(specifier) {
            return self.build_synthetic(specifier, referrer).await;
        }

        let location = self.resolve_specifier(specifier, referrer)?;
        let Some(path) = location.path() else {
            return self.build_synthetic(specifier, referrer).await;
        };
        let target = path.display().to_string();

        match format::detect(path, self.config(), self.reader().as_ref()).await? {
            Some(Dispatch::Source) => {
                if referrer.lineage().contains(&target) {
                    let mut chain = referrer.lineage().to_vec();
                    chain.push(target);
                    return Err(VmError::CircularImport(chain));
                }
                self.build_source(&target, referrer).await
            }
            Some(Dispatch::Synthetic) => self.build_synthetic(&target, referrer).await,
            None => Err(VmError::UnsupportedModuleFormat(specifier.to_string())),
        }
    }

    /// Link every static dependency below `record`, depth first in request
    /// order. Records that are already linked (or further) are left alone.
    pub fn link_module<'a>(&'a self, record: &'a ModuleRecord) -> BoxFuture<'a, Result<()>> {
        async move {
            match record.status() {
                ModuleStatus::Unlinked => {}
                ModuleStatus::Errored => return Err(record.errored()),
                ModuleStatus::Linking => {
                    let mut chain = record.lineage().to_vec();
                    chain.push(record.identifier().to_string());
                    return Err(VmError::CircularImport(chain));
                }
                _ => return Ok(()),
            }

            record.transition(ModuleStatus::Linking)?;

            if let ModuleKind::Source(source) = record.kind() {
                let referrer = Referrer::from(record);
                for specifier in source.requests() {
                    let dep = match self.link(specifier, &referrer).await {
                        Ok(dep) => dep,
                        Err(e) => {
                            record.fail(&e);
                            return Err(e);
                        }
                    };
                    if let Err(e) = self.link_module(&dep).await {
                        record.fail(&e);
                        return Err(e);
                    }
                    record.add_dependency(specifier.clone(), dep);
                }
            }

            record.transition(ModuleStatus::Linked)
        }
        .boxed()
    }

    /// Evaluate a linked record: its static dependencies first, in request
    /// order, then its own body. Returns the export namespace.
    pub fn evaluate<'a>(&'a self, record: &'a ModuleRecord) -> BoxFuture<'a, Result<Namespace>> {
        async move {
            match record.status() {
                ModuleStatus::Linked => {}
                ModuleStatus::Evaluated => {
                    if let Some(namespace) = record.namespace() {
                        return Ok(namespace);
                    }
                }
                ModuleStatus::Errored => return Err(record.errored()),
                ModuleStatus::Unlinked | ModuleStatus::Linking | ModuleStatus::Evaluating => {
                    return Err(VmError::NotLinked(record.identifier().to_string()));
                }
            }

            record.transition(ModuleStatus::Evaluating)?;

            let result = match record.kind() {
                ModuleKind::Synthetic(synthetic) => Ok(synthetic.snapshot()),
                ModuleKind::Source(source) => self.evaluate_source(record, source).await,
            };

            match result {
                Ok(namespace) => {
                    record.complete(namespace.clone())?;
                    tracing::debug!(module = %record.identifier(), "evaluated");
                    Ok(namespace)
                }
                Err(e) => {
                    record.fail(&e);
                    Err(e)
                }
            }
        }
        .boxed()
    }

    async fn evaluate_source(&self, record: &ModuleRecord, source: &SourceModule) -> Result<Namespace> {
        let mut imports = HashMap::new();
        for (specifier, dep) in record.dependencies() {
            let namespace = self.evaluate(&dep).await?;
            imports.insert(specifier, namespace);
        }

        let env = ModuleEnvironment {
            context: record.context().clone(),
            import_meta: ImportMeta::new(source.location())?,
            imports,
            dynamic: DynamicImporter::new(self.clone(), Referrer::dynamic(record)),
        };

        source.compiled().evaluate(env).await
    }
}

impl std::fmt::Debug for Linker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Linker")
            .field("builtins", &self.inner.builtins)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// `import()` suspension point handed to an evaluating source module.
///
/// Carries the linker and the requesting module's identity and context, so a
/// dynamic request resolves, links and evaluates like a static edge of that
/// module. It starts a fresh lineage, so importing the module itself or one
/// of its importers builds a new record instead of failing. The caller
/// resumes only once the target is fully evaluated.
#[derive(Clone)]
pub struct DynamicImporter {
    linker: Linker,
    referrer: Referrer,
}

impl DynamicImporter {
    pub(crate) fn new(linker: Linker, referrer: Referrer) -> Self {
        Self { linker, referrer }
    }

    /// Identity of the module performing the import
    pub fn referrer(&self) -> &Referrer {
        &self.referrer
    }

    /// Link and evaluate `specifier`, returning its namespace
    pub async fn import(&self, specifier: &str) -> Result<Namespace> {
        tracing::debug!(specifier, referrer = %self.referrer.identifier(), "dynamic import suspended");

        let record = self.linker.link(specifier, &self.referrer).await?;
        self.linker.link_module(&record).await?;
        let namespace = self.linker.evaluate(&record).await?;

        tracing::debug!(specifier, referrer = %self.referrer.identifier(), "dynamic import resumed");
        Ok(namespace)
    }
}
