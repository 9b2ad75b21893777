// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! CommonJS loader

use super::cache::{CachedModule, ModuleCache};
use super::hook::{RequireCall, RequireInterceptor};
use super::resolver::{ModuleResolver, ResolveResult};
use super::LegacyLoader;
use crate::builtins::BuiltinRegistry;
use crate::context::ExecutionContext;
use crate::error::{Result, VmError};
use crate::value::{json_to_value, Object, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Runs the body of a CommonJS module
pub trait CommonJsEvaluator: Send + Sync {
    /// Execute `source` with the `module` bindings in scope.
    ///
    /// Assignments to `module.exports` replace [`CommonJsModule::exports`];
    /// property writes on `exports` mutate the object it holds.
    fn evaluate_commonjs(&self, source: &str, module: &mut CommonJsModule<'_>) -> Result<()>;
}

/// Bindings visible to a CommonJS module body
pub struct CommonJsModule<'a> {
    /// Absolute location of the module (`__filename`)
    pub filename: &'a Path,
    /// Directory of the module (`__dirname`)
    pub dirname: &'a Path,
    /// Global scope the body runs against
    pub context: &'a ExecutionContext,
    /// `module.exports`
    pub exports: Value,
    require: &'a (dyn Fn(&str) -> Result<Value> + 'a),
}

impl CommonJsModule<'_> {
    /// `require(id)` from inside this module
    pub fn require(&self, id: &str) -> Result<Value> {
        (self.require)(id)
    }
}

/// Synchronous loader for CommonJS and JSON modules
pub struct CommonJsLoader {
    resolver: ModuleResolver,
    cache: ModuleCache,
    builtins: BuiltinRegistry,
    evaluator: Arc<dyn CommonJsEvaluator>,
    interceptor: RequireInterceptor,
    host: ExecutionContext,
}

impl CommonJsLoader {
    /// Create a loader with its own host context
    pub fn new(evaluator: Arc<dyn CommonJsEvaluator>, builtins: BuiltinRegistry) -> Self {
        Self::with_host_context(evaluator, builtins, ExecutionContext::named("commonjs"))
    }

    /// Create a loader whose modules run against `host`
    pub fn with_host_context(
        evaluator: Arc<dyn CommonJsEvaluator>,
        builtins: BuiltinRegistry,
        host: ExecutionContext,
    ) -> Self {
        Self {
            resolver: ModuleResolver::new(builtins.clone()),
            cache: ModuleCache::new(),
            builtins,
            evaluator,
            interceptor: RequireInterceptor::new(),
            host,
        }
    }

    /// Get the module cache
    pub fn cache(&self) -> &ModuleCache {
        &self.cache
    }

    /// `require.resolve()`: the resolved location without loading
    pub fn resolve(&self, id: &str, parent: &Path) -> Result<ResolveResult> {
        self.resolver.resolve(id, parent)
    }

    fn load(&self, id: &str, parent: &Path) -> Result<Value> {
        match self.resolver.resolve(id, parent)? {
            ResolveResult::BuiltIn(name) => self.builtins.namespace(&name),
            ResolveResult::File(path) => self.load_script(&path, parent),
            ResolveResult::Json(path) => self.load_json(&path, parent),
            ResolveResult::Native(path) => {
                Err(VmError::UnsupportedModuleFormat(path.display().to_string()))
            }
        }
    }

    fn load_script(&self, path: &Path, parent: &Path) -> Result<Value> {
        self.cache.add_child(parent, path);

        // A hit on an entry still loading hands out its partial exports.
        if let Some(exports) = self.cache.exports(path) {
            tracing::trace!(module = %path.display(), "commonjs cache hit");
            return Ok(exports);
        }

        let source = std::fs::read_to_string(path).map_err(|e| VmError::source_read(path, e))?;
        let dirname = path.parent().unwrap_or(Path::new("/"));

        let initial = Value::Object(Object::new());
        self.cache.set(
            path.to_path_buf(),
            CachedModule::loading(path.to_path_buf(), Some(parent.to_path_buf()), initial.clone()),
        );

        tracing::debug!(module = %path.display(), "loading commonjs module");

        let require = |id: &str| self.require(id, path);
        let mut module = CommonJsModule {
            filename: path,
            dirname,
            context: &self.host,
            exports: initial,
            require: &require,
        };

        match self.evaluator.evaluate_commonjs(&source, &mut module) {
            Ok(()) => {
                self.cache.finish(path, module.exports.clone());
                Ok(module.exports)
            }
            Err(e) => {
                self.cache.delete(path);
                Err(e)
            }
        }
    }

    fn load_json(&self, path: &Path, parent: &Path) -> Result<Value> {
        self.cache.add_child(parent, path);

        if let Some(exports) = self.cache.exports(path) {
            return Ok(exports);
        }

        let content = std::fs::read_to_string(path).map_err(|e| VmError::source_read(path, e))?;
        let json: serde_json::Value = serde_json::from_str(&content)?;
        let value = json_to_value(&json);

        let mut entry = CachedModule::loading(path.to_path_buf(), Some(parent.to_path_buf()), value.clone());
        entry.loaded = true;
        self.cache.set(path.to_path_buf(), entry);

        Ok(value)
    }
}

impl LegacyLoader for CommonJsLoader {
    fn resolve_package(&self, specifier: &str, anchor: &Path) -> Result<PathBuf> {
        match self.resolver.resolve(specifier, anchor) {
            Ok(resolved) => resolved
                .path()
                .map(Path::to_path_buf)
                .ok_or_else(|| VmError::unresolved_package(specifier, anchor)),
            Err(VmError::ModuleNotFound(_)) => Err(VmError::unresolved_package(specifier, anchor)),
            Err(e) => Err(e),
        }
    }

    fn require(&self, id: &str, parent: &Path) -> Result<Value> {
        let call = RequireCall { id, parent };
        self.interceptor.call(&call, &|call: &RequireCall<'_>| self.load(call.id, call.parent))
    }

    fn evict(&self, location: &Path) -> bool {
        let evicted = self.cache.delete(location).is_some();
        if evicted {
            tracing::debug!(module = %location.display(), "evicted commonjs module");
        }
        evicted
    }

    fn interceptor(&self) -> &RequireInterceptor {
        &self.interceptor
    }

    fn host_context(&self) -> &ExecutionContext {
        &self.host
    }
}

impl std::fmt::Debug for CommonJsLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommonJsLoader")
            .field("cache", &self.cache)
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Each body is `<name>` or `<name> <dep>`: exports `{ name, dep }`
    struct Stub {
        runs: AtomicUsize,
    }

    impl CommonJsEvaluator for Stub {
        fn evaluate_commonjs(&self, source: &str, module: &mut CommonJsModule<'_>) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            let mut words = source.split_whitespace();
            let exports = Object::new();
            if let Some(name) = words.next() {
                if name == "throw" {
                    return Err(VmError::engine("boom"));
                }
                exports.set("name", name);
            }
            if let Some(dep) = words.next() {
                exports.set("dep", module.require(dep)?);
            }
            module.exports = Value::Object(exports);
            Ok(())
        }
    }

    fn loader() -> (CommonJsLoader, Arc<Stub>) {
        let stub = Arc::new(Stub { runs: AtomicUsize::new(0) });
        let loader = CommonJsLoader::new(stub.clone(), BuiltinRegistry::with_defaults("node:"));
        (loader, stub)
    }

    #[test]
    fn test_require_caches_by_location() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.cjs"), "a ./b.cjs").unwrap();
        fs::write(dir.path().join("b.cjs"), "b").unwrap();
        let main = dir.path().join("main.mjs");
        let (loader, stub) = loader();

        let first = loader.require("./a.cjs", &main).unwrap();
        let second = loader.require("./a.cjs", &main).unwrap();
        assert_eq!(first, second);
        assert_eq!(stub.runs.load(Ordering::SeqCst), 2);

        let a = loader.cache().get(&dir.path().join("a.cjs")).unwrap();
        assert!(a.loaded);
        assert_eq!(a.children, vec![dir.path().join("b.cjs")]);
        assert_eq!(first.get("dep").get("name"), Value::from("b"));
    }

    #[test]
    fn test_failed_module_is_not_cached() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bad.cjs"), "throw").unwrap();
        let main = dir.path().join("main.mjs");
        let (loader, _) = loader();

        assert!(loader.require("./bad.cjs", &main).is_err());
        assert!(!loader.cache().has(&dir.path().join("bad.cjs")));
    }

    #[test]
    fn test_json_and_builtins() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("data.json"), r#"{"a": 1, "b": [true]}"#).unwrap();
        let main = dir.path().join("main.cjs");
        let (loader, _) = loader();

        let data = loader.require("./data.json", &main).unwrap();
        assert_eq!(data.get("a"), Value::Number(1.0));
        assert_eq!(data.get("b").get("length"), Value::Number(1.0));

        let path = loader.require("node:path", &main).unwrap();
        assert!(matches!(path.get("join"), Value::Function(_)));
    }

    #[test]
    fn test_unresolved_package() {
        let dir = TempDir::new().unwrap();
        let (loader, _) = loader();
        let err = loader
            .resolve_package("no-such-package", &dir.path().join("main.mjs"))
            .unwrap_err();
        assert!(matches!(err, VmError::UnresolvedPackage { .. }));
    }

    #[test]
    fn test_evict_drops_only_named_entry() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.cjs"), "a ./b.cjs").unwrap();
        fs::write(dir.path().join("b.cjs"), "b").unwrap();
        let main = dir.path().join("main.mjs");
        let (loader, stub) = loader();

        loader.require("./a.cjs", &main).unwrap();
        assert!(loader.evict(&dir.path().join("a.cjs")));
        assert!(!loader.evict(&dir.path().join("a.cjs")));
        assert!(loader.cache().has(&dir.path().join("b.cjs")));

        loader.require("./a.cjs", &main).unwrap();
        assert_eq!(stub.runs.load(Ordering::SeqCst), 3);
    }
}
