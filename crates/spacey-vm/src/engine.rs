// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Script engine seam
//!
//! The loader never parses or runs module text itself. A [`ScriptEngine`]
//! compiles source into a [`CompiledModule`], which reports its static
//! imports and later evaluates inside a [`ModuleEnvironment`] prepared by the
//! linker.

use crate::context::ExecutionContext;
use crate::error::{Result, VmError};
use crate::module_system::DynamicImporter;
use crate::value::{Namespace, Object, Value};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use url::Url;

/// Options handed to the engine when compiling a source module
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Record identifier
    pub identifier: String,
    /// Context the module is bound to
    pub context: ExecutionContext,
    /// Canonical origin of the module
    pub url: Url,
}

/// Compiles module text and creates isolated contexts
pub trait ScriptEngine: Send + Sync {
    /// Create a fresh, isolated execution context
    fn create_context(&self) -> ExecutionContext {
        ExecutionContext::new()
    }

    /// Compile module source text
    fn compile_module(&self, source: &str, options: &CompileOptions) -> Result<Arc<dyn CompiledModule>>;
}

/// A compiled, not yet evaluated, source module
#[async_trait]
pub trait CompiledModule: Send + Sync {
    /// Static import specifiers, in source order
    fn requested_modules(&self) -> Vec<String>;

    /// Run the module body and produce its namespace.
    ///
    /// Every specifier from [`requested_modules`](Self::requested_modules)
    /// has a fully evaluated namespace in `env.imports`.
    async fn evaluate(&self, env: ModuleEnvironment) -> Result<Namespace>;
}

/// Everything a module body can reach while evaluating
#[derive(Clone)]
pub struct ModuleEnvironment {
    /// Context whose global scope the module mutates
    pub context: ExecutionContext,
    /// `import.meta`
    pub import_meta: ImportMeta,
    /// Namespaces of the static dependencies, keyed by specifier
    pub imports: HashMap<String, Namespace>,
    /// Suspension point for `import()`
    pub dynamic: DynamicImporter,
}

impl ModuleEnvironment {
    /// Namespace bound to a static import specifier
    pub fn import(&self, specifier: &str) -> Option<&Namespace> {
        self.imports.get(specifier)
    }
}

/// `import.meta` for a source module
#[derive(Debug, Clone)]
pub struct ImportMeta {
    /// The canonical URL of the module
    pub url: String,
    /// The directory of the module
    pub dirname: String,
    /// The filename of the module
    pub filename: String,
}

impl ImportMeta {
    /// Create import.meta for a module location
    pub fn new(module_path: &Path) -> Result<Self> {
        let url = file_url(module_path)?;
        let dirname = module_path
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        Ok(Self {
            url: url.to_string(),
            dirname,
            filename: module_path.display().to_string(),
        })
    }

    /// `import.meta.resolve()`, reserved
    pub fn resolve(&self, _specifier: &str) -> Result<String> {
        Err(VmError::unimplemented("import.meta.resolve"))
    }

    /// Convert to a script object
    pub fn to_value(&self) -> Value {
        let obj = Object::new();
        obj.set("url", self.url.as_str());
        obj.set("dirname", self.dirname.as_str());
        obj.set("filename", self.filename.as_str());
        Value::Object(obj)
    }
}

/// Canonical `file://` URL for an absolute location
pub fn file_url(path: &Path) -> Result<Url> {
    Url::from_file_path(path)
        .map_err(|_| VmError::InvalidReferencingIdentity(path.display().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_meta() {
        let meta = ImportMeta::new(Path::new("/home/user/project/main.mjs")).unwrap();
        assert_eq!(meta.url, "file:///home/user/project/main.mjs");
        assert_eq!(meta.dirname, "/home/user/project");
        assert_eq!(meta.filename, "/home/user/project/main.mjs");
    }

    #[test]
    fn test_import_meta_url_is_percent_encoded() {
        let meta = ImportMeta::new(Path::new("/srv/my app/main.mjs")).unwrap();
        assert_eq!(meta.url, "file:///srv/my%20app/main.mjs");
    }

    #[test]
    fn test_import_meta_resolve_is_reserved() {
        let meta = ImportMeta::new(Path::new("/a/main.mjs")).unwrap();
        assert!(matches!(
            meta.resolve("./dep.mjs"),
            Err(VmError::Unimplemented("import.meta.resolve"))
        ));
    }

    #[test]
    fn test_relative_path_has_no_url() {
        assert!(file_url(Path::new("relative/main.mjs")).is_err());
    }
}
