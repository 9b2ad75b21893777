// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Built-in host capabilities
//!
//! A built-in is addressed by a bare name (`path`) or by the configured
//! scheme prefix (`node:path`). Its namespace is produced by a provider that
//! runs every time a synthetic module is built for it, so callers always
//! observe the host's current state.

use crate::error::{Result, VmError};
use crate::value::{NativeFunction, Object, Value};
use dashmap::DashMap;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::sync::Arc;

/// Produces the current namespace of a built-in capability
pub type NamespaceProvider = Arc<dyn Fn() -> Value + Send + Sync>;

/// Registry of host capabilities importable by name
#[derive(Clone)]
pub struct BuiltinRegistry {
    scheme: Arc<str>,
    providers: Arc<DashMap<String, NamespaceProvider>>,
}

impl BuiltinRegistry {
    /// Create an empty registry accepting the given scheme prefix
    pub fn new(scheme: &str) -> Self {
        Self {
            scheme: Arc::from(scheme),
            providers: Arc::new(DashMap::new()),
        }
    }

    /// Create a registry with the default `path` and `os` capabilities
    pub fn with_defaults(scheme: &str) -> Self {
        let registry = Self::new(scheme);
        registry.register("path", Arc::new(path::create_module));
        registry.register("os", Arc::new(os::create_module));
        registry
    }

    /// Register (or replace) a capability
    pub fn register(&self, name: impl Into<String>, provider: NamespaceProvider) {
        let name = name.into();
        tracing::debug!(%name, "registering built-in module");
        self.providers.insert(name, provider);
    }

    /// Scheme prefix accepted in front of names
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Check if a specifier names a registered capability
    pub fn is_builtin(&self, specifier: &str) -> bool {
        self.canonical_name(specifier).is_some()
    }

    /// Registered name addressed by a specifier, with any scheme prefix removed
    pub fn canonical_name<'a>(&self, specifier: &'a str) -> Option<&'a str> {
        let name = if self.scheme.is_empty() {
            specifier
        } else {
            specifier.strip_prefix(&*self.scheme).unwrap_or(specifier)
        };
        self.providers.contains_key(name).then_some(name)
    }

    /// Obtain the current namespace of a capability
    pub fn namespace(&self, specifier: &str) -> Result<Value> {
        let name = self
            .canonical_name(specifier)
            .ok_or_else(|| VmError::UnknownBuiltin(specifier.to_string()))?;
        let provider = self
            .providers
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| VmError::UnknownBuiltin(specifier.to_string()))?;
        Ok(provider())
    }

    /// Registered capability names
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::with_defaults("node:")
    }
}

impl std::fmt::Debug for BuiltinRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinRegistry")
            .field("scheme", &self.scheme)
            .field("names", &self.names())
            .finish()
    }
}

fn string_arg(args: &[Value], index: usize, func: &str) -> Result<String> {
    match args.get(index) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(VmError::engine(format!(
            "TypeError: {}: argument {} must be a string, got {}",
            func,
            index,
            other.type_of()
        ))),
        None => Err(VmError::engine(format!(
            "TypeError: {}: missing argument {}",
            func, index
        ))),
    }
}

/// `path` capability
pub mod path {
    use super::*;

    /// Create the path module namespace
    pub fn create_module() -> Value {
        let exports = Object::new();

        exports.set("sep", MAIN_SEPARATOR.to_string());
        exports.set("delimiter", if cfg!(windows) { ";" } else { ":" });

        exports.set(
            "basename",
            Value::Function(NativeFunction::new("basename", |args| {
                let path = string_arg(args, 0, "basename")?;
                let ext = args.get(1).and_then(Value::as_str);
                Ok(Value::String(basename(&path, ext)))
            })),
        );
        exports.set(
            "dirname",
            Value::Function(NativeFunction::new("dirname", |args| {
                Ok(Value::String(dirname(&string_arg(args, 0, "dirname")?)))
            })),
        );
        exports.set(
            "extname",
            Value::Function(NativeFunction::new("extname", |args| {
                Ok(Value::String(extname(&string_arg(args, 0, "extname")?)))
            })),
        );
        exports.set(
            "isAbsolute",
            Value::Function(NativeFunction::new("isAbsolute", |args| {
                Ok(Value::Boolean(Path::new(&string_arg(args, 0, "isAbsolute")?).is_absolute()))
            })),
        );
        exports.set(
            "join",
            Value::Function(NativeFunction::new("join", |args| {
                let parts = (0..args.len())
                    .map(|i| string_arg(args, i, "join"))
                    .collect::<Result<Vec<_>>>()?;
                let parts: Vec<&str> = parts.iter().map(String::as_str).collect();
                Ok(Value::String(join(&parts)))
            })),
        );
        exports.set(
            "normalize",
            Value::Function(NativeFunction::new("normalize", |args| {
                Ok(Value::String(normalize(&string_arg(args, 0, "normalize")?)))
            })),
        );

        Value::Object(exports)
    }

    /// path.basename(path, ext?)
    pub fn basename(path: &str, ext: Option<&str>) -> String {
        let name = Path::new(path)
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        match ext {
            Some(ext) if name.ends_with(ext) && name != ext => {
                name[..name.len() - ext.len()].to_string()
            }
            _ => name,
        }
    }

    /// path.dirname(path)
    pub fn dirname(path: &str) -> String {
        Path::new(path)
            .parent()
            .map(|s| s.to_string_lossy().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| ".".to_string())
    }

    /// path.extname(path)
    pub fn extname(path: &str) -> String {
        Path::new(path)
            .extension()
            .map(|s| format!(".{}", s.to_string_lossy()))
            .unwrap_or_default()
    }

    /// path.join(...paths)
    pub fn join(paths: &[&str]) -> String {
        let mut result = PathBuf::new();
        for p in paths {
            result.push(p.trim_start_matches(['/', '\\']));
        }
        let joined = result.to_string_lossy().to_string();
        match paths.first() {
            Some(first) if first.starts_with('/') => normalize(&format!("/{}", joined)),
            _ => normalize(&joined),
        }
    }

    /// path.normalize(path)
    pub fn normalize(path: &str) -> String {
        let mut components: Vec<&str> = Vec::new();
        let is_absolute = path.starts_with('/');

        for component in path.split(['/', '\\']) {
            match component {
                "" | "." => continue,
                ".." => {
                    if !components.is_empty() && components.last() != Some(&"..") {
                        components.pop();
                    } else if !is_absolute {
                        components.push("..");
                    }
                }
                c => components.push(c),
            }
        }

        let result = components.join("/");
        if is_absolute {
            format!("/{}", result)
        } else if result.is_empty() {
            ".".to_string()
        } else {
            result
        }
    }
}

/// `os` capability
pub mod os {
    use super::*;

    /// Create the os module namespace
    pub fn create_module() -> Value {
        let exports = Object::new();

        exports.set("EOL", if cfg!(windows) { "\r\n" } else { "\n" });
        exports.set(
            "devNull",
            if cfg!(windows) { "\\\\.\\nul" } else { "/dev/null" },
        );
        exports.set("platform", platform());
        exports.set("arch", arch());

        Value::Object(exports)
    }

    /// os.platform() in Node.js spelling
    pub fn platform() -> &'static str {
        match std::env::consts::OS {
            "windows" => "win32",
            "macos" => "darwin",
            other => other,
        }
    }

    /// os.arch() in Node.js spelling
    pub fn arch() -> &'static str {
        match std::env::consts::ARCH {
            "x86_64" => "x64",
            "aarch64" => "arm64",
            "x86" => "ia32",
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_builtin() {
        let registry = BuiltinRegistry::default();
        assert!(registry.is_builtin("path"));
        assert!(registry.is_builtin("node:path"));
        assert!(registry.is_builtin("os"));
        assert!(!registry.is_builtin("lodash"));
        assert!(!registry.is_builtin("node:lodash"));
        assert_eq!(registry.canonical_name("node:os"), Some("os"));
    }

    #[test]
    fn test_custom_scheme() {
        let registry = BuiltinRegistry::with_defaults("spacey:");
        assert!(registry.is_builtin("spacey:path"));
        assert!(!registry.is_builtin("node:path"));
    }

    #[test]
    fn test_provider_runs_on_every_lookup() {
        let registry = BuiltinRegistry::new("node:");
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        registry.register(
            "clock",
            Arc::new(move || {
                let n = counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
                let exports = Object::new();
                exports.set("tick", n as f64);
                Value::Object(exports)
            }),
        );

        assert_eq!(registry.namespace("clock").unwrap().get("tick"), Value::Number(1.0));
        assert_eq!(registry.namespace("node:clock").unwrap().get("tick"), Value::Number(2.0));
    }

    #[test]
    fn test_unknown_builtin() {
        let registry = BuiltinRegistry::default();
        assert!(matches!(
            registry.namespace("node:nope"),
            Err(VmError::UnknownBuiltin(_))
        ));
    }

    #[test]
    fn test_path_helpers() {
        assert_eq!(path::basename("/a/b/file.mjs", Some(".mjs")), "file");
        assert_eq!(path::dirname("/a/b/file.mjs"), "/a/b");
        assert_eq!(path::dirname("file.mjs"), ".");
        assert_eq!(path::extname("/a/b/file.cjs"), ".cjs");
        assert_eq!(path::normalize("/a/./b/../c"), "/a/c");
        assert_eq!(path::join(&["/a", "b", "../c"]), "/a/c");
        assert_eq!(path::join(&["a", "b"]), "a/b");
    }

    #[test]
    fn test_path_namespace_functions() {
        let ns = path::create_module();
        let Value::Function(join) = ns.get("join") else {
            panic!("join is not a function");
        };
        let joined = join.call(&["/x".into(), "y.mjs".into()]).unwrap();
        assert_eq!(joined, Value::String("/x/y.mjs".to_string()));
        assert!(join.call(&[Value::Number(1.0)]).is_err());
    }
}
