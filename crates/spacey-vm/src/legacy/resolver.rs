// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Require id resolution (node_modules algorithm)

use crate::builtins::BuiltinRegistry;
use crate::error::{Result, VmError};
use crate::module_system::{is_relative_path, normalize_path};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Result of resolving a require id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveResult {
    /// Built-in capability, by registered name
    BuiltIn(String),
    /// Script file
    File(PathBuf),
    /// JSON file
    Json(PathBuf),
    /// Native addon (.node file)
    Native(PathBuf),
}

impl ResolveResult {
    /// Resolved location, if this is not a built-in
    pub fn path(&self) -> Option<&Path> {
        match self {
            ResolveResult::BuiltIn(_) => None,
            ResolveResult::File(p) | ResolveResult::Json(p) | ResolveResult::Native(p) => Some(p),
        }
    }
}

/// Resolver for require ids
pub struct ModuleResolver {
    builtins: BuiltinRegistry,
    /// File extensions to try
    extensions: Vec<String>,
}

impl ModuleResolver {
    /// Create a resolver that recognizes the capabilities in `builtins`
    pub fn new(builtins: BuiltinRegistry) -> Self {
        Self {
            builtins,
            extensions: vec![
                ".js".to_string(),
                ".cjs".to_string(),
                ".json".to_string(),
                ".node".to_string(),
            ],
        }
    }

    /// Check if an id names a built-in
    pub fn is_builtin(&self, id: &str) -> bool {
        self.builtins.is_builtin(id)
    }

    /// Resolve `id` as required from the module at `parent_path`
    pub fn resolve(&self, id: &str, parent_path: &Path) -> Result<ResolveResult> {
        if let Some(name) = self.builtins.canonical_name(id) {
            return Ok(ResolveResult::BuiltIn(name.to_string()));
        }

        if is_relative_path(id) || Path::new(id).is_absolute() {
            return self
                .resolve_file(id, parent_path)?
                .ok_or_else(|| VmError::ModuleNotFound(id.to_string()));
        }

        self.resolve_node_modules(id, parent_path)
    }

    /// Resolve a file path, trying extensions and then the directory
    fn resolve_file(&self, id: &str, parent_path: &Path) -> Result<Option<ResolveResult>> {
        let parent_dir = parent_path.parent().unwrap_or(Path::new("/"));
        let path = normalize_path(&parent_dir.join(id));

        if let Some(found) = self.resolve_with_extensions(&path) {
            return Ok(Some(found));
        }

        if path.is_dir() {
            return self.resolve_directory(&path);
        }

        Ok(None)
    }

    /// Try the exact path, then the path with each extension appended
    fn resolve_with_extensions(&self, path: &Path) -> Option<ResolveResult> {
        if path.is_file() {
            return Some(self.categorize_file(path));
        }

        let filename = path.file_name()?.to_string_lossy().to_string();
        self.extensions
            .iter()
            .map(|ext| path.with_file_name(format!("{}{}", filename, ext)))
            .find(|candidate| candidate.is_file())
            .map(|candidate| self.categorize_file(&candidate))
    }

    /// Resolve a directory (package.json main, then index files)
    fn resolve_directory(&self, dir: &Path) -> Result<Option<ResolveResult>> {
        let package_json_path = dir.join("package.json");
        if package_json_path.is_file() {
            let content = std::fs::read_to_string(&package_json_path)?;
            let pkg: PackageJson = serde_json::from_str(&content)?;
            if let Some(main) = pkg.main {
                let main_path = normalize_path(&dir.join(&main));
                if let Some(found) = self.resolve_with_extensions(&main_path) {
                    return Ok(Some(found));
                }
            }
        }

        Ok(self
            .extensions
            .iter()
            .map(|ext| dir.join(format!("index{}", ext)))
            .find(|index| index.is_file())
            .map(|index| self.categorize_file(&index)))
    }

    /// Resolve a package from the nearest `node_modules` directory upward
    fn resolve_node_modules(&self, id: &str, parent_path: &Path) -> Result<ResolveResult> {
        let (package_name, subpath) = parse_package_specifier(id);

        let mut current = parent_path.parent();
        while let Some(dir) = current {
            let package_dir = dir.join("node_modules").join(package_name);

            if package_dir.is_dir() {
                let found = match subpath {
                    Some(sub) => {
                        let full = normalize_path(&package_dir.join(sub));
                        match self.resolve_with_extensions(&full) {
                            Some(found) => Some(found),
                            None if full.is_dir() => self.resolve_directory(&full)?,
                            None => None,
                        }
                    }
                    None => self.resolve_directory(&package_dir)?,
                };
                if let Some(found) = found {
                    tracing::trace!(id, location = ?found.path(), "resolved package");
                    return Ok(found);
                }
            }

            current = dir.parent();
        }

        Err(VmError::ModuleNotFound(id.to_string()))
    }

    /// Categorize a file by extension
    fn categorize_file(&self, path: &Path) -> ResolveResult {
        let path = path.to_path_buf();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => ResolveResult::Json(path),
            Some("node") => ResolveResult::Native(path),
            _ => ResolveResult::File(path),
        }
    }
}

/// Split a package id into name and optional subpath
fn parse_package_specifier(id: &str) -> (&str, Option<&str>) {
    if let Some(scoped) = id.strip_prefix('@') {
        // @scope/name or @scope/name/subpath
        if let Some(slash_pos) = scoped.find('/') {
            let after_scope = &id[slash_pos + 2..];
            if let Some(subpath_pos) = after_scope.find('/') {
                let name_end = slash_pos + 2 + subpath_pos;
                return (&id[..name_end], Some(&id[name_end + 1..]));
            }
        }
        (id, None)
    } else if let Some(slash_pos) = id.find('/') {
        (&id[..slash_pos], Some(&id[slash_pos + 1..]))
    } else {
        (id, None)
    }
}

/// package.json fields used for resolution
#[derive(Debug, Deserialize)]
struct PackageJson {
    main: Option<String>,
}
