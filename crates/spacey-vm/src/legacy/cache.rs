// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Per-loader cache of legacy modules

use crate::value::Value;
use dashmap::DashMap;
use std::path::{Path, PathBuf};

/// Cached legacy module entry
#[derive(Debug, Clone)]
pub struct CachedModule {
    /// The module's exports
    pub exports: Value,
    /// Absolute location of the module
    pub filename: PathBuf,
    /// Whether the module body has finished running
    pub loaded: bool,
    /// Modules this one required, in first-require order
    pub children: Vec<PathBuf>,
    /// Module that first required this one
    pub parent: Option<PathBuf>,
}

impl CachedModule {
    /// An entry whose body has not run yet
    pub fn loading(filename: PathBuf, parent: Option<PathBuf>, exports: Value) -> Self {
        Self {
            exports,
            filename,
            loaded: false,
            children: Vec::new(),
            parent,
        }
    }
}

/// Thread-safe cache keyed by absolute location
pub struct ModuleCache {
    cache: DashMap<PathBuf, CachedModule>,
}

impl ModuleCache {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
        }
    }

    /// Get a cached module by location
    pub fn get(&self, path: &Path) -> Option<CachedModule> {
        self.cache.get(path).map(|entry| entry.clone())
    }

    /// Exports of a cached module
    pub fn exports(&self, path: &Path) -> Option<Value> {
        self.cache.get(path).map(|entry| entry.exports.clone())
    }

    /// Check if a module is cached
    pub fn has(&self, path: &Path) -> bool {
        self.cache.contains_key(path)
    }

    /// Add a module to the cache
    pub fn set(&self, path: PathBuf, module: CachedModule) {
        self.cache.insert(path, module);
    }

    /// Remove a module from the cache. Its children stay cached.
    pub fn delete(&self, path: &Path) -> Option<CachedModule> {
        self.cache.remove(path).map(|(_, v)| v)
    }

    /// Record that `parent` required `child`
    pub fn add_child(&self, parent: &Path, child: &Path) {
        if let Some(mut entry) = self.cache.get_mut(parent) {
            if !entry.children.iter().any(|c| c == child) {
                entry.children.push(child.to_path_buf());
            }
        }
    }

    /// Store final exports and mark the module loaded
    pub fn finish(&self, path: &Path, exports: Value) {
        if let Some(mut entry) = self.cache.get_mut(path) {
            entry.exports = exports;
            entry.loaded = true;
        }
    }

    /// Clear the entire cache
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Get all cached module locations
    pub fn keys(&self) -> Vec<PathBuf> {
        self.cache.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Get the number of cached modules
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl Default for ModuleCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ModuleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleCache").field("len", &self.len()).finish()
    }
}
