// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Specifier resolution

use crate::builtins::BuiltinRegistry;
use crate::error::{Result, VmError};
use crate::legacy::LegacyLoader;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Result of resolving a specifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Built-in capability, kept exactly as written
    Builtin(String),
    /// Absolute file path
    File(PathBuf),
    /// Entry file of a third-party package
    Package {
        /// Bare specifier that was resolved
        specifier: String,
        /// Absolute entry path
        path: PathBuf,
    },
}

impl Location {
    /// Absolute path, if this is not a built-in
    pub fn path(&self) -> Option<&Path> {
        match self {
            Location::Builtin(_) => None,
            Location::File(path) | Location::Package { path, .. } => Some(path),
        }
    }

    /// Check if this is a built-in capability
    pub fn is_builtin(&self) -> bool {
        matches!(self, Location::Builtin(_))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Builtin(name) => write!(f, "{}", name),
            Location::File(path) | Location::Package { path, .. } => write!(f, "{}", path.display()),
        }
    }
}

/// Check for `.`, `..`, `./x` and `../x` (plus `\` separators on Windows)
pub fn is_relative_path(specifier: &str) -> bool {
    let bytes = specifier.as_bytes();
    let is_sep = |b: u8| b == b'/' || (cfg!(windows) && b == b'\\');

    match bytes {
        [b'.'] => true,
        [b'.', next, ..] if is_sep(*next) => true,
        [b'.', b'.'] => true,
        [b'.', b'.', next, ..] => is_sep(*next),
        _ => false,
    }
}

/// Lexically normalize a path: drop `.` and fold `..` into its parent
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match result.components().next_back() {
                Some(Component::Normal(_)) => {
                    result.pop();
                }
                // `..` at the root stays at the root
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => result.push(".."),
            },
            other => result.push(other.as_os_str()),
        }
    }
    result
}

/// Maps a specifier plus the identity of its referencing module to a location.
///
/// Pure path math apart from the package lookup, which is delegated to the
/// legacy loader's package resolution.
pub struct SpecifierResolver<'a> {
    builtins: &'a BuiltinRegistry,
    packages: &'a dyn LegacyLoader,
}

impl<'a> SpecifierResolver<'a> {
    /// Create a resolver over a capability table and a package resolver
    pub fn new(builtins: &'a BuiltinRegistry, packages: &'a dyn LegacyLoader) -> Self {
        Self { builtins, packages }
    }

    /// Resolve `specifier` as written inside the module identified by `referrer`
    pub fn resolve(&self, specifier: &str, referrer: &str) -> Result<Location> {
        if self.builtins.is_builtin(specifier) {
            return Ok(Location::Builtin(specifier.to_string()));
        }

        let referrer = Path::new(referrer);
        if !referrer.is_absolute() {
            return Err(VmError::InvalidReferencingIdentity(
                referrer.display().to_string(),
            ));
        }

        let target = Path::new(specifier);
        let location = if target.is_absolute() {
            Location::File(normalize_path(target))
        } else if is_relative_path(specifier) {
            let base = referrer.parent().unwrap_or(referrer);
            Location::File(normalize_path(&base.join(target)))
        } else {
            let path = self.packages.resolve_package(specifier, referrer)?;
            Location::Package {
                specifier: specifier.to_string(),
                path,
            }
        };

        tracing::trace!(specifier, referrer = %referrer.display(), %location, "resolved specifier");
        Ok(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_relative_path() {
        assert!(is_relative_path("."));
        assert!(is_relative_path(".."));
        assert!(is_relative_path("./a.mjs"));
        assert!(is_relative_path("../a.mjs"));
        assert!(!is_relative_path(".a"));
        assert!(!is_relative_path("..a"));
        assert!(!is_relative_path("a/b"));
        assert!(!is_relative_path("/a"));
        assert!(!is_relative_path(""));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("/a/b/../c/./d.mjs")), PathBuf::from("/a/c/d.mjs"));
        assert_eq!(normalize_path(Path::new("/a/..")), PathBuf::from("/"));
    }

    #[test]
    fn test_normalize_path_clamps_at_root() {
        assert_eq!(normalize_path(Path::new("/a/../../x.mjs")), PathBuf::from("/x.mjs"));
        assert_eq!(normalize_path(Path::new("/../../x.mjs")), PathBuf::from("/x.mjs"));
        assert_eq!(normalize_path(Path::new("../../x.mjs")), PathBuf::from("../../x.mjs"));
    }

    #[test]
    fn test_location_display() {
        assert_eq!(Location::Builtin("node:fs".into()).to_string(), "node:fs");
        let file = Location::File(PathBuf::from("/a/b.mjs"));
        assert_eq!(file.to_string(), "/a/b.mjs");
        assert_eq!(file.path(), Some(Path::new("/a/b.mjs")));
        assert!(!file.is_builtin());
    }
}
