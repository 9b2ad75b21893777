// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Loader configuration.

use crate::error::{Result, VmError};
use crate::module_system::ModuleFormat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// How a synthetic module enumerates its exports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportMode {
    /// Every own top-level key of the obtained namespace
    #[default]
    OwnKeys,
    /// A single `default` export holding the whole namespace
    DefaultOnly,
}

impl std::str::FromStr for ExportMode {
    type Err = VmError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "own-keys" => Ok(ExportMode::OwnKeys),
            "default-only" => Ok(ExportMode::DefaultOnly),
            other => Err(VmError::Config(format!("unknown export mode '{}'", other))),
        }
    }
}

/// Configuration for the linker and its builders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoaderConfig {
    /// Prefix accepted in front of built-in capability names
    pub builtin_scheme: String,

    /// Export enumeration strategy for synthetic modules
    pub export_mode: ExportMode,

    /// Module format per file extension (without the leading dot)
    pub extensions: BTreeMap<String, ModuleFormat>,

    /// Whether package-scoped extensions consult the nearest package.json
    pub package_type_lookup: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        let mut extensions = BTreeMap::new();
        extensions.insert("mjs".to_string(), ModuleFormat::Source);
        extensions.insert("cjs".to_string(), ModuleFormat::Legacy);
        extensions.insert("js".to_string(), ModuleFormat::PackageScoped);
        extensions.insert("json".to_string(), ModuleFormat::Legacy);

        Self {
            builtin_scheme: "node:".to_string(),
            export_mode: ExportMode::OwnKeys,
            extensions,
            package_type_lookup: true,
        }
    }
}

impl LoaderConfig {
    /// Parse a JSON configuration document; missing keys keep their defaults.
    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load configuration from a JSON file, then apply environment overrides.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_json_str(&content)?;
        config.load_from_env()?;
        Ok(config)
    }

    /// Apply `SPACEY_VM_*` environment overrides.
    pub fn load_from_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(mode) = var("SPACEY_VM_EXPORT_MODE") {
            self.export_mode = mode.parse()?;
        }

        if let Some(scheme) = var("SPACEY_VM_BUILTIN_SCHEME") {
            self.builtin_scheme = scheme;
        }

        if let Some(lookup) = var("SPACEY_VM_PACKAGE_TYPE_LOOKUP") {
            self.package_type_lookup = match lookup.as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                other => {
                    return Err(VmError::Config(format!(
                        "SPACEY_VM_PACKAGE_TYPE_LOOKUP must be a boolean, got '{}'",
                        other
                    )));
                }
            };
        }

        Ok(())
    }

    /// Configured format for an extension
    pub fn format_for_extension(&self, ext: &str) -> Option<ModuleFormat> {
        self.extensions.get(ext).copied()
    }
}
