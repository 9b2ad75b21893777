// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module format detection

use crate::config::LoaderConfig;
use crate::error::Result;
use crate::fs::SourceReader;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Format declared for a file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleFormat {
    /// Declarative module source (import/export)
    Source,
    /// CommonJS or JSON, loaded through the legacy loader
    Legacy,
    /// Decided by the nearest package.json "type" field
    PackageScoped,
}

impl ModuleFormat {
    /// Format from a package.json "type" field
    pub fn from_package_type(type_field: Option<&str>) -> Self {
        match type_field {
            Some("module") => ModuleFormat::Source,
            _ => ModuleFormat::Legacy,
        }
    }
}

/// Which builder the linker hands a location to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Build a source record
    Source,
    /// Build a synthetic record
    Synthetic,
}

/// Minimal package.json structure for type detection
#[derive(Debug, Deserialize)]
struct PackageJson {
    #[serde(rename = "type")]
    type_field: Option<String>,
}

/// Decide how a resolved file is loaded. `None` means the format is not
/// recognized.
pub async fn detect(
    path: &Path,
    config: &LoaderConfig,
    reader: &dyn SourceReader,
) -> Result<Option<Dispatch>> {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return Ok(None);
    };

    let format = match config.format_for_extension(ext) {
        Some(ModuleFormat::PackageScoped) if config.package_type_lookup => {
            find_package_type(path, reader).await?.unwrap_or(ModuleFormat::Legacy)
        }
        Some(ModuleFormat::PackageScoped) => ModuleFormat::Legacy,
        Some(format) => format,
        None => return Ok(None),
    };

    Ok(Some(match format {
        ModuleFormat::Source => Dispatch::Source,
        _ => Dispatch::Synthetic,
    }))
}

/// Format declared by the nearest package.json above `path`
async fn find_package_type(path: &Path, reader: &dyn SourceReader) -> Result<Option<ModuleFormat>> {
    let mut current = path.parent();

    while let Some(dir) = current {
        let pkg_path = dir.join("package.json");
        match reader.read_to_string(&pkg_path).await {
            Ok(content) => {
                let pkg: PackageJson = serde_json::from_str(&content)?;
                tracing::trace!(package = %pkg_path.display(), type_field = ?pkg.type_field, "package scope");
                return Ok(Some(ModuleFormat::from_package_type(pkg.type_field.as_deref())));
            }
            Err(_) => current = dir.parent(),
        }
    }

    Ok(None)
}
