// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Source module builder

use super::linker::Linker;
use super::record::{ModuleKind, ModuleRecord, Referrer, SourceModule};
use crate::engine::{file_url, CompileOptions};
use crate::error::{Result, VmError};

impl Linker {
    /// Read and compile the module `specifier` names into an unlinked source
    /// record bound to the referrer's context.
    ///
    /// Every call builds a new, independent record.
    pub async fn build_source(&self, specifier: &str, referrer: &Referrer) -> Result<ModuleRecord> {
        let location = self.resolve_specifier(specifier, referrer)?;
        let path = location
            .path()
            .ok_or_else(|| VmError::UnsupportedModuleFormat(specifier.to_string()))?
            .to_path_buf();

        let text = self
            .reader()
            .read_to_string(&path)
            .await
            .map_err(|e| VmError::source_read(&path, e))?;

        let identifier = path.display().to_string();
        let options = CompileOptions {
            identifier: identifier.clone(),
            context: referrer.context().clone(),
            url: file_url(&path)?,
        };
        let compiled = self.engine().compile_module(&text, &options)?;
        let source = SourceModule::new(path, options.url, compiled);

        tracing::debug!(
            module = %identifier,
            requests = ?source.requests(),
            context = %referrer.context().id(),
            "built source module"
        );

        Ok(ModuleRecord::new(
            identifier,
            options.context,
            referrer.lineage().to_vec(),
            ModuleKind::Source(source),
        ))
    }
}
