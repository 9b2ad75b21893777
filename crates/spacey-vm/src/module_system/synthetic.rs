// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Synthetic module builder

use super::linker::Linker;
use super::record::{ModuleKind, ModuleRecord, Referrer, SyntheticModule};
use crate::config::ExportMode;
use crate::error::{Result, VmError};
use std::path::Path;

impl Linker {
    /// Wrap the namespace of a built-in capability, or of a module loaded by
    /// the legacy loader, into an unlinked synthetic record bound to the
    /// referrer's context.
    ///
    /// The export name set is taken from the namespace now; values are copied
    /// when the record is evaluated.
    pub async fn build_synthetic(&self, specifier: &str, referrer: &Referrer) -> Result<ModuleRecord> {
        let (identifier, namespace) = if self.builtins().is_builtin(specifier) {
            (specifier.to_string(), self.builtins().namespace(specifier)?)
        } else {
            let location = self.resolve_specifier(specifier, referrer)?;
            let path = location
                .path()
                .ok_or_else(|| VmError::UnsupportedModuleFormat(specifier.to_string()))?;
            let identifier = path.display().to_string();
            let exports = self
                .legacy()
                .require(&identifier, Path::new(referrer.identifier()))?;
            (identifier, exports)
        };

        let synthetic = match self.config().export_mode {
            ExportMode::OwnKeys => SyntheticModule::own_keys(namespace),
            ExportMode::DefaultOnly => SyntheticModule::default_only(namespace),
        };

        tracing::debug!(
            module = %identifier,
            exports = ?synthetic.export_names(),
            context = %referrer.context().id(),
            "built synthetic module"
        );

        Ok(ModuleRecord::new(
            identifier,
            referrer.context().clone(),
            referrer.lineage().to_vec(),
            ModuleKind::Synthetic(synthetic),
        ))
    }
}
