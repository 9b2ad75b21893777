// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Context-scoped runner

use super::linker::Linker;
use super::record::{ModuleRecord, Referrer};
use crate::context::ExecutionContext;
use crate::error::{Result, VmError};
use std::path::Path;

/// Options for [`Linker::run`]
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Context to reuse; a fresh one is created when `None`
    pub context: Option<ExecutionContext>,
}

impl RunOptions {
    /// Run inside an existing context
    pub fn in_context(context: ExecutionContext) -> Self {
        Self {
            context: Some(context),
        }
    }
}

impl Linker {
    /// Build, link and evaluate the source module at `entry`.
    ///
    /// The returned record is `evaluated` and exposes the context the graph
    /// ran in. On failure, effects already committed to the context stay.
    pub async fn run(&self, entry: impl AsRef<Path>, options: RunOptions) -> Result<ModuleRecord> {
        let entry = entry.as_ref();
        if !entry.is_absolute() {
            return Err(VmError::InvalidEntryLocation(entry.to_path_buf()));
        }

        let context = options
            .context
            .unwrap_or_else(|| self.engine().create_context());

        tracing::debug!(entry = %entry.display(), context = %context.id(), "run");

        let entry_id = entry.display().to_string();
        let root = Referrer::new(entry_id.clone(), context);
        let record = self.build_source(&entry_id, &root).await?;

        self.link_module(&record).await?;
        self.evaluate(&record).await?;

        Ok(record)
    }
}
