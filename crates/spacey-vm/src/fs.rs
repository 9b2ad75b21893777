// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! File system access used while building the module graph

use async_trait::async_trait;
use std::path::Path;

/// Asynchronous whole-file text reads by absolute location
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// Read the full UTF-8 text at `path`
    async fn read_to_string(&self, path: &Path) -> std::io::Result<String>;
}

/// [`SourceReader`] backed by `tokio::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFs;

#[async_trait]
impl SourceReader for TokioFs {
    async fn read_to_string(&self, path: &Path) -> std::io::Result<String> {
        tokio::fs::read_to_string(path).await
    }
}
