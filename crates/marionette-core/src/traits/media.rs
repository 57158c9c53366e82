// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Media byte resolution.

use std::path::Path;

use async_trait::async_trait;

use crate::error::MarionetteError;

/// Bytes plus the content type reported by their origin, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMedia {
    pub data: Vec<u8>,
    pub content_type: Option<String>,
}

/// Resolves media bytes from a public URL or from local disk.
///
/// Both strategies feed the same upload-and-assign routine; failures are
/// reported as [`MarionetteError::Upload`].
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch_url(&self, url: &str) -> Result<FetchedMedia, MarionetteError>;

    async fn read_path(&self, path: &Path) -> Result<FetchedMedia, MarionetteError>;
}
