// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock media fetcher serving canned bytes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use marionette_core::{FetchedMedia, MarionetteError, MediaFetcher};

#[derive(Default)]
struct FetcherState {
    urls: HashMap<String, FetchedMedia>,
    paths: HashMap<PathBuf, FetchedMedia>,
    fetches: Vec<String>,
}

/// A [`MediaFetcher`] backed by maps; unknown sources fail with `Upload`.
#[derive(Default)]
pub struct MockFetcher {
    state: Mutex<FetcherState>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_url(&self, url: &str, data: &[u8], content_type: Option<&str>) {
        self.state.lock().await.urls.insert(
            url.to_string(),
            FetchedMedia {
                data: data.to_vec(),
                content_type: content_type.map(str::to_string),
            },
        );
    }

    pub async fn add_path(&self, path: impl Into<PathBuf>, data: &[u8]) {
        self.state.lock().await.paths.insert(
            path.into(),
            FetchedMedia {
                data: data.to_vec(),
                content_type: None,
            },
        );
    }

    /// Every URL or path requested, in order.
    pub async fn fetches(&self) -> Vec<String> {
        self.state.lock().await.fetches.clone()
    }
}

#[async_trait]
impl MediaFetcher for MockFetcher {
    async fn fetch_url(&self, url: &str) -> Result<FetchedMedia, MarionetteError> {
        let mut state = self.state.lock().await;
        state.fetches.push(url.to_string());
        state
            .urls
            .get(url)
            .cloned()
            .ok_or_else(|| MarionetteError::upload(format!("fetching {url} returned 404 Not Found")))
    }

    async fn read_path(&self, path: &Path) -> Result<FetchedMedia, MarionetteError> {
        let mut state = self.state.lock().await;
        state.fetches.push(path.display().to_string());
        state
            .paths
            .get(path)
            .cloned()
            .ok_or_else(|| MarionetteError::upload(format!("failed to read {}", path.display())))
    }
}
