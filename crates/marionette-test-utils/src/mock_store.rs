// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory remote user store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use marionette_core::types::RemoteUserRecord;
use marionette_core::{MarionetteError, RemoteUserStore};

/// A [`RemoteUserStore`] with the same keep-first semantics as the SQLite store.
#[derive(Default)]
pub struct MemoryUserStore {
    records: Mutex<HashMap<String, RemoteUserRecord>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl RemoteUserStore for MemoryUserStore {
    async fn get(&self, encoded_id: &str) -> Result<Option<RemoteUserRecord>, MarionetteError> {
        Ok(self.records.lock().await.get(encoded_id).cloned())
    }

    async fn put(
        &self,
        encoded_id: &str,
        record: &RemoteUserRecord,
    ) -> Result<(), MarionetteError> {
        self.records
            .lock()
            .await
            .entry(encoded_id.to_string())
            .or_insert_with(|| record.clone());
        Ok(())
    }
}
