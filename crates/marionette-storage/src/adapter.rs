// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the remote user store.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use marionette_config::model::StorageConfig;
use marionette_core::types::RemoteUserRecord;
use marionette_core::{
    AdapterType, HealthStatus, MarionetteError, PluginAdapter, RemoteUserStore, StorageAdapter,
};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed remote user store.
///
/// The database is opened lazily by [`StorageAdapter::initialize`]; every
/// other call fails until then.
pub struct SqliteUserStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteUserStore {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, MarionetteError> {
        self.db.get().ok_or_else(|| MarionetteError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteUserStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, MarionetteError> {
        self.db()?
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MarionetteError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteUserStore {
    async fn initialize(&self) -> Result<(), MarionetteError> {
        let db = Database::open(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| MarionetteError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), MarionetteError> {
        self.db()?.checkpoint().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl RemoteUserStore for SqliteUserStore {
    async fn get(&self, encoded_id: &str) -> Result<Option<RemoteUserRecord>, MarionetteError> {
        queries::remote_users::get_remote_user(self.db()?, encoded_id).await
    }

    async fn put(
        &self,
        encoded_id: &str,
        record: &RemoteUserRecord,
    ) -> Result<(), MarionetteError> {
        let inserted =
            queries::remote_users::insert_remote_user(self.db()?, encoded_id, record).await?;
        if inserted {
            debug!(id = encoded_id, "cached remote user");
        }
        Ok(())
    }
}
