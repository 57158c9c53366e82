// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for relay scenario testing.
//!
//! `TestHarness` assembles a [`Bridge`] over mock collaborators. The remote
//! user cache is in memory by default or, with
//! [`TestHarnessBuilder::with_sqlite_store`], a temp SQLite database.

use std::sync::Arc;

use marionette_bridge::{Bridge, BridgeDeps, BridgeSettings, MemoryRoomRepository};
use marionette_config::model::StorageConfig;
use marionette_core::events::{HomeEvent, RoomMessageContent, RoomMessageEvent};
use marionette_core::{IdentityPair, MarionetteError, RemoteUserStore, StorageAdapter};
use marionette_storage::SqliteUserStore;

use crate::mock_adapter::MockAdapter;
use crate::mock_directory::MockDirectory;
use crate::mock_fetcher::MockFetcher;
use crate::mock_session::MockSession;
use crate::mock_store::MemoryUserStore;
use crate::PUPPET_USER_ID;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    identity: (String, String),
    dedup_tag: Option<String>,
    settings: BridgeSettings,
    adapter: Option<MockAdapter>,
    sqlite: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            identity: ("alice".to_string(), "mocknet".to_string()),
            dedup_tag: None,
            settings: BridgeSettings::default(),
            adapter: None,
            sqlite: false,
        }
    }

    pub fn with_identity(mut self, id: &str, network: &str) -> Self {
        self.identity = (id.to_string(), network.to_string());
        self
    }

    pub fn with_dedup_tag(mut self, tag: &str) -> Self {
        self.dedup_tag = Some(tag.to_string());
        self
    }

    pub fn with_settings(mut self, settings: BridgeSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Use a preconfigured adapter instead of a default [`MockAdapter`].
    pub fn with_adapter(mut self, adapter: MockAdapter) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Back the remote user cache with SQLite in a temp directory.
    pub fn with_sqlite_store(mut self) -> Self {
        self.sqlite = true;
        self
    }

    pub async fn build(self) -> Result<TestHarness, MarionetteError> {
        let identity = IdentityPair::new(self.identity.0, self.identity.1)?
            .with_dedup(self.dedup_tag, None);

        let directory = Arc::new(MockDirectory::new());
        let session = Arc::new(MockSession::new());
        let adapter = Arc::new(self.adapter.unwrap_or_default());
        let fetcher = Arc::new(MockFetcher::new());
        let repository = Arc::new(MemoryRoomRepository::new());

        let mut temp_dir = None;
        let users: Arc<dyn RemoteUserStore> = if self.sqlite {
            let dir = tempfile::TempDir::new()
                .map_err(|e| MarionetteError::Storage { source: e.into() })?;
            let store = SqliteUserStore::new(StorageConfig {
                database_path: dir.path().join("test.db").to_string_lossy().into_owned(),
                wal_mode: true,
            });
            store.initialize().await?;
            temp_dir = Some(dir);
            Arc::new(store)
        } else {
            Arc::new(MemoryUserStore::new())
        };

        let bridge = Bridge::new(BridgeDeps {
            identity,
            directory: directory.clone(),
            session: session.clone(),
            adapter: adapter.clone(),
            users,
            repository: repository.clone(),
            fetcher: fetcher.clone(),
            settings: self.settings,
        })?;

        Ok(TestHarness {
            bridge: Arc::new(bridge),
            directory,
            session,
            adapter,
            fetcher,
            repository,
            _temp_dir: temp_dir,
        })
    }
}

/// A bridge wired to mocks, with handles to every mock for assertions.
pub struct TestHarness {
    pub bridge: Arc<Bridge>,
    pub directory: Arc<MockDirectory>,
    pub session: Arc<MockSession>,
    pub adapter: Arc<MockAdapter>,
    pub fetcher: Arc<MockFetcher>,
    pub repository: Arc<MemoryRoomRepository>,
    _temp_dir: Option<tempfile::TempDir>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Build a harness with all defaults.
    pub async fn new() -> Result<Self, MarionetteError> {
        Self::builder().build().await
    }

    /// Delivers a message typed by the puppet in `room_id`.
    pub async fn puppet_says(&self, event_id: &str, room_id: &str, content: RoomMessageContent) {
        self.bridge
            .handle_home_event(HomeEvent::RoomMessage(self.puppet_event(
                event_id, room_id, content,
            )))
            .await;
    }

    pub fn puppet_event(
        &self,
        event_id: &str,
        room_id: &str,
        content: RoomMessageContent,
    ) -> RoomMessageEvent {
        MockSession::message_event(event_id, room_id, PUPPET_USER_ID, content)
    }

    /// Full alias the bridge derives for a third-party room.
    pub fn alias_for(&self, third_party_room_id: &str) -> String {
        self.bridge.rooms().codec().room_alias(third_party_room_id)
    }

    /// Full ghost user id the bridge derives for a third-party user.
    pub fn ghost_for(&self, third_party_user_id: &str) -> String {
        self.bridge.rooms().codec().ghost_user_id(third_party_user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn harness_builds_with_defaults() {
        let harness = TestHarness::new().await.unwrap();
        assert_eq!(harness.bridge.puppet().user_id(), PUPPET_USER_ID);
        assert_eq!(
            harness.alias_for("room1"),
            "#mocknet_puppet_alice_726f6f6d31:example.org"
        );
    }

    #[tokio::test]
    async fn harness_builds_with_sqlite() {
        let harness = TestHarness::builder()
            .with_sqlite_store()
            .build()
            .await
            .unwrap();
        assert!(harness._temp_dir.is_some());
    }
}
