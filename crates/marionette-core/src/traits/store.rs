// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence and repository traits.

use async_trait::async_trait;

use crate::error::MarionetteError;
use crate::traits::adapter::PluginAdapter;
use crate::types::RemoteUserRecord;

/// Adapter for storage and persistence backends.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), MarionetteError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), MarionetteError>;
}

/// Cache of third-party user profiles keyed by encoded user id.
#[async_trait]
pub trait RemoteUserStore: Send + Sync {
    /// Returns the cached record, if one was written.
    async fn get(&self, encoded_id: &str) -> Result<Option<RemoteUserRecord>, MarionetteError>;

    /// Stores a record on first contact. An existing record is kept as is.
    async fn put(&self, encoded_id: &str, record: &RemoteUserRecord)
    -> Result<(), MarionetteError>;
}

/// Mapping between home room ids and third-party room ids.
///
/// Implementations only need to be safe for concurrent use; the bridge
/// serializes find-or-create per key itself.
#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// Records that `home_room_id` bridges `third_party_room_id`.
    async fn insert(&self, home_room_id: &str, third_party_room_id: &str);

    /// Looks up the third-party room bridged by a home room.
    async fn third_party_room(&self, home_room_id: &str) -> Option<String>;

    /// Looks up the home room bridging a third-party room.
    async fn home_room(&self, third_party_room_id: &str) -> Option<String>;

    /// Forgets a home room, e.g. after its alias was repaired.
    async fn remove(&self, home_room_id: &str);
}
