// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory room record repository.
//!
//! Records are not persisted. After a restart they are rebuilt lazily:
//! inbound traffic re-resolves aliases and outbound traffic reverse-resolves
//! room aliases, both of which insert here.

use async_trait::async_trait;
use dashmap::DashMap;
use marionette_core::RoomRepository;

/// Bidirectional home room id ↔ third-party room id map.
#[derive(Default)]
pub struct MemoryRoomRepository {
    by_home: DashMap<String, String>,
    by_third_party: DashMap<String, String>,
}

impl MemoryRoomRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_home.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_home.is_empty()
    }
}

#[async_trait]
impl RoomRepository for MemoryRoomRepository {
    async fn insert(&self, home_room_id: &str, third_party_room_id: &str) {
        if let Some(old) = self
            .by_third_party
            .insert(third_party_room_id.to_string(), home_room_id.to_string())
            && old != home_room_id
        {
            self.by_home.remove(&old);
        }
        self.by_home
            .insert(home_room_id.to_string(), third_party_room_id.to_string());
    }

    async fn third_party_room(&self, home_room_id: &str) -> Option<String> {
        self.by_home.get(home_room_id).map(|v| v.value().clone())
    }

    async fn home_room(&self, third_party_room_id: &str) -> Option<String> {
        self.by_third_party
            .get(third_party_room_id)
            .map(|v| v.value().clone())
    }

    async fn remove(&self, home_room_id: &str) {
        if let Some((_, third_party)) = self.by_home.remove(home_room_id) {
            self.by_third_party
                .remove_if(&third_party, |_, home| home == home_room_id);
        }
    }
}
