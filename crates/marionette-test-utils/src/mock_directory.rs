// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock room/identity directory.
//!
//! `MockDirectory` keeps an in-memory alias table and captures every call
//! for assertions. Rooms can be marked unjoinable to exercise alias repair.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use marionette_core::events::RoomMessageContent;
use marionette_core::types::{Actor, AdapterType, HealthStatus, RoomCreation};
use marionette_core::{HomeDirectory, MarionetteError, PluginAdapter};

use crate::{BOT_USER_ID, SERVER_NAME};

/// One captured upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub actor: Actor,
    pub data: Vec<u8>,
    pub content_type: String,
    pub filename: Option<String>,
}

/// One captured message send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub actor: Actor,
    pub room_id: String,
    pub content: RoomMessageContent,
}

#[derive(Default)]
struct DirectoryState {
    aliases: HashMap<String, String>,
    created: Vec<(String, RoomCreation)>,
    deleted_aliases: Vec<String>,
    joins: Vec<(Actor, String)>,
    leaves: Vec<(Actor, String)>,
    power_levels: Vec<(String, String, i64)>,
    registered: Vec<String>,
    display_names: HashMap<String, String>,
    display_name_calls: usize,
    avatars: HashMap<String, String>,
    room_avatars: HashMap<String, String>,
    uploads: Vec<Upload>,
    sent: Vec<SentMessage>,
    unjoinable: HashSet<String>,
    fail_power_levels: bool,
    fail_uploads: bool,
    next_id: u64,
}

/// An in-memory [`HomeDirectory`].
pub struct MockDirectory {
    bot_user_id: String,
    server_name: String,
    state: Mutex<DirectoryState>,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self {
            bot_user_id: BOT_USER_ID.to_string(),
            server_name: SERVER_NAME.to_string(),
            state: Mutex::new(DirectoryState::default()),
        }
    }

    /// Points `alias` at `room_id`, as if created by an earlier run.
    pub async fn add_alias(&self, alias: &str, room_id: &str) {
        self.state
            .lock()
            .await
            .aliases
            .insert(alias.to_string(), room_id.to_string());
    }

    /// Makes joins to `room_id` fail with "no usable servers".
    pub async fn make_unjoinable(&self, room_id: &str) {
        self.state.lock().await.unjoinable.insert(room_id.to_string());
    }

    pub async fn fail_power_levels(&self) {
        self.state.lock().await.fail_power_levels = true;
    }

    pub async fn fail_uploads(&self) {
        self.state.lock().await.fail_uploads = true;
    }

    /// Pre-sets a user's avatar.
    pub async fn set_existing_avatar(&self, user_id: &str, content_uri: &str) {
        self.state
            .lock()
            .await
            .avatars
            .insert(user_id.to_string(), content_uri.to_string());
    }

    pub async fn created_rooms(&self) -> Vec<(String, RoomCreation)> {
        self.state.lock().await.created.clone()
    }

    pub async fn deleted_aliases(&self) -> Vec<String> {
        self.state.lock().await.deleted_aliases.clone()
    }

    pub async fn joins(&self) -> Vec<(Actor, String)> {
        self.state.lock().await.joins.clone()
    }

    pub async fn leaves(&self) -> Vec<(Actor, String)> {
        self.state.lock().await.leaves.clone()
    }

    pub async fn power_levels(&self) -> Vec<(String, String, i64)> {
        self.state.lock().await.power_levels.clone()
    }

    pub async fn registered(&self) -> Vec<String> {
        self.state.lock().await.registered.clone()
    }

    pub async fn display_name(&self, user_id: &str) -> Option<String> {
        self.state.lock().await.display_names.get(user_id).cloned()
    }

    pub async fn display_name_calls(&self) -> usize {
        self.state.lock().await.display_name_calls
    }

    pub async fn avatar(&self, user_id: &str) -> Option<String> {
        self.state.lock().await.avatars.get(user_id).cloned()
    }

    pub async fn room_avatar(&self, room_id: &str) -> Option<String> {
        self.state.lock().await.room_avatars.get(room_id).cloned()
    }

    pub async fn uploads(&self) -> Vec<Upload> {
        self.state.lock().await.uploads.clone()
    }

    pub async fn sent_messages(&self) -> Vec<SentMessage> {
        self.state.lock().await.sent.clone()
    }

    fn unjoinable(room_id: &str) -> MarionetteError {
        MarionetteError::UnjoinableRoom {
            room_id: room_id.to_string(),
            message: "no usable servers".to_string(),
        }
    }
}

impl Default for MockDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockDirectory {
    fn name(&self) -> &str {
        "mock-directory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Directory
    }

    async fn health_check(&self) -> Result<HealthStatus, MarionetteError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MarionetteError> {
        Ok(())
    }
}

#[async_trait]
impl HomeDirectory for MockDirectory {
    fn bot_user_id(&self) -> &str {
        &self.bot_user_id
    }

    fn server_name(&self) -> &str {
        &self.server_name
    }

    async fn resolve_alias(&self, alias: &str) -> Result<Option<String>, MarionetteError> {
        Ok(self.state.lock().await.aliases.get(alias).cloned())
    }

    async fn delete_alias(&self, alias: &str) -> Result<(), MarionetteError> {
        let mut state = self.state.lock().await;
        if state.aliases.remove(alias).is_none() {
            return Err(MarionetteError::NotFound {
                what: alias.to_string(),
            });
        }
        state.deleted_aliases.push(alias.to_string());
        Ok(())
    }

    async fn room_aliases(&self, room_id: &str) -> Result<Vec<String>, MarionetteError> {
        let state = self.state.lock().await;
        let mut aliases: Vec<String> = state
            .aliases
            .iter()
            .filter(|(_, id)| id.as_str() == room_id)
            .map(|(alias, _)| alias.clone())
            .collect();
        aliases.sort();
        Ok(aliases)
    }

    async fn create_room(&self, creation: &RoomCreation) -> Result<String, MarionetteError> {
        let mut state = self.state.lock().await;
        let alias = format!("#{}:{}", creation.alias_local_part, self.server_name);
        if state.aliases.contains_key(&alias) {
            return Err(MarionetteError::directory(format!(
                "M_ROOM_IN_USE: alias {alias} already exists"
            )));
        }
        state.next_id += 1;
        let room_id = format!("!room{}:{}", state.next_id, self.server_name);
        state.aliases.insert(alias, room_id.clone());
        state.created.push((room_id.clone(), creation.clone()));
        Ok(room_id)
    }

    async fn join_room(&self, actor: &Actor, room: &str) -> Result<String, MarionetteError> {
        let mut state = self.state.lock().await;
        let room_id = if room.starts_with('#') {
            state
                .aliases
                .get(room)
                .cloned()
                .ok_or_else(|| MarionetteError::NotFound {
                    what: room.to_string(),
                })?
        } else {
            room.to_string()
        };
        if state.unjoinable.contains(&room_id) {
            return Err(Self::unjoinable(&room_id));
        }
        state.joins.push((actor.clone(), room_id.clone()));
        Ok(room_id)
    }

    async fn leave_room(&self, actor: &Actor, room_id: &str) -> Result<(), MarionetteError> {
        self.state
            .lock()
            .await
            .leaves
            .push((actor.clone(), room_id.to_string()));
        Ok(())
    }

    async fn set_power_level(
        &self,
        room_id: &str,
        user_id: &str,
        level: i64,
    ) -> Result<(), MarionetteError> {
        let mut state = self.state.lock().await;
        if state.fail_power_levels {
            return Err(MarionetteError::directory("M_FORBIDDEN: not allowed"));
        }
        state
            .power_levels
            .push((room_id.to_string(), user_id.to_string(), level));
        Ok(())
    }

    async fn register_user(&self, user_id: &str) -> Result<(), MarionetteError> {
        self.state.lock().await.registered.push(user_id.to_string());
        Ok(())
    }

    async fn set_display_name(&self, user_id: &str, name: &str) -> Result<(), MarionetteError> {
        let mut state = self.state.lock().await;
        state.display_name_calls += 1;
        state
            .display_names
            .insert(user_id.to_string(), name.to_string());
        Ok(())
    }

    async fn avatar_url(&self, user_id: &str) -> Result<Option<String>, MarionetteError> {
        Ok(self.state.lock().await.avatars.get(user_id).cloned())
    }

    async fn set_avatar_url(
        &self,
        user_id: &str,
        content_uri: &str,
    ) -> Result<(), MarionetteError> {
        self.state
            .lock()
            .await
            .avatars
            .insert(user_id.to_string(), content_uri.to_string());
        Ok(())
    }

    async fn set_room_avatar(
        &self,
        room_id: &str,
        content_uri: &str,
    ) -> Result<(), MarionetteError> {
        self.state
            .lock()
            .await
            .room_avatars
            .insert(room_id.to_string(), content_uri.to_string());
        Ok(())
    }

    async fn upload(
        &self,
        actor: &Actor,
        data: Vec<u8>,
        content_type: &str,
        filename: Option<&str>,
    ) -> Result<String, MarionetteError> {
        let mut state = self.state.lock().await;
        if state.fail_uploads {
            return Err(MarionetteError::upload("M_TOO_LARGE: upload rejected"));
        }
        state.uploads.push(Upload {
            actor: actor.clone(),
            data,
            content_type: content_type.to_string(),
            filename: filename.map(str::to_string),
        });
        Ok(format!("mxc://{}/media{}", self.server_name, state.uploads.len()))
    }

    async fn send_message(
        &self,
        actor: &Actor,
        room_id: &str,
        content: &RoomMessageContent,
    ) -> Result<String, MarionetteError> {
        let mut state = self.state.lock().await;
        state.sent.push(SentMessage {
            actor: actor.clone(),
            room_id: room_id.to_string(),
            content: content.clone(),
        });
        Ok(format!("$dir{}", state.sent.len()))
    }

    fn download_url(&self, content_uri: &str) -> Option<String> {
        let rest = content_uri.strip_prefix("mxc://")?;
        Some(format!(
            "https://{}/_matrix/media/v3/download/{rest}",
            self.server_name
        ))
    }
}
