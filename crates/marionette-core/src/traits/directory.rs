// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Room and identity directory operations performed by the bot and ghosts.

use async_trait::async_trait;

use crate::error::MarionetteError;
use crate::events::RoomMessageContent;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Actor, RoomCreation};

/// Room/identity directory of the homeserver.
///
/// Rejections are typed: a missing alias or profile is
/// [`MarionetteError::NotFound`], a room that can no longer be joined is
/// [`MarionetteError::UnjoinableRoom`], and everything else is
/// [`MarionetteError::Directory`].
#[async_trait]
pub trait HomeDirectory: PluginAdapter {
    /// Full user id of the bridge bot.
    fn bot_user_id(&self) -> &str;

    /// Server name used to qualify aliases and user ids.
    fn server_name(&self) -> &str;

    /// Resolves a room alias to a room id; `Ok(None)` when the alias is unknown.
    async fn resolve_alias(&self, alias: &str) -> Result<Option<String>, MarionetteError>;

    /// Removes an alias from the directory.
    async fn delete_alias(&self, alias: &str) -> Result<(), MarionetteError>;

    /// Lists the aliases currently pointing at a room.
    async fn room_aliases(&self, room_id: &str) -> Result<Vec<String>, MarionetteError>;

    /// Creates a room as the bot and returns its id.
    async fn create_room(&self, creation: &RoomCreation) -> Result<String, MarionetteError>;

    /// Joins `actor` to a room (by id or alias), returning the room id.
    async fn join_room(&self, actor: &Actor, room: &str) -> Result<String, MarionetteError>;

    /// Makes `actor` leave a room.
    async fn leave_room(&self, actor: &Actor, room_id: &str) -> Result<(), MarionetteError>;

    /// Sets `user_id`'s power level in a room, acting as the bot.
    async fn set_power_level(
        &self,
        room_id: &str,
        user_id: &str,
        level: i64,
    ) -> Result<(), MarionetteError>;

    /// Registers a ghost account; an already registered user is not an error.
    async fn register_user(&self, user_id: &str) -> Result<(), MarionetteError>;

    /// Sets a user's display name.
    async fn set_display_name(&self, user_id: &str, name: &str) -> Result<(), MarionetteError>;

    /// Reads a user's avatar content URI, if any.
    async fn avatar_url(&self, user_id: &str) -> Result<Option<String>, MarionetteError>;

    /// Sets a user's avatar content URI.
    async fn set_avatar_url(&self, user_id: &str, content_uri: &str)
    -> Result<(), MarionetteError>;

    /// Sets a room's avatar, acting as the bot.
    async fn set_room_avatar(&self, room_id: &str, content_uri: &str)
    -> Result<(), MarionetteError>;

    /// Uploads bytes to the content store and returns the content URI.
    async fn upload(
        &self,
        actor: &Actor,
        data: Vec<u8>,
        content_type: &str,
        filename: Option<&str>,
    ) -> Result<String, MarionetteError>;

    /// Sends a message as `actor`, returning the event id.
    async fn send_message(
        &self,
        actor: &Actor,
        room_id: &str,
        content: &RoomMessageContent,
    ) -> Result<String, MarionetteError>;

    /// Turns a content URI into a URL fetchable over plain HTTP(S).
    fn download_url(&self, content_uri: &str) -> Option<String>;
}
