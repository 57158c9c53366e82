// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capability interface of the third-party network adapter.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::MarionetteError;
use crate::events::RoomMessageEvent;
use crate::traits::adapter::PluginAdapter;
use crate::types::{BangCommand, OutboundImage, RoomData, ThirdPartyEvent, UserData};

/// Adapter for one third-party messaging network.
///
/// The bridge never talks to the third-party network directly; everything
/// goes through this interface. Text handed to [`send_message`] and image
/// captions are already tagged, so the adapter can recognise its own echoes.
///
/// [`send_message`]: ThirdPartyAdapter::send_message
#[async_trait]
pub trait ThirdPartyAdapter: PluginAdapter {
    /// Display name of the bridged service, used for the status room.
    fn service_name(&self) -> &str;

    /// Optional local path of the service icon, uploaded once as the status room avatar.
    fn service_icon_path(&self) -> Option<PathBuf> {
        None
    }

    /// Connects to the third-party network. Failure is fatal at startup.
    async fn connect(&self) -> Result<(), MarionetteError>;

    /// Receives the next event from the third-party network.
    async fn receive(&self) -> Result<ThirdPartyEvent, MarionetteError>;

    /// Looks up profile data for a third-party user.
    async fn get_user_data(&self, user_id: &str) -> Result<UserData, MarionetteError>;

    /// Looks up metadata for a third-party room.
    async fn get_room_data(&self, room_id: &str) -> Result<RoomData, MarionetteError>;

    /// Sends tagged text to a third-party room.
    async fn send_message(&self, room_id: &str, text: &str) -> Result<(), MarionetteError>;

    /// Sends an image to a third-party room.
    async fn send_image_message(
        &self,
        room_id: &str,
        image: OutboundImage,
    ) -> Result<(), MarionetteError>;

    /// Marks a third-party room as read.
    async fn send_read_receipt(&self, room_id: &str) -> Result<(), MarionetteError>;

    /// Whether the adapter wants `!command` messages instead of plain relay.
    fn handles_bang_commands(&self) -> bool {
        false
    }

    /// Handles a `!command` typed by the operator in a bridged room.
    async fn handle_bang_command(
        &self,
        command: &BangCommand,
        event: &RoomMessageEvent,
    ) -> Result<(), MarionetteError> {
        let _ = event;
        Err(MarionetteError::adapter(format!(
            "bang command `{}` is not supported",
            command.command
        )))
    }
}
