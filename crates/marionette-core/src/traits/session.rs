// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport for the operator's own home-network session.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::MarionetteError;
use crate::events::{HomeEvent, RoomMessageContent};
use crate::traits::adapter::PluginAdapter;

/// The puppet's logged-in session.
///
/// Credentials are resolved before construction; this trait only
/// establishes the live connection and exposes the puppet's own actions.
#[async_trait]
pub trait HomeSession: PluginAdapter {
    /// Full user id of the puppet account.
    fn user_id(&self) -> &str;

    /// Starts the session.
    ///
    /// Returns only once the initial state synchronization has completed.
    /// Membership state from the initial sync is delivered first on the
    /// returned channel, followed by live events.
    async fn start(&self) -> Result<mpsc::Receiver<HomeEvent>, MarionetteError>;

    /// Joins the puppet to a room by id or alias, returning the room id.
    async fn join_room(&self, room: &str) -> Result<String, MarionetteError>;

    /// Sends a message as the puppet, returning the event id.
    async fn send_message(
        &self,
        room_id: &str,
        content: &RoomMessageContent,
    ) -> Result<String, MarionetteError>;

    /// Marks `event_id` in `room_id` as read by the puppet.
    async fn send_read_receipt(&self, room_id: &str, event_id: &str)
    -> Result<(), MarionetteError>;
}
