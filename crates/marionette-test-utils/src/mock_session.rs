// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock puppet session.
//!
//! `MockSession` hands out an event channel on `start()`; tests push home
//! events into it with [`MockSession::push_event`] and inspect the puppet's
//! sends, joins and receipts afterwards.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use marionette_core::events::{HomeEvent, RoomMessageContent, RoomMessageEvent};
use marionette_core::types::{AdapterType, HealthStatus};
use marionette_core::{HomeSession, MarionetteError, PluginAdapter};

use crate::PUPPET_USER_ID;

#[derive(Default)]
struct SessionState {
    events: Option<mpsc::Sender<HomeEvent>>,
    joins: Vec<String>,
    sent: Vec<(String, RoomMessageContent)>,
    receipts: Vec<(String, String)>,
    unjoinable: HashSet<String>,
    join_failures: HashSet<String>,
}

/// An in-memory [`HomeSession`].
pub struct MockSession {
    user_id: String,
    state: Mutex<SessionState>,
}

impl MockSession {
    pub fn new() -> Self {
        Self::with_user_id(PUPPET_USER_ID)
    }

    pub fn with_user_id(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Delivers an event to the receiver returned by `start()`.
    pub async fn push_event(&self, event: HomeEvent) -> Result<(), MarionetteError> {
        let sender = self
            .state
            .lock()
            .await
            .events
            .clone()
            .ok_or_else(|| MarionetteError::Internal("session not started".into()))?;
        sender
            .send(event)
            .await
            .map_err(|e| MarionetteError::Internal(format!("event receiver dropped: {e}")))
    }

    /// Makes the puppet's joins to `room_id` fail with "no usable servers".
    pub async fn make_unjoinable(&self, room_id: &str) {
        self.state.lock().await.unjoinable.insert(room_id.to_string());
    }

    /// Makes the puppet's joins to `room_id` fail with a generic rejection.
    pub async fn fail_joins_to(&self, room_id: &str) {
        self.state
            .lock()
            .await
            .join_failures
            .insert(room_id.to_string());
    }

    pub async fn joins(&self) -> Vec<String> {
        self.state.lock().await.joins.clone()
    }

    pub async fn sent_messages(&self) -> Vec<(String, RoomMessageContent)> {
        self.state.lock().await.sent.clone()
    }

    pub async fn receipts(&self) -> Vec<(String, String)> {
        self.state.lock().await.receipts.clone()
    }

    /// Builds a room message as if typed by `sender`.
    pub fn message_event(
        event_id: &str,
        room_id: &str,
        sender: &str,
        content: RoomMessageContent,
    ) -> RoomMessageEvent {
        RoomMessageEvent {
            event_id: event_id.to_string(),
            room_id: room_id.to_string(),
            sender: sender.to_string(),
            raw: serde_json::json!({
                "type": "m.room.message",
                "event_id": event_id,
                "room_id": room_id,
                "sender": sender,
                "content": &content,
            }),
            content,
        }
    }
}

impl Default for MockSession {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockSession {
    fn name(&self) -> &str {
        "mock-session"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Session
    }

    async fn health_check(&self) -> Result<HealthStatus, MarionetteError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MarionetteError> {
        self.state.lock().await.events = None;
        Ok(())
    }
}

#[async_trait]
impl HomeSession for MockSession {
    fn user_id(&self) -> &str {
        &self.user_id
    }

    async fn start(&self) -> Result<mpsc::Receiver<HomeEvent>, MarionetteError> {
        let (tx, rx) = mpsc::channel(64);
        self.state.lock().await.events = Some(tx);
        Ok(rx)
    }

    async fn join_room(&self, room: &str) -> Result<String, MarionetteError> {
        let mut state = self.state.lock().await;
        if state.unjoinable.contains(room) {
            return Err(MarionetteError::UnjoinableRoom {
                room_id: room.to_string(),
                message: "no usable servers".to_string(),
            });
        }
        if state.join_failures.contains(room) {
            return Err(MarionetteError::Session {
                message: format!("M_FORBIDDEN: cannot join {room}"),
                source: None,
            });
        }
        state.joins.push(room.to_string());
        Ok(room.to_string())
    }

    async fn send_message(
        &self,
        room_id: &str,
        content: &RoomMessageContent,
    ) -> Result<String, MarionetteError> {
        let mut state = self.state.lock().await;
        state.sent.push((room_id.to_string(), content.clone()));
        Ok(format!("$puppet{}", state.sent.len()))
    }

    async fn send_read_receipt(
        &self,
        room_id: &str,
        event_id: &str,
    ) -> Result<(), MarionetteError> {
        self.state
            .lock()
            .await
            .receipts
            .push((room_id.to_string(), event_id.to_string()));
        Ok(())
    }
}
