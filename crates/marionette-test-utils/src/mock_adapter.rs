// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock third-party adapter for deterministic testing.
//!
//! `MockAdapter` serves canned user and room data, captures everything the
//! bridge sends to the third-party side, and replays injected events from
//! `receive()`.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use marionette_core::events::RoomMessageEvent;
use marionette_core::types::{
    AdapterType, BangCommand, HealthStatus, OutboundImage, RoomData, ThirdPartyEvent, UserData,
};
use marionette_core::{MarionetteError, PluginAdapter, ThirdPartyAdapter};

#[derive(Default)]
struct AdapterState {
    users: HashMap<String, UserData>,
    rooms: HashMap<String, RoomData>,
    user_data_calls: usize,
    sent: Vec<(String, String)>,
    images: Vec<(String, OutboundImage)>,
    receipts: Vec<String>,
    commands: Vec<BangCommand>,
    fail_sends: bool,
}

/// An in-memory [`ThirdPartyAdapter`].
pub struct MockAdapter {
    service_name: String,
    icon_path: Option<PathBuf>,
    handles_bang_commands: bool,
    fail_connect: bool,
    inbound: Arc<Mutex<VecDeque<ThirdPartyEvent>>>,
    notify: Arc<Notify>,
    state: Mutex<AdapterState>,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self {
            service_name: "Mocknet".to_string(),
            icon_path: None,
            handles_bang_commands: false,
            fail_connect: false,
            inbound: Arc::new(Mutex::new(VecDeque::new())),
            notify: Arc::new(Notify::new()),
            state: Mutex::new(AdapterState::default()),
        }
    }

    pub fn with_icon_path(mut self, path: PathBuf) -> Self {
        self.icon_path = Some(path);
        self
    }

    pub fn with_bang_commands(mut self) -> Self {
        self.handles_bang_commands = true;
        self
    }

    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub async fn add_user(&self, user_id: &str, data: UserData) {
        self.state
            .lock()
            .await
            .users
            .insert(user_id.to_string(), data);
    }

    pub async fn add_room(&self, room_id: &str, data: RoomData) {
        self.state
            .lock()
            .await
            .rooms
            .insert(room_id.to_string(), data);
    }

    pub async fn fail_sends(&self) {
        self.state.lock().await.fail_sends = true;
    }

    /// Queues an event for `receive()`.
    pub async fn inject_event(&self, event: ThirdPartyEvent) {
        self.inbound.lock().await.push_back(event);
        self.notify.notify_one();
    }

    pub async fn user_data_calls(&self) -> usize {
        self.state.lock().await.user_data_calls
    }

    pub async fn sent_messages(&self) -> Vec<(String, String)> {
        self.state.lock().await.sent.clone()
    }

    pub async fn sent_images(&self) -> Vec<(String, OutboundImage)> {
        self.state.lock().await.images.clone()
    }

    pub async fn read_receipts(&self) -> Vec<String> {
        self.state.lock().await.receipts.clone()
    }

    pub async fn commands(&self) -> Vec<BangCommand> {
        self.state.lock().await.commands.clone()
    }
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockAdapter {
    fn name(&self) -> &str {
        "mock-adapter"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::ThirdParty
    }

    async fn health_check(&self) -> Result<HealthStatus, MarionetteError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MarionetteError> {
        Ok(())
    }
}

#[async_trait]
impl ThirdPartyAdapter for MockAdapter {
    fn service_name(&self) -> &str {
        &self.service_name
    }

    fn service_icon_path(&self) -> Option<PathBuf> {
        self.icon_path.clone()
    }

    async fn connect(&self) -> Result<(), MarionetteError> {
        if self.fail_connect {
            return Err(MarionetteError::AdapterInit {
                message: "mock login rejected".into(),
                source: None,
            });
        }
        Ok(())
    }

    async fn receive(&self) -> Result<ThirdPartyEvent, MarionetteError> {
        loop {
            if let Some(event) = self.inbound.lock().await.pop_front() {
                return Ok(event);
            }
            self.notify.notified().await;
        }
    }

    async fn get_user_data(&self, user_id: &str) -> Result<UserData, MarionetteError> {
        let mut state = self.state.lock().await;
        state.user_data_calls += 1;
        Ok(state.users.get(user_id).cloned().unwrap_or_default())
    }

    async fn get_room_data(&self, room_id: &str) -> Result<RoomData, MarionetteError> {
        Ok(self
            .state
            .lock()
            .await
            .rooms
            .get(room_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn send_message(&self, room_id: &str, text: &str) -> Result<(), MarionetteError> {
        let mut state = self.state.lock().await;
        if state.fail_sends {
            return Err(MarionetteError::adapter("mock send rejected"));
        }
        state.sent.push((room_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn send_image_message(
        &self,
        room_id: &str,
        image: OutboundImage,
    ) -> Result<(), MarionetteError> {
        let mut state = self.state.lock().await;
        if state.fail_sends {
            return Err(MarionetteError::adapter("mock send rejected"));
        }
        state.images.push((room_id.to_string(), image));
        Ok(())
    }

    async fn send_read_receipt(&self, room_id: &str) -> Result<(), MarionetteError> {
        self.state.lock().await.receipts.push(room_id.to_string());
        Ok(())
    }

    fn handles_bang_commands(&self) -> bool {
        self.handles_bang_commands
    }

    async fn handle_bang_command(
        &self,
        command: &BangCommand,
        _event: &RoomMessageEvent,
    ) -> Result<(), MarionetteError> {
        self.state.lock().await.commands.push(command.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn receive_returns_injected_events() {
        let adapter = MockAdapter::new();
        adapter
            .inject_event(ThirdPartyEvent::ReadReceipt {
                room_id: "t1".into(),
            })
            .await;
        match adapter.receive().await.unwrap() {
            ThirdPartyEvent::ReadReceipt { room_id } => assert_eq!(room_id, "t1"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_users_have_empty_data() {
        let adapter = MockAdapter::new();
        assert_eq!(adapter.get_user_data("ghost").await.unwrap(), UserData::default());
        assert_eq!(adapter.user_data_calls().await, 1);
    }

    #[tokio::test]
    async fn failing_connect_reports_adapter_init() {
        let adapter = MockAdapter::new().failing_connect();
        assert!(matches!(
            adapter.connect().await,
            Err(MarionetteError::AdapterInit { .. })
        ));
    }
}
