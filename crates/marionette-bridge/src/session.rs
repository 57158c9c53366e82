// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The operator's puppeted home-network session.
//!
//! Wraps a [`HomeSession`] transport and keeps two pieces of derived state
//! from the events flowing through it: who is joined to each room, and the
//! latest event id seen per room (used to mark rooms read).

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use marionette_core::events::{HomeEvent, Membership, RoomMessageContent};
use marionette_core::{HomeSession, MarionetteError};
use tokio::sync::mpsc;
use tracing::{debug, info};

pub struct PuppetSession {
    transport: Arc<dyn HomeSession>,
    members: DashMap<String, HashSet<String>>,
    latest_events: DashMap<String, String>,
}

impl PuppetSession {
    pub fn new(transport: Arc<dyn HomeSession>) -> Self {
        Self {
            transport,
            members: DashMap::new(),
            latest_events: DashMap::new(),
        }
    }

    pub fn user_id(&self) -> &str {
        self.transport.user_id()
    }

    /// Establishes the session. Returns once the initial sync is complete.
    pub async fn start(&self) -> Result<mpsc::Receiver<HomeEvent>, MarionetteError> {
        let events = self.transport.start().await?;
        info!(user_id = %self.user_id(), "puppet session started");
        Ok(events)
    }

    /// Folds an event into the membership snapshot and latest-event index.
    pub fn observe(&self, event: &HomeEvent) {
        match event {
            HomeEvent::Membership(ev) => {
                let mut members = self.members.entry(ev.room_id.clone()).or_default();
                match ev.membership {
                    Membership::Join => {
                        members.insert(ev.user_id.clone());
                    }
                    Membership::Leave | Membership::Ban => {
                        members.remove(&ev.user_id);
                    }
                    Membership::Invite | Membership::Knock => {}
                }
            }
            HomeEvent::RoomMessage(ev) => {
                self.latest_events
                    .insert(ev.room_id.clone(), ev.event_id.clone());
            }
            HomeEvent::Other {
                room_id,
                event_id: Some(event_id),
                ..
            } => {
                self.latest_events.insert(room_id.clone(), event_id.clone());
            }
            HomeEvent::Other { .. } | HomeEvent::Receipt(_) => {}
        }
    }

    /// Users currently joined to `room_id`, as far as this session has seen.
    pub fn members(&self, room_id: &str) -> Vec<String> {
        let mut members: Vec<String> = self
            .members
            .get(room_id)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default();
        members.sort();
        members
    }

    pub fn is_member(&self, room_id: &str, user_id: &str) -> bool {
        self.members
            .get(room_id)
            .is_some_and(|m| m.contains(user_id))
    }

    /// Rooms the puppet itself is joined to.
    pub fn joined_rooms(&self) -> Vec<String> {
        let me = self.user_id();
        let mut rooms: Vec<String> = self
            .members
            .iter()
            .filter(|entry| entry.value().contains(me))
            .map(|entry| entry.key().clone())
            .collect();
        rooms.sort();
        rooms
    }

    pub fn latest_event(&self, room_id: &str) -> Option<String> {
        self.latest_events.get(room_id).map(|e| e.value().clone())
    }

    pub async fn join_room(&self, room: &str) -> Result<String, MarionetteError> {
        self.transport.join_room(room).await
    }

    pub async fn send_message(
        &self,
        room_id: &str,
        content: &RoomMessageContent,
    ) -> Result<String, MarionetteError> {
        self.transport.send_message(room_id, content).await
    }

    /// Marks the latest known event in `room_id` as read.
    ///
    /// Returns `false` when no event has been seen in the room yet.
    pub async fn send_read_receipt(&self, room_id: &str) -> Result<bool, MarionetteError> {
        let Some(event_id) = self.latest_event(room_id) else {
            debug!(room_id = %room_id, "no event to mark read");
            return Ok(false);
        };
        self.transport.send_read_receipt(room_id, &event_id).await?;
        Ok(true)
    }
}
