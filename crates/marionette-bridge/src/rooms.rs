// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Room lifecycle: find, create, repair, join, and empower.
//!
//! Resolution of a third-party room to a home room runs the state machine
//!
//! ```text
//! Lookup ─┬─ found ──────────────┐
//!         └─ missing ─ Create ───┤
//!                                ▼
//!                              Join ─ unjoinable ─ Repair ─▶ Lookup
//!                                │
//!                                ▼
//!                           GrantPower ─▶ Ready
//! ```
//!
//! `Repair` deletes the stale alias. The number of repairs per resolution
//! is bounded; exhausting it fails with [`MarionetteError::RepairExhausted`].
//! Resolution is serialized per alias and short-circuits through the
//! [`RoomRepository`] once a room is known.

use std::sync::Arc;

use marionette_codec::IdentifierCodec;
use marionette_core::types::{
    Actor, PUPPET_POWER_LEVEL, RoomCreation, RoomData, STATUS_ROOM_ID,
};
use marionette_core::{HomeDirectory, MarionetteError, RoomRepository, ThirdPartyAdapter};
use tracing::{debug, info, warn};

use crate::ghosts::ProfileSync;
use crate::lock::KeyedLocks;
use crate::session::PuppetSession;

/// Topic given to the status room.
pub const STATUS_ROOM_TOPIC: &str = "Bridge status and error notices";

/// One step of a room resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Lookup,
    Create,
    Join { room_id: String, created: bool },
    Repair { room_id: String },
    GrantPower { room_id: String, created: bool },
}

/// Finds, creates, and repairs bridged rooms.
pub struct RoomManager {
    directory: Arc<dyn HomeDirectory>,
    adapter: Arc<dyn ThirdPartyAdapter>,
    repository: Arc<dyn RoomRepository>,
    puppet: Arc<PuppetSession>,
    profiles: Arc<ProfileSync>,
    codec: IdentifierCodec,
    max_repairs: u32,
    locks: KeyedLocks,
}

impl RoomManager {
    pub fn new(
        directory: Arc<dyn HomeDirectory>,
        adapter: Arc<dyn ThirdPartyAdapter>,
        repository: Arc<dyn RoomRepository>,
        puppet: Arc<PuppetSession>,
        profiles: Arc<ProfileSync>,
        codec: IdentifierCodec,
        max_repairs: u32,
    ) -> Self {
        Self {
            directory,
            adapter,
            repository,
            puppet,
            profiles,
            codec,
            max_repairs,
            locks: KeyedLocks::new(),
        }
    }

    pub fn codec(&self) -> &IdentifierCodec {
        &self.codec
    }

    /// Returns the home room bridging `third_party_room_id`, creating it if needed.
    pub async fn resolve_room(&self, third_party_room_id: &str) -> Result<String, MarionetteError> {
        if let Some(room_id) = self.repository.home_room(third_party_room_id).await {
            return Ok(room_id);
        }

        let alias = self.codec.room_alias(third_party_room_id);
        let _guard = self.locks.lock(&alias).await;

        // Another task may have finished while we waited for the lock.
        if let Some(room_id) = self.repository.home_room(third_party_room_id).await {
            return Ok(room_id);
        }

        let room_id = self.run(third_party_room_id, &alias).await?;
        self.repository.insert(&room_id, third_party_room_id).await;
        info!(third_party_room_id = %third_party_room_id, room_id = %room_id, alias = %alias, "room resolved");
        Ok(room_id)
    }

    /// Returns this identity's status room, creating it if needed.
    pub async fn status_room(&self) -> Result<String, MarionetteError> {
        self.resolve_room(STATUS_ROOM_ID).await
    }

    /// Maps a home room back to the third-party room it bridges.
    ///
    /// Consults the repository first, then the room's aliases; the first alias
    /// that parses under this identity wins and is remembered.
    pub async fn reverse_resolve_room(&self, home_room_id: &str) -> Result<String, MarionetteError> {
        if let Some(third_party) = self.repository.third_party_room(home_room_id).await {
            return Ok(third_party);
        }

        for alias in self.directory.room_aliases(home_room_id).await? {
            match self.codec.parse_room_alias(&alias) {
                Ok(Some(third_party)) => {
                    self.repository.insert(home_room_id, &third_party).await;
                    debug!(home_room_id = %home_room_id, alias = %alias, "reverse-resolved room");
                    return Ok(third_party);
                }
                Ok(None) => {}
                Err(e) => debug!(alias = %alias, error = %e, "skipping malformed alias"),
            }
        }

        Err(MarionetteError::UnmappedRoom {
            room_id: home_room_id.to_string(),
        })
    }

    async fn run(&self, third_party_room_id: &str, alias: &str) -> Result<String, MarionetteError> {
        let mut repairs = 0u32;
        let mut step = Step::Lookup;

        loop {
            step = match step {
                Step::Lookup => match self.directory.resolve_alias(alias).await? {
                    Some(room_id) => {
                        debug!(alias = %alias, room_id = %room_id, "found room via alias");
                        Step::Join {
                            room_id,
                            created: false,
                        }
                    }
                    None => Step::Create,
                },
                Step::Create => {
                    let room_id = self.create(third_party_room_id).await?;
                    Step::Join {
                        room_id,
                        created: true,
                    }
                }
                Step::Join { room_id, created } => match self.puppet.join_room(&room_id).await {
                    Ok(_) => Step::GrantPower { room_id, created },
                    Err(e) if e.is_unjoinable() => {
                        warn!(room_id = %room_id, alias = %alias, error = %e, "room is unjoinable");
                        Step::Repair { room_id }
                    }
                    Err(e) => {
                        warn!(room_id = %room_id, error = %e, "ignoring puppet join failure");
                        Step::GrantPower { room_id, created }
                    }
                },
                Step::Repair { room_id } => {
                    if repairs >= self.max_repairs {
                        return Err(MarionetteError::RepairExhausted {
                            alias: alias.to_string(),
                            attempts: repairs,
                        });
                    }
                    repairs += 1;
                    self.directory.delete_alias(alias).await?;
                    self.repository.remove(&room_id).await;
                    info!(alias = %alias, stale_room_id = %room_id, repairs, "deleted stale alias");
                    Step::Lookup
                }
                Step::GrantPower { room_id, created } => {
                    self.grant_power(&room_id).await;
                    if created {
                        self.bot_leave(&room_id).await;
                    }
                    return Ok(room_id);
                }
            };
        }
    }

    async fn create(&self, third_party_room_id: &str) -> Result<String, MarionetteError> {
        let is_status = third_party_room_id == STATUS_ROOM_ID;
        let data = if is_status {
            RoomData {
                name: Some(self.adapter.service_name().to_string()),
                topic: Some(STATUS_ROOM_TOPIC.to_string()),
                avatar_url: None,
            }
        } else {
            self.adapter.get_room_data(third_party_room_id).await?
        };

        let creation = RoomCreation {
            alias_local_part: self.codec.room_local_part(third_party_room_id),
            name: data.name,
            topic: data.topic,
            invite: vec![self.puppet.user_id().to_string()],
        };
        let room_id = self.directory.create_room(&creation).await?;
        info!(third_party_room_id = %third_party_room_id, room_id = %room_id, "created room");

        let avatar = if is_status {
            match self.adapter.service_icon_path() {
                Some(path) => self.profiles.ensure_room_avatar_from_local(&room_id, &path).await,
                None => Ok(()),
            }
        } else {
            match data.avatar_url.as_deref() {
                Some(url) => self.profiles.ensure_room_avatar(&room_id, url).await,
                None => Ok(()),
            }
        };
        if let Err(e) = avatar {
            warn!(room_id = %room_id, error = %e, "failed to set room avatar");
        }

        Ok(room_id)
    }

    async fn grant_power(&self, room_id: &str) {
        let puppet = self.puppet.user_id();
        match self
            .directory
            .set_power_level(room_id, puppet, PUPPET_POWER_LEVEL)
            .await
        {
            Ok(()) => debug!(room_id = %room_id, puppet = %puppet, "granted puppet power"),
            Err(e) => {
                let e = MarionetteError::PowerGrant {
                    room_id: room_id.to_string(),
                    message: e.to_string(),
                };
                warn!(error = %e, "continuing without power grant");
            }
        }
    }

    async fn bot_leave(&self, room_id: &str) {
        if let Err(e) = self.directory.leave_room(&Actor::Bot, room_id).await {
            warn!(room_id = %room_id, error = %e, "bot failed to leave created room");
        }
    }
}
