// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Room lifecycle, ghost sync, and bidirectional relay for the Marionette
//! puppet bridge.
//!
//! [`Bridge`] ties the collaborators together. Third-party traffic enters
//! through [`Bridge::handle_third_party_event`] (or the individual entry
//! points exposed to adapters); home-network traffic enters through
//! [`Bridge::handle_home_event`].

pub mod ghosts;
pub mod inbound;
pub mod lock;
pub mod media;
pub mod outbound;
pub mod repository;
pub mod rooms;
pub mod session;

use std::sync::Arc;

use marionette_codec::{IdentifierCodec, Tagger};
use marionette_core::events::{HomeEvent, RoomMessageContent};
use marionette_core::types::{MessageContent, ThirdPartyEvent};
use marionette_core::{
    HomeDirectory, HomeSession, IdentityPair, MarionetteError, MediaFetcher, RemoteUserStore,
    RoomRepository, ThirdPartyAdapter,
};
use tokio::sync::mpsc;
use tracing::{error, warn};

pub use ghosts::ProfileSync;
pub use lock::KeyedLocks;
pub use media::HttpMediaFetcher;
pub use repository::MemoryRoomRepository;
pub use rooms::RoomManager;
pub use session::PuppetSession;

/// Fixed reply to anything the operator types in the status room.
pub const STATUS_ROOM_NOTICE: &str = "This is the status room. Messages sent here are not relayed.";

/// Relay tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeSettings {
    /// Alias repairs allowed per room resolution.
    pub max_room_repairs: u32,
    /// Report relay failures to the status room.
    pub status_notices: bool,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            max_room_repairs: 2,
            status_notices: true,
        }
    }
}

/// Everything a [`Bridge`] is assembled from.
pub struct BridgeDeps {
    pub identity: IdentityPair,
    pub directory: Arc<dyn HomeDirectory>,
    pub session: Arc<dyn HomeSession>,
    pub adapter: Arc<dyn ThirdPartyAdapter>,
    pub users: Arc<dyn RemoteUserStore>,
    pub repository: Arc<dyn RoomRepository>,
    pub fetcher: Arc<dyn MediaFetcher>,
    pub settings: BridgeSettings,
}

/// The bidirectional relay for one identity pair.
pub struct Bridge {
    pub(crate) directory: Arc<dyn HomeDirectory>,
    pub(crate) adapter: Arc<dyn ThirdPartyAdapter>,
    pub(crate) repository: Arc<dyn RoomRepository>,
    pub(crate) puppet: Arc<PuppetSession>,
    pub(crate) profiles: Arc<ProfileSync>,
    pub(crate) rooms: RoomManager,
    pub(crate) tagger: Tagger,
    pub(crate) settings: BridgeSettings,
}

impl Bridge {
    pub fn new(deps: BridgeDeps) -> Result<Self, MarionetteError> {
        let tagger = Tagger::for_identity(&deps.identity)?;
        let codec = IdentifierCodec::new(&deps.identity, deps.directory.server_name());
        let puppet = Arc::new(PuppetSession::new(deps.session));
        let profiles = Arc::new(ProfileSync::new(
            deps.directory.clone(),
            deps.adapter.clone(),
            deps.users,
            deps.fetcher,
            codec.clone(),
        ));
        let rooms = RoomManager::new(
            deps.directory.clone(),
            deps.adapter.clone(),
            deps.repository.clone(),
            puppet.clone(),
            profiles.clone(),
            codec,
            deps.settings.max_room_repairs,
        );

        Ok(Self {
            directory: deps.directory,
            adapter: deps.adapter,
            repository: deps.repository,
            puppet,
            profiles,
            rooms,
            tagger,
            settings: deps.settings,
        })
    }

    pub fn puppet(&self) -> &Arc<PuppetSession> {
        &self.puppet
    }

    pub fn rooms(&self) -> &RoomManager {
        &self.rooms
    }

    pub fn profiles(&self) -> &ProfileSync {
        &self.profiles
    }

    pub fn tagger(&self) -> &Tagger {
        &self.tagger
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    /// Starts the puppet session; events flow once the initial sync is done.
    pub async fn start(&self) -> Result<mpsc::Receiver<HomeEvent>, MarionetteError> {
        self.puppet.start().await
    }

    /// Dispatches one event from the third-party adapter.
    pub async fn handle_third_party_event(
        &self,
        event: ThirdPartyEvent,
    ) -> Result<(), MarionetteError> {
        match event {
            ThirdPartyEvent::Message(msg) => match msg.content {
                MessageContent::Text { .. } => self.handle_third_party_room_message(msg).await,
                MessageContent::Image(_) => self.handle_third_party_room_image_message(msg).await,
            },
            ThirdPartyEvent::JoinStatusRoom(users) => {
                self.join_third_party_users_to_status_room(&users).await
            }
            ThirdPartyEvent::ReadReceipt { room_id } => self.send_read_receipt(&room_id).await,
        }
    }

    /// Posts a tagged notice to the status room as the puppet.
    pub async fn send_status_notice(&self, text: &str) -> Result<(), MarionetteError> {
        let status_room = self.rooms.status_room().await?;
        let content = RoomMessageContent::notice(self.tagger.tag(text));
        self.puppet.send_message(&status_room, &content).await?;
        Ok(())
    }

    /// Reports a relay failure to the status room, best effort.
    pub(crate) async fn report_failure(&self, what: &str, detail: &str, err: &MarionetteError) {
        if !self.settings.status_notices {
            warn!(what = %what, error = %err, "status notices disabled; failure not reported");
            return;
        }
        let text = format!("Error {what}: {err}\n\n{detail}");
        if let Err(e) = self.send_status_notice(&text).await {
            error!(what = %what, error = %e, original = %err, "failed to report to status room");
        }
    }
}
