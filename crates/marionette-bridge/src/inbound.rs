// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Third-party → home relay.

use marionette_core::events::{MediaInfo, RoomMessageContent};
use marionette_core::types::{
    Actor, GhostProfile, GhostSender, ImageContent, MessageContent, Origin, ThirdPartyMessage,
};
use marionette_core::MarionetteError;
use tracing::{debug, error, info, warn};

use crate::Bridge;

/// Who a relayed message is posted as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sender {
    Puppet,
    Ghost(String),
}

impl Sender {
    fn upload_actor(&self) -> Actor {
        match self {
            // Media is global to the homeserver; the bot uploads for the puppet.
            Self::Puppet => Actor::Bot,
            Self::Ghost(id) => Actor::User(id.clone()),
        }
    }
}

impl Bridge {
    /// Relays a text message from the third-party network.
    ///
    /// Relay failures are reported to the status room, not returned. Only a
    /// non-text payload is rejected, with `UnknownMessageKind`.
    pub async fn handle_third_party_room_message(
        &self,
        msg: ThirdPartyMessage,
    ) -> Result<(), MarionetteError> {
        if !matches!(msg.content, MessageContent::Text { .. }) {
            return Err(MarionetteError::UnknownMessageKind {
                kind: msg.content.kind().to_string(),
            });
        }
        self.relay_inbound(&msg).await;
        Ok(())
    }

    /// Relays an image message from the third-party network.
    pub async fn handle_third_party_room_image_message(
        &self,
        msg: ThirdPartyMessage,
    ) -> Result<(), MarionetteError> {
        if !matches!(msg.content, MessageContent::Image(_)) {
            return Err(MarionetteError::UnknownMessageKind {
                kind: msg.content.kind().to_string(),
            });
        }
        self.relay_inbound(&msg).await;
        Ok(())
    }

    /// Provisions ghosts for third-party participants and joins them to the
    /// status room. Per-user failures are logged and skipped.
    pub async fn join_third_party_users_to_status_room(
        &self,
        users: &[GhostProfile],
    ) -> Result<(), MarionetteError> {
        let status_room = self.rooms.status_room().await?;
        for user in users {
            let sender = GhostSender {
                sender_id: user.user_id.clone(),
                sender_name: user.name.clone(),
                avatar_url: user.avatar_url.clone(),
            };
            let joined = async {
                let ghost_id = self.profiles.provision(&sender).await?;
                self.join_ghost(&ghost_id, &status_room).await
            }
            .await;
            if let Err(e) = joined {
                warn!(user_id = %user.user_id, error = %e, "failed to join user to status room");
            }
        }
        info!(count = users.len(), "joined third-party users to status room");
        Ok(())
    }

    /// Marks the home room bridging `third_party_room_id` as read by the puppet.
    pub async fn send_read_receipt(&self, third_party_room_id: &str) -> Result<(), MarionetteError> {
        let room_id = self.rooms.resolve_room(third_party_room_id).await?;
        self.puppet.send_read_receipt(&room_id).await?;
        Ok(())
    }

    async fn relay_inbound(&self, msg: &ThirdPartyMessage) {
        if let Err(e) = self.try_relay_inbound(msg).await {
            error!(room_id = %msg.room_id, error = %e, "failed to relay third-party message");
            self.report_failure("relaying third-party message", &msg.summary(), &e)
                .await;
        }
    }

    async fn try_relay_inbound(&self, msg: &ThirdPartyMessage) -> Result<(), MarionetteError> {
        let room_id = self.rooms.resolve_room(&msg.room_id).await?;
        let sender = self.acting_sender(&msg.origin, &room_id).await?;

        match &msg.content {
            MessageContent::Text { body, html } => {
                let body = self.tagger.tag(body);
                let content = match html {
                    Some(html) => RoomMessageContent::html(body, html.clone()),
                    None => RoomMessageContent::text(body),
                };
                self.send_as(&sender, &room_id, &content).await?;
            }
            MessageContent::Image(image) => self.send_image(&sender, &room_id, image).await,
        }
        debug!(room_id = %room_id, kind = msg.content.kind(), "relayed inbound message");
        Ok(())
    }

    async fn acting_sender(&self, origin: &Origin, room_id: &str) -> Result<Sender, MarionetteError> {
        match origin {
            Origin::SelfOriginated => Ok(Sender::Puppet),
            Origin::Ghost(ghost) => {
                let ghost_id = self.profiles.provision(ghost).await?;
                let status_room = self.rooms.status_room().await?;
                self.join_ghost(&ghost_id, &status_room).await?;
                if room_id != status_room {
                    self.join_ghost(&ghost_id, room_id).await?;
                }
                Ok(Sender::Ghost(ghost_id))
            }
        }
    }

    async fn join_ghost(&self, ghost_id: &str, room_id: &str) -> Result<(), MarionetteError> {
        if self.puppet.is_member(room_id, ghost_id) {
            return Ok(());
        }
        self.directory
            .join_room(&Actor::User(ghost_id.to_string()), room_id)
            .await?;
        Ok(())
    }

    pub(crate) async fn send_as(
        &self,
        sender: &Sender,
        room_id: &str,
        content: &RoomMessageContent,
    ) -> Result<String, MarionetteError> {
        match sender {
            Sender::Puppet => self.puppet.send_message(room_id, content).await,
            Sender::Ghost(id) => {
                self.directory
                    .send_message(&Actor::User(id.clone()), room_id, content)
                    .await
            }
        }
    }

    /// Uploads and posts an image, falling back to a text notice on failure.
    async fn send_image(&self, sender: &Sender, room_id: &str, image: &ImageContent) {
        let sent = async {
            let content = self.image_content(sender, image).await?;
            self.send_as(sender, room_id, &content).await
        }
        .await;

        let Err(e) = sent else {
            return;
        };
        warn!(room_id = %room_id, source = %image.source.describe(), error = %e, "image relay failed, sending text instead");

        let text = match &image.caption {
            Some(caption) => format!("{caption}\n{}", image.source.describe()),
            None => image.source.describe(),
        };
        let notice = RoomMessageContent::notice(self.tagger.tag(&text));
        if let Err(e) = self.send_as(sender, room_id, &notice).await {
            error!(room_id = %room_id, error = %e, "failed to send image fallback notice");
        }
    }

    async fn image_content(
        &self,
        sender: &Sender,
        image: &ImageContent,
    ) -> Result<RoomMessageContent, MarionetteError> {
        let media = self.profiles.resolve_source(&image.source).await?;
        let (content_uri, mimetype, size) = self
            .profiles
            .upload_media(&sender.upload_actor(), media, image.mimetype.as_deref(), None)
            .await?;

        let body = self
            .tagger
            .tag(image.caption.as_deref().unwrap_or("image"));
        let info = MediaInfo {
            mimetype: Some(mimetype),
            w: image.width,
            h: image.height,
            size: Some(size),
        };
        Ok(RoomMessageContent::image(body, content_uri, info))
    }
}
