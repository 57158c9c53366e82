// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Home → third-party relay.

use marionette_core::events::{
    HomeEvent, MSGTYPE_EMOTE, MSGTYPE_IMAGE, MSGTYPE_NOTICE, MSGTYPE_TEXT, ReceiptEvent,
    RoomMessageContent, RoomMessageEvent,
};
use marionette_core::types::{BangCommand, OutboundImage, STATUS_ROOM_ID};
use marionette_core::MarionetteError;
use tracing::{debug, trace, warn};

use crate::{Bridge, STATUS_ROOM_NOTICE};

impl Bridge {
    /// Handles one event from the puppet session.
    pub async fn handle_home_event(&self, event: HomeEvent) {
        self.puppet.observe(&event);
        match event {
            HomeEvent::RoomMessage(ev) => self.handle_home_message(ev).await,
            HomeEvent::Receipt(receipt) => self.forward_receipt(receipt).await,
            HomeEvent::Membership(_) | HomeEvent::Other { .. } => {}
        }
    }

    /// Relays a message the operator sent on the home network.
    pub async fn handle_home_message(&self, ev: RoomMessageEvent) {
        if ev.sender != self.puppet.user_id() {
            trace!(sender = %ev.sender, "ignoring message from another user");
            return;
        }
        if self.tagger.is_tagged(&ev.content.body) {
            debug!(event_id = %ev.event_id, "ignoring bridge-authored message");
            return;
        }

        if let Err(e) = self.relay_outbound(&ev).await {
            warn!(room_id = %ev.room_id, event_id = %ev.event_id, error = %e, "failed to relay home message");
            let detail = serde_json::to_string_pretty(&ev.raw).unwrap_or_else(|_| ev.raw.to_string());
            self.report_failure("relaying home message", &detail, &e).await;
        }
    }

    async fn relay_outbound(&self, ev: &RoomMessageEvent) -> Result<(), MarionetteError> {
        let third_party_room = self.rooms.reverse_resolve_room(&ev.room_id).await?;

        if third_party_room == STATUS_ROOM_ID {
            let notice = RoomMessageContent::notice(self.tagger.tag(STATUS_ROOM_NOTICE));
            self.puppet.send_message(&ev.room_id, &notice).await?;
            return Ok(());
        }

        if self.adapter.handles_bang_commands()
            && let Some(command) = BangCommand::parse(&ev.content.body)
        {
            debug!(command = %command.command, "dispatching bang command");
            return self.adapter.handle_bang_command(&command, ev).await;
        }

        match ev.content.msgtype.as_str() {
            MSGTYPE_TEXT | MSGTYPE_NOTICE | MSGTYPE_EMOTE => {
                self.adapter
                    .send_message(&third_party_room, &self.tagger.tag(&ev.content.body))
                    .await
            }
            MSGTYPE_IMAGE => {
                let image = self.outbound_image(&ev.content)?;
                self.adapter
                    .send_image_message(&third_party_room, image)
                    .await
            }
            other => Err(MarionetteError::UnknownMessageKind {
                kind: other.to_string(),
            }),
        }
    }

    /// Normalizes an `m.image` body for the adapter.
    pub fn outbound_image(
        &self,
        content: &RoomMessageContent,
    ) -> Result<OutboundImage, MarionetteError> {
        let content_uri = content
            .url
            .as_deref()
            .ok_or_else(|| MarionetteError::upload("image event carries no url"))?;
        let url = self.directory.download_url(content_uri).ok_or_else(|| {
            MarionetteError::upload(format!("cannot build download url for {content_uri}"))
        })?;
        let info = content.info.clone().unwrap_or_default();
        Ok(OutboundImage {
            url,
            text: self.tagger.tag(&content.body),
            mimetype: info.mimetype,
            width: info.w,
            height: info.h,
            size: info.size,
        })
    }

    async fn forward_receipt(&self, receipt: ReceiptEvent) {
        if receipt.user_id != self.puppet.user_id() {
            return;
        }
        let Some(third_party_room) = self.repository.third_party_room(&receipt.room_id).await
        else {
            trace!(room_id = %receipt.room_id, "receipt for unmapped room");
            return;
        };
        if third_party_room == STATUS_ROOM_ID {
            return;
        }
        if let Err(e) = self.adapter.send_read_receipt(&third_party_room).await {
            warn!(third_party_room = %third_party_room, error = %e, "failed to forward read receipt");
        }
    }
}
