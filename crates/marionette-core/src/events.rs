// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Home-network (Matrix) event and content types.
//!
//! Field names follow the client-server wire format so the same structs
//! serialize straight into `m.room.message` bodies.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub const MSGTYPE_TEXT: &str = "m.text";
pub const MSGTYPE_NOTICE: &str = "m.notice";
pub const MSGTYPE_EMOTE: &str = "m.emote";
pub const MSGTYPE_IMAGE: &str = "m.image";

/// Format identifier for HTML bodies.
pub const HTML_FORMAT: &str = "org.matrix.custom.html";

/// Optional media metadata attached to image messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Content of an `m.room.message` event, in either direction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomMessageContent {
    #[serde(default)]
    pub msgtype: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<MediaInfo>,
}

impl RoomMessageContent {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            msgtype: MSGTYPE_TEXT.to_string(),
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn html(body: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            format: Some(HTML_FORMAT.to_string()),
            formatted_body: Some(html.into()),
            ..Self::text(body)
        }
    }

    pub fn notice(body: impl Into<String>) -> Self {
        Self {
            msgtype: MSGTYPE_NOTICE.to_string(),
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn image(body: impl Into<String>, content_uri: impl Into<String>, info: MediaInfo) -> Self {
        Self {
            msgtype: MSGTYPE_IMAGE.to_string(),
            body: body.into(),
            url: Some(content_uri.into()),
            info: Some(info),
            ..Default::default()
        }
    }
}

/// An `m.room.message` event seen by the puppet session.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomMessageEvent {
    pub event_id: String,
    pub room_id: String,
    pub sender: String,
    pub content: RoomMessageContent,
    /// The event as received, kept for diagnostics and command handlers.
    pub raw: serde_json::Value,
}

/// Membership states of `m.room.member`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Membership {
    Join,
    Leave,
    Invite,
    Ban,
    Knock,
}

/// A membership change for one user in one room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipEvent {
    pub room_id: String,
    pub user_id: String,
    pub membership: Membership,
}

/// A read receipt for one user in one room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptEvent {
    pub room_id: String,
    pub event_id: String,
    pub user_id: String,
}

/// Events delivered by the puppet's home-network session.
#[derive(Debug, Clone, PartialEq)]
pub enum HomeEvent {
    RoomMessage(RoomMessageEvent),
    Membership(MembershipEvent),
    Receipt(ReceiptEvent),
    /// Anything else; carried so callers can observe activity per room.
    Other {
        event_type: String,
        room_id: String,
        event_id: Option<String>,
    },
}

impl HomeEvent {
    pub fn room_id(&self) -> &str {
        match self {
            Self::RoomMessage(ev) => &ev.room_id,
            Self::Membership(ev) => &ev.room_id,
            Self::Receipt(ev) => &ev.room_id,
            Self::Other { room_id, .. } => room_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_content_serializes_format_fields() {
        let content = RoomMessageContent::html("hi", "<b>hi</b>");
        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json["msgtype"], "m.text");
        assert_eq!(json["format"], HTML_FORMAT);
        assert_eq!(json["formatted_body"], "<b>hi</b>");
        assert!(json.get("url").is_none());
    }

    #[test]
    fn image_content_parses_from_wire_json() {
        let json = serde_json::json!({
            "msgtype": "m.image",
            "body": "cat.png",
            "url": "mxc://example.org/abc",
            "info": { "mimetype": "image/png", "w": 640, "h": 480, "size": 1234 }
        });
        let content: RoomMessageContent = serde_json::from_value(json).unwrap();
        assert_eq!(content.msgtype, MSGTYPE_IMAGE);
        let info = content.info.unwrap();
        assert_eq!(info.w, Some(640));
        assert_eq!(info.size, Some(1234));
    }

    #[test]
    fn membership_parses_lowercase() {
        use std::str::FromStr;
        assert_eq!(Membership::from_str("join").unwrap(), Membership::Join);
        assert_eq!(Membership::Leave.to_string(), "leave");
    }
}
