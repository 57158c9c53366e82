// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across the bridge traits and the relay pipeline.

use std::path::PathBuf;

use serde::{Deserialize, Serialize, Serializer};
use strum::{Display, EnumString};

use crate::error::MarionetteError;

/// Third-party room id reserved for the per-identity status room.
pub const STATUS_ROOM_ID: &str = "status_room";

/// Power level granted to the puppet in every bridged room.
pub const PUPPET_POWER_LEVEL: i64 = 100;

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the role an adapter plays in the bridge.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    ThirdParty,
    Directory,
    Session,
    Storage,
}

/// One bridged home-network account.
///
/// `id` and `network` are restricted to `[a-z0-9.=-]` so that the derived
/// `{network}_puppet_{id}_{token}` names split unambiguously on `_`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityPair {
    id: String,
    network: String,
    dedup_tag: Option<String>,
    dedup_pattern: Option<String>,
}

impl IdentityPair {
    /// Creates an identity pair, rejecting ids or network names that would
    /// make derived names ambiguous.
    pub fn new(id: impl Into<String>, network: impl Into<String>) -> Result<Self, MarionetteError> {
        let id = id.into();
        let network = network.into();
        validate_name_part("identity id", &id)?;
        validate_name_part("network", &network)?;
        Ok(Self {
            id,
            network,
            dedup_tag: None,
            dedup_pattern: None,
        })
    }

    /// Overrides the deduplication marker and/or its matching pattern.
    pub fn with_dedup(mut self, tag: Option<String>, pattern: Option<String>) -> Self {
        self.dedup_tag = tag;
        self.dedup_pattern = pattern;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn dedup_tag(&self) -> Option<&str> {
        self.dedup_tag.as_deref()
    }

    pub fn dedup_pattern(&self) -> Option<&str> {
        self.dedup_pattern.as_deref()
    }
}

/// Returns `true` if `c` may appear in an identity id or network name.
pub fn is_name_part_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '=' | '-')
}

fn validate_name_part(what: &str, value: &str) -> Result<(), MarionetteError> {
    if value.is_empty() {
        return Err(MarionetteError::Config(format!("{what} must not be empty")));
    }
    if let Some(bad) = value.chars().find(|c| !is_name_part_char(*c)) {
        return Err(MarionetteError::Config(format!(
            "{what} `{value}` contains `{bad}`; only a-z, 0-9, '.', '=' and '-' are allowed"
        )));
    }
    Ok(())
}

/// Who a third-party message is relayed as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum Origin {
    /// Sent by the operator from the third-party side of their own account;
    /// relayed through the puppet session.
    SelfOriginated,
    /// Sent by another participant; relayed through that participant's ghost.
    Ghost(GhostSender),
}

/// Third-party sender details carried by ghost-originated messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GhostSender {
    pub sender_id: String,
    pub sender_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl GhostSender {
    pub fn new(sender_id: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            sender_name: None,
            avatar_url: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = Some(name.into());
        self
    }

    pub fn with_avatar(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }
}

/// Where media bytes come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaSource {
    /// A publicly fetchable URL.
    Url(String),
    /// A file on local disk.
    Path(PathBuf),
    /// Bytes already in memory.
    Bytes(#[serde(serialize_with = "serialize_byte_len")] Vec<u8>),
}

impl MediaSource {
    /// Picks one source from optional parts, preferring URL, then path, then bytes.
    pub fn from_parts(
        url: Option<String>,
        path: Option<PathBuf>,
        bytes: Option<Vec<u8>>,
    ) -> Option<Self> {
        url.map(Self::Url)
            .or_else(|| path.map(Self::Path))
            .or_else(|| bytes.map(Self::Bytes))
    }

    /// Human-readable reference used in degraded text notices.
    pub fn describe(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::Path(path) => path.display().to_string(),
            Self::Bytes(bytes) => format!("[image, {} bytes]", bytes.len()),
        }
    }
}

fn serialize_byte_len<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("<{} bytes>", bytes.len()))
}

/// Image attributes supplied by the adapter alongside the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageContent {
    pub source: MediaSource,
    pub caption: Option<String>,
    pub mimetype: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ImageContent {
    pub fn new(source: MediaSource) -> Self {
        Self {
            source,
            caption: None,
            mimetype: None,
            width: None,
            height: None,
        }
    }
}

/// Content of a message arriving from the third-party network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageContent {
    Text { body: String, html: Option<String> },
    Image(ImageContent),
}

impl MessageContent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Image(_) => "image",
        }
    }
}

/// A message handed to the bridge by the third-party adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThirdPartyMessage {
    pub room_id: String,
    pub origin: Origin,
    pub content: MessageContent,
}

impl ThirdPartyMessage {
    pub fn text(room_id: impl Into<String>, origin: Origin, body: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            origin,
            content: MessageContent::Text {
                body: body.into(),
                html: None,
            },
        }
    }

    pub fn image(room_id: impl Into<String>, origin: Origin, image: ImageContent) -> Self {
        Self {
            room_id: room_id.into(),
            origin,
            content: MessageContent::Image(image),
        }
    }

    /// JSON rendering attached to status-room error reports.
    pub fn summary(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}

/// Profile data the adapter reports for a third-party user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Metadata the adapter reports for a third-party room.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomData {
    pub name: Option<String>,
    pub topic: Option<String>,
    pub avatar_url: Option<String>,
}

/// Persisted profile cache entry, keyed by the encoded third-party user id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUserRecord {
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

impl From<UserData> for RemoteUserRecord {
    fn from(data: UserData) -> Self {
        Self {
            name: data.name,
            avatar_url: data.avatar_url,
        }
    }
}

/// A third-party participant to be joined to the status room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GhostProfile {
    pub user_id: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

/// An image forwarded from the home network to the third-party network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundImage {
    /// Fetchable HTTP(S) URL of the image.
    pub url: String,
    /// Tagged caption.
    pub text: String,
    pub mimetype: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub size: Option<u64>,
}

/// A `!command arg...` message addressed to the adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BangCommand {
    pub command: String,
    pub args: Vec<String>,
}

impl BangCommand {
    /// Parses `!command arg1 arg2`; returns `None` for anything else.
    pub fn parse(body: &str) -> Option<Self> {
        let rest = body.trim().strip_prefix('!')?;
        let mut words = rest.split_whitespace();
        let command = words.next()?;
        if command.starts_with('!') {
            return None;
        }
        Some(Self {
            command: command.to_string(),
            args: words.map(str::to_string).collect(),
        })
    }
}

/// Events the third-party adapter pushes to the bridge runtime.
#[derive(Debug, Clone)]
pub enum ThirdPartyEvent {
    Message(ThirdPartyMessage),
    JoinStatusRoom(Vec<GhostProfile>),
    ReadReceipt { room_id: String },
}

/// Which directory identity performs an operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Actor {
    /// The application-service bot.
    Bot,
    /// A ghost (or any other user the bot may act as).
    User(String),
}

/// Parameters for creating a bridged room.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomCreation {
    pub alias_local_part: String,
    pub name: Option<String>,
    pub topic: Option<String>,
    pub invite: Vec<String>,
}
