// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Marionette puppet bridge.

use thiserror::Error;

/// Boxed error source carried by transport and storage failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The primary error type used across all Marionette traits and core operations.
#[derive(Debug, Error)]
pub enum MarionetteError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// A codec token could not be decoded back into a third-party identifier.
    #[error("invalid identifier token `{token}`: {reason}")]
    InvalidToken { token: String, reason: String },

    /// No alias of a home room matches the bridge's derivation pattern.
    #[error("room {room_id} is not mapped to a third-party room")]
    UnmappedRoom { room_id: String },

    /// The room exists but can no longer be joined (emptied, no usable servers).
    #[error("room {room_id} cannot be joined: {message}")]
    UnjoinableRoom { room_id: String, message: String },

    /// The alias repair loop gave up.
    #[error("gave up repairing alias {alias} after {attempts} attempt(s)")]
    RepairExhausted { alias: String, attempts: u32 },

    /// The directory reported that a resource does not exist.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// Fetching or storing media content failed.
    #[error("upload failed: {message}")]
    Upload {
        message: String,
        source: Option<BoxError>,
    },

    /// Raising the puppet's power level failed.
    #[error("power level grant failed in {room_id}: {message}")]
    PowerGrant { room_id: String, message: String },

    /// The third-party adapter could not be initialised.
    #[error("adapter initialisation failed: {message}")]
    AdapterInit {
        message: String,
        source: Option<BoxError>,
    },

    /// A message kind the relay does not know how to forward.
    #[error("unknown message kind `{kind}`")]
    UnknownMessageKind { kind: String },

    /// Any other rejection from the room/identity directory.
    #[error("directory error: {message}")]
    Directory {
        message: String,
        source: Option<BoxError>,
    },

    /// Failures of the puppet's own home-network session.
    #[error("session error: {message}")]
    Session {
        message: String,
        source: Option<BoxError>,
    },

    /// Failures reported by the third-party adapter.
    #[error("adapter error: {message}")]
    Adapter {
        message: String,
        source: Option<BoxError>,
    },

    /// Storage backend errors (database connection, query failure, migration).
    #[error("storage error: {source}")]
    Storage { source: BoxError },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MarionetteError {
    /// Shorthand for a directory rejection without an underlying source.
    pub fn directory(message: impl Into<String>) -> Self {
        Self::Directory {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for an adapter failure without an underlying source.
    pub fn adapter(message: impl Into<String>) -> Self {
        Self::Adapter {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for an upload failure without an underlying source.
    pub fn upload(message: impl Into<String>) -> Self {
        Self::Upload {
            message: message.into(),
            source: None,
        }
    }

    /// Returns `true` for the "room unjoinable" condition that triggers alias repair.
    pub fn is_unjoinable(&self) -> bool {
        matches!(self, Self::UnjoinableRoom { .. })
    }

    /// Returns `true` when the directory reported a missing resource.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
