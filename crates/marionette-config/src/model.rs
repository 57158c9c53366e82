// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Marionette puppet bridge.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use marionette_core::{IdentityPair, MarionetteError};
use serde::{Deserialize, Serialize};

/// Top-level Marionette configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MarionetteConfig {
    /// The bridged identity pair.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Homeserver and application-service settings.
    #[serde(default)]
    pub homeserver: HomeserverConfig,

    /// The operator's own (puppeted) account.
    #[serde(default)]
    pub puppet: PuppetConfig,

    /// Relay behaviour tuning.
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Identity pair configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityConfig {
    /// Opaque identity id, e.g. the operator's handle on the third-party network.
    #[serde(default)]
    pub id: String,

    /// Short name of the bridged network, e.g. `facebook`.
    #[serde(default)]
    pub network: String,

    /// Override for the deduplication marker appended to bridge-authored text.
    #[serde(default)]
    pub dedup_tag: Option<String>,

    /// Override for the regular expression that detects the marker.
    #[serde(default)]
    pub dedup_pattern: Option<String>,
}

impl IdentityConfig {
    /// Builds the immutable identity pair used by the bridge.
    pub fn to_identity_pair(&self) -> Result<IdentityPair, MarionetteError> {
        Ok(IdentityPair::new(self.id.clone(), self.network.clone())?
            .with_dedup(self.dedup_tag.clone(), self.dedup_pattern.clone()))
    }
}

/// Homeserver connection and application-service credentials.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HomeserverConfig {
    /// Base URL of the client-server API.
    #[serde(default = "default_homeserver_url")]
    pub url: String,

    /// Server name used in user ids and aliases.
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Application-service token. `None` requires the environment variable.
    #[serde(default)]
    pub as_token: Option<String>,

    /// Localpart of the bridge bot.
    #[serde(default = "default_bot_localpart")]
    pub bot_localpart: String,

    /// Timeout for individual HTTP requests, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for HomeserverConfig {
    fn default() -> Self {
        Self {
            url: default_homeserver_url(),
            server_name: default_server_name(),
            as_token: None,
            bot_localpart: default_bot_localpart(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl HomeserverConfig {
    /// Full user id of the bridge bot.
    pub fn bot_user_id(&self) -> String {
        format!("@{}:{}", self.bot_localpart, self.server_name)
    }
}

fn default_homeserver_url() -> String {
    "http://localhost:8008".to_string()
}

fn default_server_name() -> String {
    "localhost".to_string()
}

fn default_bot_localpart() -> String {
    "marionettebot".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// The puppeted account's session credentials.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PuppetConfig {
    /// Full user id of the operator, e.g. `@alice:example.org`.
    #[serde(default)]
    pub user_id: Option<String>,

    /// Access token of the operator's session.
    #[serde(default)]
    pub access_token: Option<String>,
}

/// Relay behaviour configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// How many times an unjoinable room's alias is repaired before giving up.
    #[serde(default = "default_max_room_repairs")]
    pub max_room_repairs: u32,

    /// Report relay failures to the status room.
    #[serde(default = "default_status_notices")]
    pub status_notices: bool,

    /// Capacity of the home-network event channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_room_repairs: default_max_room_repairs(),
            status_notices: default_status_notices(),
            event_buffer: default_event_buffer(),
        }
    }
}

fn default_max_room_repairs() -> u32 {
    2
}

fn default_status_notices() -> bool {
    true
}

fn default_event_buffer() -> usize {
    256
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("marionette").join("marionette.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("marionette.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Log output configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = MarionetteConfig::default();
        assert_eq!(config.homeserver.url, "http://localhost:8008");
        assert_eq!(config.bridge.max_room_repairs, 2);
        assert!(config.bridge.status_notices);
        assert_eq!(config.logging.level, "info");
        assert!(config.storage.database_path.ends_with("marionette.db"));
    }

    #[test]
    fn bot_user_id_is_qualified() {
        let hs = HomeserverConfig {
            server_name: "example.org".into(),
            bot_localpart: "fbbot".into(),
            ..Default::default()
        };
        assert_eq!(hs.bot_user_id(), "@fbbot:example.org");
    }

    #[test]
    fn identity_pair_carries_dedup_overrides() {
        let identity = IdentityConfig {
            id: "alice".into(),
            network: "facebook".into(),
            dedup_tag: Some("~".into()),
            dedup_pattern: None,
        };
        let pair = identity.to_identity_pair().unwrap();
        assert_eq!(pair.dedup_tag(), Some("~"));
        assert_eq!(pair.network(), "facebook");
    }
}
