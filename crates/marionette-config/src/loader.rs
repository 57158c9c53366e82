// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./marionette.toml` > `~/.config/marionette/marionette.toml`
//! > `/etc/marionette/marionette.toml` with environment variable overrides via
//! the `MARIONETTE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::MarionetteConfig;

/// System-wide configuration file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/marionette/marionette.toml";

/// Local configuration file, relative to the working directory.
pub const LOCAL_CONFIG_PATH: &str = "marionette.toml";

/// Sections recognised when mapping `MARIONETTE_*` variables to keys.
const ENV_SECTIONS: [&str; 6] = [
    "identity",
    "homeserver",
    "puppet",
    "bridge",
    "storage",
    "logging",
];

/// Path of the per-user configuration file, if a config dir exists.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("marionette").join("marionette.toml"))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/marionette/marionette.toml` (system-wide)
/// 3. `~/.config/marionette/marionette.toml` (user XDG config)
/// 4. `./marionette.toml` (local directory)
/// 5. `MARIONETTE_*` environment variables
pub fn load_config() -> Result<MarionetteConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<MarionetteConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MarionetteConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<MarionetteConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MarionetteConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(MarionetteConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// Maps a lowercased, prefix-stripped variable name to a dotted key.
///
/// Only the first underscore after a known section becomes a dot, so
/// `homeserver_as_token` maps to `homeserver.as_token`.
pub fn env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

/// Uses `Env::map()` rather than `Env::split("_")` because key names
/// themselves contain underscores.
fn env_provider() -> Env {
    Env::prefixed("MARIONETTE_").map(|key| env_key(key.as_str()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(env_key("homeserver_as_token"), "homeserver.as_token");
        assert_eq!(env_key("puppet_access_token"), "puppet.access_token");
        assert_eq!(env_key("bridge_max_room_repairs"), "bridge.max_room_repairs");
        assert_eq!(env_key("identity_id"), "identity.id");
        assert_eq!(env_key("unknown_thing"), "unknown_thing");
    }

    #[test]
    fn user_config_path_ends_with_file_name() {
        if let Some(path) = user_config_path() {
            assert!(path.ends_with("marionette/marionette.toml"));
        }
    }
}
