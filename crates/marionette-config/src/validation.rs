// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks semantic constraints serde cannot express: the identity pair's
//! character set, a compilable dedup pattern, homeserver URLs, and Matrix
//! user id shapes. All failures are collected rather than failing fast.

use marionette_core::types::is_name_part_char;

use crate::diagnostic::ConfigError;
use crate::model::MarionetteConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &MarionetteConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    validate_name_part(&mut errors, "identity.id", &config.identity.id);
    validate_name_part(&mut errors, "identity.network", &config.identity.network);

    if let Some(tag) = &config.identity.dedup_tag
        && tag.is_empty()
    {
        errors.push(ConfigError::invalid("identity.dedup_tag", "must not be empty"));
    }
    if let Some(pattern) = &config.identity.dedup_pattern
        && let Err(e) = regex::Regex::new(pattern)
    {
        errors.push(ConfigError::invalid(
            "identity.dedup_pattern",
            format!("not a valid regular expression: {e}"),
        ));
    }

    let url = config.homeserver.url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        errors.push(ConfigError::invalid(
            "homeserver.url",
            format!("`{url}` must start with http:// or https://"),
        ));
    }
    if config.homeserver.server_name.trim().is_empty() {
        errors.push(ConfigError::invalid("homeserver.server_name", "must not be empty"));
    }
    if config.homeserver.bot_localpart.trim().is_empty() {
        errors.push(ConfigError::invalid("homeserver.bot_localpart", "must not be empty"));
    }
    if config.homeserver.request_timeout_secs == 0 {
        errors.push(ConfigError::invalid(
            "homeserver.request_timeout_secs",
            "must be greater than zero",
        ));
    }
    if let Some(token) = &config.homeserver.as_token
        && token.trim().is_empty()
    {
        errors.push(ConfigError::invalid("homeserver.as_token", "must not be empty"));
    }

    if let Some(user_id) = &config.puppet.user_id
        && !is_user_id(user_id)
    {
        errors.push(ConfigError::invalid(
            "puppet.user_id",
            format!("`{user_id}` is not a user id of the form @name:server"),
        ));
    }
    if let Some(token) = &config.puppet.access_token
        && token.trim().is_empty()
    {
        errors.push(ConfigError::invalid("puppet.access_token", "must not be empty"));
    }

    if config.bridge.event_buffer == 0 {
        errors.push(ConfigError::invalid("bridge.event_buffer", "must be greater than zero"));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::invalid("storage.database_path", "must not be empty"));
    }

    let level = config.logging.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::invalid(
            "logging.level",
            format!(
                "`{}` is not one of {}",
                config.logging.level,
                LOG_LEVELS.join(", ")
            ),
        ));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn validate_name_part(errors: &mut Vec<ConfigError>, key: &str, value: &str) {
    if value.is_empty() {
        errors.push(ConfigError::missing(key));
    } else if let Some(bad) = value.chars().find(|c| !is_name_part_char(*c)) {
        errors.push(ConfigError::invalid(
            key,
            format!("`{value}` contains `{bad}`; only a-z, 0-9, `.`, `=` and `-` are allowed"),
        ));
    }
}

fn is_user_id(value: &str) -> bool {
    value
        .strip_prefix('@')
        .and_then(|rest| rest.split_once(':'))
        .is_some_and(|(local, server)| !local.is_empty() && !server.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> MarionetteConfig {
        let mut config = MarionetteConfig::default();
        config.identity.id = "alice".into();
        config.identity.network = "facebook".into();
        config
    }

    #[test]
    fn minimal_identity_is_valid() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn missing_identity_reports_both_keys() {
        let errors = validate_config(&MarionetteConfig::default()).unwrap_err();
        let keys: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        assert!(keys.iter().any(|k| k.contains("identity.id")));
        assert!(keys.iter().any(|k| k.contains("identity.network")));
    }

    #[test]
    fn underscore_in_network_is_rejected() {
        let mut config = valid_config();
        config.identity.network = "face_book".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("identity.network"));
    }

    #[test]
    fn bad_dedup_pattern_is_rejected() {
        let mut config = valid_config();
        config.identity.dedup_pattern = Some("([".into());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn collects_multiple_errors() {
        let mut config = valid_config();
        config.homeserver.url = "localhost:8008".into();
        config.puppet.user_id = Some("alice".into());
        config.logging.level = "loud".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn user_id_shape() {
        assert!(is_user_id("@alice:example.org"));
        assert!(!is_user_id("@alice"));
        assert!(!is_user_id("alice:example.org"));
        assert!(!is_user_id("@:example.org"));
    }
}
