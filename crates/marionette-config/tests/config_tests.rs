// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Marionette configuration system.

use marionette_config::diagnostic::ConfigError;
use marionette_config::model::MarionetteConfig;
use marionette_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};

const MINIMAL: &str = r#"
[identity]
id = "alice"
network = "facebook"
"#;

/// A file using every section deserializes into the expected values.
#[test]
fn full_toml_deserializes() {
    let toml = r#"
[identity]
id = "alice"
network = "facebook"
dedup_tag = " ~"
dedup_pattern = " ~$"

[homeserver]
url = "https://matrix.example.org"
server_name = "example.org"
as_token = "as-secret"
bot_localpart = "fbbot"
request_timeout_secs = 10

[puppet]
user_id = "@alice:example.org"
access_token = "syt_abc"

[bridge]
max_room_repairs = 4
status_notices = false
event_buffer = 32

[storage]
database_path = "/tmp/marionette-test.db"
wal_mode = false

[logging]
level = "debug"
"#;

    let config = load_and_validate_str(toml).expect("valid TOML should validate");
    assert_eq!(config.identity.id, "alice");
    assert_eq!(config.identity.dedup_tag.as_deref(), Some(" ~"));
    assert_eq!(config.homeserver.server_name, "example.org");
    assert_eq!(config.homeserver.as_token.as_deref(), Some("as-secret"));
    assert_eq!(config.homeserver.bot_user_id(), "@fbbot:example.org");
    assert_eq!(config.puppet.user_id.as_deref(), Some("@alice:example.org"));
    assert_eq!(config.bridge.max_room_repairs, 4);
    assert!(!config.bridge.status_notices);
    assert_eq!(config.bridge.event_buffer, 32);
    assert!(!config.storage.wal_mode);
    assert_eq!(config.logging.level, "debug");

    let pair = config.identity.to_identity_pair().unwrap();
    assert_eq!(pair.dedup_pattern(), Some(" ~$"));
}

#[test]
fn missing_sections_use_defaults() {
    let config = load_and_validate_str(MINIMAL).expect("minimal config should validate");
    assert_eq!(config.homeserver.url, "http://localhost:8008");
    assert_eq!(config.homeserver.bot_localpart, "marionettebot");
    assert!(config.homeserver.as_token.is_none());
    assert!(config.puppet.access_token.is_none());
    assert_eq!(config.bridge.max_room_repairs, 2);
    assert!(config.storage.wal_mode);
}

#[test]
fn unknown_field_in_bridge_suggests_correction() {
    let toml = format!("{MINIMAL}\n[bridge]\nmax_room_repair = 3\n");
    let errors = load_and_validate_str(&toml).expect_err("unknown key should fail");

    let found = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, valid_keys, .. } if {
            key == "max_room_repair"
                && suggestion.as_deref() == Some("max_room_repairs")
                && valid_keys.contains("status_notices")
        })
    });
    assert!(found, "expected UnknownKey with suggestion, got: {errors:?}");
}

#[test]
fn deny_unknown_fields_at_top_level() {
    let toml = format!("{MINIMAL}\n[telegram]\nbot_token = \"x\"\n");
    let err = load_config_from_str(&toml).expect_err("unknown section should fail");
    assert!(err.to_string().contains("telegram"));
}

#[test]
fn invalid_type_is_reported() {
    let toml = format!("{MINIMAL}\n[bridge]\nmax_room_repairs = \"many\"\n");
    let errors = load_and_validate_str(&toml).expect_err("wrong type should fail");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { key, .. } if key.contains("max_room_repairs"))),
        "got: {errors:?}"
    );
}

/// `MARIONETTE_HOMESERVER_AS_TOKEN` lands on `homeserver.as_token`, not
/// `homeserver.as.token`.
#[test]
fn env_style_keys_keep_underscores() {
    use figment::{
        Figment,
        providers::{Format, Serialized, Toml},
    };

    let key = marionette_config::loader::env_key("homeserver_as_token");
    let config: MarionetteConfig = Figment::new()
        .merge(Serialized::defaults(MarionetteConfig::default()))
        .merge(Toml::string(MINIMAL))
        .merge((key.as_str(), "from-env"))
        .extract()
        .expect("should merge env override");

    assert_eq!(config.homeserver.as_token.as_deref(), Some("from-env"));
}

#[test]
fn missing_config_files_silently_skipped() {
    use figment::{
        Figment,
        providers::{Format, Serialized, Toml},
    };

    let config: MarionetteConfig = Figment::new()
        .merge(Serialized::defaults(MarionetteConfig::default()))
        .merge(Toml::file("/nonexistent/path/marionette.toml"))
        .extract()
        .expect("missing file should be skipped");
    assert_eq!(config.logging.level, "info");
}

#[test]
fn identity_is_required() {
    let errors = load_and_validate_str("").expect_err("empty config has no identity");
    assert!(errors.iter().any(
        |e| matches!(e, ConfigError::MissingKey { key, .. } if key == "identity.id")
    ));
}

#[test]
fn identity_charset_is_enforced() {
    let toml = r#"
[identity]
id = "Alice_1"
network = "facebook"
"#;
    let errors = load_and_validate_str(toml).expect_err("underscore must be rejected");
    assert!(errors.iter().any(
        |e| matches!(e, ConfigError::Validation { key, .. } if key == "identity.id")
    ));
}

#[test]
fn loads_from_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("marionette.toml");
    std::fs::write(&path, format!("{MINIMAL}\n[logging]\nlevel = \"warn\"\n")).unwrap();

    let config = load_and_validate_path(&path).expect("file config should validate");
    assert_eq!(config.logging.level, "warn");
}

#[test]
fn unknown_key_in_file_carries_source_span() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("marionette.toml");
    std::fs::write(&path, format!("{MINIMAL}\n[puppet]\nacess_token = \"t\"\n")).unwrap();

    let errors = load_and_validate_path(&path).expect_err("typo should fail");
    let spanned = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, span: Some(_), src: Some(_), .. } if key == "acess_token")
    });
    assert!(spanned, "got: {errors:?}");
}

#[test]
fn config_error_renders_with_miette() {
    use miette::{Diagnostic, GraphicalReportHandler};

    let error = ConfigError::UnknownKey {
        key: "acess_token".to_string(),
        suggestion: Some("access_token".to_string()),
        valid_keys: "user_id, access_token".to_string(),
        span: None,
        src: None,
    };
    assert!(error.code().is_some());
    let help = error.help().map(|h| h.to_string()).unwrap_or_default();
    assert!(help.contains("did you mean `access_token`"), "got: {help}");

    let mut buf = String::new();
    GraphicalReportHandler::new()
        .render_report(&mut buf, &error)
        .expect("should render");
    assert!(buf.contains("acess_token"));
}
