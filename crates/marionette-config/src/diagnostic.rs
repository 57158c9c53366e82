// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment-to-miette error bridge with fuzzy match suggestions.
//!
//! Deserialization failures become miette diagnostics carrying source spans,
//! the list of valid keys, and a Jaro-Winkler "did you mean?" hint.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Minimum Jaro-Winkler similarity score to suggest a correction.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A configuration error with rich diagnostic information.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// An unknown key was found in the configuration.
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(marionette::config::unknown_key),
        help("{}", format_unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        /// Suggested correction via fuzzy matching, if any.
        suggestion: Option<String>,
        /// Comma-separated valid keys for the section.
        valid_keys: String,
        #[label("this key is not recognized")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A configuration value has the wrong type.
    #[error("invalid type for key `{key}`: {detail}")]
    #[diagnostic(code(marionette::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
        #[label("wrong type here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A required configuration key is missing.
    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(marionette::config::missing_key),
        help("add `{key} = <value>` to marionette.toml or set {env_var}")
    )]
    MissingKey {
        key: String,
        /// Environment variable that can supply the key instead.
        env_var: String,
    },

    /// A value parsed but is not acceptable.
    #[error("invalid value for `{key}`: {message}")]
    #[diagnostic(code(marionette::config::validation))]
    Validation { key: String, message: String },

    /// Catch-all for other configuration errors.
    #[error("configuration error: {0}")]
    #[diagnostic(code(marionette::config::other))]
    Other(String),
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            key: key.to_string(),
            message: message.into(),
        }
    }

    /// A missing dotted key, e.g. `identity.id`.
    pub fn missing(key: &str) -> Self {
        Self::MissingKey {
            key: key.to_string(),
            env_var: format!("MARIONETTE_{}", key.replace('.', "_").to_uppercase()),
        }
    }
}

fn format_unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

/// Where a failing key sits in one of the loaded TOML files.
struct Located {
    span: Option<SourceSpan>,
    src: Option<NamedSource<String>>,
}

impl Located {
    const NOWHERE: Self = Self {
        span: None,
        src: None,
    };

    /// Resolves `field` under `section` in the file the error came from.
    fn find(
        error: &figment::error::Error,
        section: &[String],
        field: &str,
        toml_sources: &[(String, String)],
    ) -> Self {
        let Some(origin) = error
            .metadata
            .as_ref()
            .and_then(|m| m.source.as_ref())
            .and_then(|s| match s {
                figment::Source::File(path) => Some(path.display().to_string()),
                _ => None,
            })
        else {
            return Self::NOWHERE;
        };

        toml_sources
            .iter()
            .find(|(path, _)| *path == origin)
            .and_then(|(path, content)| {
                let offset = find_key_offset(content, section, field)?;
                Some(Self {
                    span: Some(SourceSpan::new(offset.into(), field.len())),
                    src: Some(NamedSource::new(path, content.clone())),
                })
            })
            .unwrap_or(Self::NOWHERE)
    }
}

/// Convert a `figment::Error` into a list of `ConfigError` diagnostics.
///
/// A single figment error may carry several failures; each one is converted.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| match &error.kind {
            Kind::UnknownField(field, expected) => {
                let suggestion = suggest_key(field, expected);
                let at = Located::find(&error, &error.path, field, toml_sources);
                ConfigError::UnknownKey {
                    key: field.clone(),
                    suggestion,
                    valid_keys: expected.join(", "),
                    span: at.span,
                    src: at.src,
                }
            }
            Kind::MissingField(field) => {
                let mut key = error.path.clone();
                key.push(field.to_string());
                ConfigError::missing(&key.join("."))
            }
            Kind::InvalidType(actual, expected) => {
                let at = match error.path.split_last() {
                    Some((field, section)) => Located::find(&error, section, field, toml_sources),
                    None => Located::NOWHERE,
                };
                ConfigError::InvalidType {
                    key: error.path.join("."),
                    detail: format!("found {actual}, expected {expected}"),
                    expected: expected.to_string(),
                    span: at.span,
                    src: at.src,
                }
            }
            _ => ConfigError::Other(error.to_string()),
        })
        .collect()
}

/// Find the byte offset of a key in TOML content, relative to a section path.
///
/// For `path = ["bridge"]` and `field = "max_repairs"`, finds the `[bridge]`
/// header and then the first line starting with `max_repairs`. Top-level
/// fields are searched from the start of the file.
pub fn find_key_offset(content: &str, path: &[String], field: &str) -> Option<usize> {
    let search_start = match path.first() {
        None => 0,
        Some(section) => {
            let header = format!("[{section}]");
            content.find(&header).map(|pos| pos + header.len())?
        }
    };

    let mut byte_offset = 0;
    for line in content[search_start..].lines() {
        let trimmed = line.trim_start();
        if let Some(after) = trimmed.strip_prefix(field)
            && (after.starts_with(' ') || after.starts_with('=') || after.starts_with('\t'))
        {
            let field_start_in_line = line.len() - trimmed.len();
            return Some(search_start + byte_offset + field_start_in_line);
        }
        byte_offset += line.len() + 1;
    }

    None
}

/// Suggest a similar key name using Jaro-Winkler string similarity.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|&key| (key, strsim::jaro_winkler(unknown, key)))
        .filter(|(_, score)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(key, _)| key.to_string())
}

/// Render a list of `ConfigError`s to stderr using miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let noun = if errors.len() == 1 { "error" } else { "errors" };
    eprintln!("marionette: {} configuration {noun}", errors.len());

    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        let diagnostic: &dyn Diagnostic = error;
        if handler.render_report(&mut buf, diagnostic).is_ok() {
            eprint!("{buf}");
        } else {
            eprintln!("Error: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_close_bridge_key() {
        let valid = &["max_room_repairs", "status_notices", "event_buffer"];
        assert_eq!(
            suggest_key("max_room_repair", valid),
            Some("max_room_repairs".to_string())
        );
    }

    #[test]
    fn suggests_as_token() {
        let valid = &["url", "server_name", "as_token", "bot_localpart"];
        assert_eq!(suggest_key("as_tokn", valid), Some("as_token".to_string()));
    }

    #[test]
    fn no_suggestion_for_distant_typo() {
        let valid = &["id", "network", "dedup_tag"];
        assert_eq!(suggest_key("zzzzzz", valid), None);
    }

    #[test]
    fn find_key_offset_in_section() {
        let content = "[identity]\nid = \"a\"\n\n[bridge]\nmax_repairs = 3\n";
        let path = vec!["bridge".to_string()];
        let o = find_key_offset(content, &path, "max_repairs").unwrap();
        assert_eq!(&content[o..o + 11], "max_repairs");
    }

    #[test]
    fn missing_key_names_its_env_var() {
        let error = ConfigError::missing("puppet.access_token");
        assert!(matches!(
            &error,
            ConfigError::MissingKey { env_var, .. } if env_var == "MARIONETTE_PUPPET_ACCESS_TOKEN"
        ));
        let help = error.help().map(|h| h.to_string()).unwrap_or_default();
        assert!(help.contains("MARIONETTE_PUPPET_ACCESS_TOKEN"));
    }

    #[test]
    fn find_key_offset_missing_section() {
        let path = vec!["puppet".to_string()];
        assert_eq!(find_key_offset("[bridge]\nx = 1\n", &path, "x"), None);
    }
}
