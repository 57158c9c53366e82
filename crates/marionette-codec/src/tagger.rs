// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Loop-prevention marker for bridge-authored text.
//!
//! Every body the bridge sends carries a trailing marker. The home network
//! echoes the puppet's own sends back through the sync stream, and the
//! outbound relay drops anything that still carries the marker.

use marionette_core::{IdentityPair, MarionetteError};
use regex::Regex;

/// Default marker: a space followed by a zero-width no-break space.
pub const DEFAULT_TAG: &str = " \u{feff}";

/// Appends and detects the deduplication marker.
#[derive(Debug, Clone)]
pub struct Tagger {
    tag: String,
    pattern: Regex,
}

impl Tagger {
    /// Builds a tagger from optional overrides.
    ///
    /// Without a pattern override the pattern is the escaped marker anchored
    /// at the end of the text.
    pub fn new(tag: Option<&str>, pattern: Option<&str>) -> Result<Self, MarionetteError> {
        let tag = tag.unwrap_or(DEFAULT_TAG).to_string();
        if tag.is_empty() {
            return Err(MarionetteError::Config(
                "deduplication tag must not be empty".into(),
            ));
        }
        let pattern = match pattern {
            Some(p) => p.to_string(),
            None => format!("{}$", regex::escape(&tag)),
        };
        let pattern = Regex::new(&pattern).map_err(|e| {
            MarionetteError::Config(format!("invalid deduplication pattern `{pattern}`: {e}"))
        })?;
        Ok(Self { tag, pattern })
    }

    /// Builds the tagger configured for an identity pair.
    pub fn for_identity(identity: &IdentityPair) -> Result<Self, MarionetteError> {
        Self::new(identity.dedup_tag(), identity.dedup_pattern())
    }

    pub fn marker(&self) -> &str {
        &self.tag
    }

    /// Appends the marker.
    pub fn tag(&self, text: &str) -> String {
        format!("{text}{}", self.tag)
    }

    /// Returns `true` if the text carries the marker.
    pub fn is_tagged(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}
