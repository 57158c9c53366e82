// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identifier codec and deterministic name derivation.
//!
//! # Character set
//!
//! Tokens are the lowercase hexadecimal rendering of the raw identifier
//! bytes, so they only ever contain `[0-9a-f]`. That set is legal in Matrix
//! user localparts and alias localparts, survives case-folding clients, and
//! never contains the `_` separator used by the naming scheme. Uppercase
//! digits are rejected on decode so every identifier has exactly one token.
//!
//! # Naming scheme
//!
//! Ghost users and room aliases share the localpart
//! `{network}_puppet_{identityId}_{token}`; ghosts are `@localpart:server`
//! and aliases `#localpart:server`.

use marionette_core::IdentityPair;
use marionette_core::MarionetteError;
use marionette_core::types::STATUS_ROOM_ID;

/// Encodes raw identifier bytes into a token.
pub fn encode(raw: &[u8]) -> String {
    hex::encode(raw)
}

/// Decodes a token back into the raw identifier bytes.
pub fn decode(token: &str) -> Result<Vec<u8>, MarionetteError> {
    if let Some(bad) = token
        .chars()
        .find(|c| !matches!(c, '0'..='9' | 'a'..='f'))
    {
        return Err(MarionetteError::InvalidToken {
            token: token.to_string(),
            reason: format!("unexpected character `{bad}`"),
        });
    }
    hex::decode(token).map_err(|e| MarionetteError::InvalidToken {
        token: token.to_string(),
        reason: e.to_string(),
    })
}

/// Decodes a token that must hold a UTF-8 identifier.
pub fn decode_str(token: &str) -> Result<String, MarionetteError> {
    let raw = decode(token)?;
    String::from_utf8(raw).map_err(|e| MarionetteError::InvalidToken {
        token: token.to_string(),
        reason: format!("decoded identifier is not UTF-8: {e}"),
    })
}

/// Derives ghost ids and room aliases for one identity pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierCodec {
    prefix: String,
    server_name: String,
}

impl IdentifierCodec {
    pub fn new(identity: &IdentityPair, server_name: impl Into<String>) -> Self {
        Self {
            prefix: format!("{}_puppet_{}_", identity.network(), identity.id()),
            server_name: server_name.into(),
        }
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Localpart of the ghost representing a third-party user.
    pub fn ghost_local_part(&self, third_party_user_id: &str) -> String {
        self.local_part(third_party_user_id)
    }

    /// Localpart of the alias of the room bridging a third-party room.
    pub fn room_local_part(&self, third_party_room_id: &str) -> String {
        self.local_part(third_party_room_id)
    }

    /// Full user id of the ghost representing a third-party user.
    pub fn ghost_user_id(&self, third_party_user_id: &str) -> String {
        format!(
            "@{}:{}",
            self.ghost_local_part(third_party_user_id),
            self.server_name
        )
    }

    /// Full alias of the room bridging a third-party room.
    pub fn room_alias(&self, third_party_room_id: &str) -> String {
        format!(
            "#{}:{}",
            self.room_local_part(third_party_room_id),
            self.server_name
        )
    }

    /// Alias of this identity's status room.
    pub fn status_room_alias(&self) -> String {
        self.room_alias(STATUS_ROOM_ID)
    }

    /// Extracts the third-party id embedded in a localpart.
    ///
    /// `Ok(None)` means the localpart belongs to some other identity or
    /// naming scheme; an error means it carries this identity's prefix but
    /// a malformed token.
    pub fn parse_local_part(&self, local_part: &str) -> Result<Option<String>, MarionetteError> {
        match local_part.strip_prefix(&self.prefix) {
            Some(token) => decode_str(token).map(Some),
            None => Ok(None),
        }
    }

    /// Extracts the third-party room id from a full room alias on this server.
    pub fn parse_room_alias(&self, alias: &str) -> Result<Option<String>, MarionetteError> {
        self.parse_qualified('#', alias)
    }

    /// Extracts the third-party user id from a full ghost user id on this server.
    pub fn parse_ghost_user_id(&self, user_id: &str) -> Result<Option<String>, MarionetteError> {
        self.parse_qualified('@', user_id)
    }

    /// Returns `true` if `user_id` is one of this identity's ghosts.
    pub fn is_ghost(&self, user_id: &str) -> bool {
        matches!(self.parse_ghost_user_id(user_id), Ok(Some(_)))
    }

    fn local_part(&self, third_party_id: &str) -> String {
        format!("{}{}", self.prefix, encode(third_party_id.as_bytes()))
    }

    fn parse_qualified(&self, sigil: char, id: &str) -> Result<Option<String>, MarionetteError> {
        let Some(rest) = id.strip_prefix(sigil) else {
            return Ok(None);
        };
        let Some((local_part, server)) = rest.split_once(':') else {
            return Ok(None);
        };
        if server != self.server_name {
            return Ok(None);
        }
        self.parse_local_part(local_part)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn codec() -> IdentifierCodec {
        let identity = IdentityPair::new("alice", "facebook").unwrap();
        IdentifierCodec::new(&identity, "example.org")
    }

    #[test]
    fn derives_fixed_pattern() {
        let codec = codec();
        assert_eq!(
            codec.room_local_part("room1"),
            "facebook_puppet_alice_726f6f6d31"
        );
        assert_eq!(
            codec.room_alias("room1"),
            "#facebook_puppet_alice_726f6f6d31:example.org"
        );
        assert_eq!(
            codec.ghost_user_id("bob"),
            "@facebook_puppet_alice_626f62:example.org"
        );
    }

    #[test]
    fn status_room_alias_uses_reserved_id() {
        let codec = codec();
        assert_eq!(codec.status_room_alias(), codec.room_alias("status_room"));
    }

    #[test]
    fn parses_own_alias_back() {
        let codec = codec();
        let alias = codec.room_alias("thread:42/x y");
        assert_eq!(
            codec.parse_room_alias(&alias).unwrap(),
            Some("thread:42/x y".to_string())
        );
    }

    #[test]
    fn ignores_foreign_aliases() {
        let codec = codec();
        assert_eq!(codec.parse_room_alias("#general:example.org").unwrap(), None);
        assert_eq!(
            codec
                .parse_room_alias("#facebook_puppet_alice_626f62:other.org")
                .unwrap(),
            None
        );
        assert_eq!(
            codec
                .parse_room_alias("#facebook_puppet_carol_626f62:example.org")
                .unwrap(),
            None
        );
        assert_eq!(codec.parse_room_alias("!room:example.org").unwrap(), None);
    }

    #[test]
    fn malformed_token_is_invalid() {
        let codec = codec();
        let err = codec
            .parse_room_alias("#facebook_puppet_alice_zz:example.org")
            .unwrap_err();
        assert!(matches!(err, MarionetteError::InvalidToken { .. }));

        assert!(decode("abc").is_err(), "odd length");
        assert!(decode("AB").is_err(), "uppercase");
        assert!(decode("").unwrap().is_empty());
    }

    #[test]
    fn recognises_ghosts() {
        let codec = codec();
        assert!(codec.is_ghost(&codec.ghost_user_id("bob")));
        assert!(!codec.is_ghost("@alice:example.org"));
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(raw in proptest::collection::vec(any::<u8>(), 0..64)) {
            prop_assert_eq!(decode(&encode(&raw)).unwrap(), raw);
        }

        #[test]
        fn tokens_use_only_localpart_safe_characters(raw in proptest::collection::vec(any::<u8>(), 0..64)) {
            let token = encode(&raw);
            prop_assert!(token.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        }

        #[test]
        fn room_local_part_is_injective(
            network_a in "[a-z0-9.=-]{1,8}",
            network_b in "[a-z0-9.=-]{1,8}",
            id_a in "[a-z0-9.=-]{1,8}",
            id_b in "[a-z0-9.=-]{1,8}",
            room_a in ".{0,16}",
            room_b in ".{0,16}",
        ) {
            let codec_a = IdentifierCodec::new(&IdentityPair::new(id_a.clone(), network_a.clone()).unwrap(), "s");
            let codec_b = IdentifierCodec::new(&IdentityPair::new(id_b.clone(), network_b.clone()).unwrap(), "s");
            let same_input = network_a == network_b && id_a == id_b && room_a == room_b;
            let same_output = codec_a.room_local_part(&room_a) == codec_b.room_local_part(&room_b);
            prop_assert_eq!(same_input, same_output);
        }

        #[test]
        fn room_local_part_is_deterministic(room in ".{0,32}") {
            let codec = codec();
            prop_assert_eq!(codec.room_local_part(&room), codec.room_local_part(&room));
            prop_assert_eq!(codec.parse_local_part(&codec.room_local_part(&room)).unwrap(), Some(room));
        }
    }
}
