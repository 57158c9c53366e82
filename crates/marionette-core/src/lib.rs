// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Marionette puppet bridge.
//!
//! This crate provides the trait definitions at the bridge's seams (third-party
//! adapter, home directory, puppet session, storage), the shared error type,
//! and the message and event types that flow between them.

pub mod error;
pub mod events;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::MarionetteError;
pub use types::{AdapterType, HealthStatus, IdentityPair};

// Re-export all traits at crate root.
pub use traits::{
    FetchedMedia, HomeDirectory, HomeSession, MediaFetcher, PluginAdapter, RemoteUserStore,
    RoomRepository, StorageAdapter, ThirdPartyAdapter,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_predicates() {
        let unjoinable = MarionetteError::UnjoinableRoom {
            room_id: "!a:x".into(),
            message: "no known servers".into(),
        };
        assert!(unjoinable.is_unjoinable());
        assert!(!unjoinable.is_not_found());

        let missing = MarionetteError::NotFound {
            what: "#alias:x".into(),
        };
        assert!(missing.is_not_found());
    }

    #[test]
    fn error_messages_name_the_subject() {
        let err = MarionetteError::UnmappedRoom {
            room_id: "!abc:example.org".into(),
        };
        assert!(err.to_string().contains("!abc:example.org"));

        let err = MarionetteError::RepairExhausted {
            alias: "#x:y".into(),
            attempts: 3,
        };
        assert!(err.to_string().contains("3 attempt"));
    }

    #[test]
    fn all_traits_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_third_party<T: ThirdPartyAdapter>() {}
        fn _assert_directory<T: HomeDirectory>() {}
        fn _assert_session<T: HomeSession>() {}
        fn _assert_storage<T: StorageAdapter>() {}
        fn _assert_user_store<T: RemoteUserStore>() {}
        fn _assert_room_repo<T: RoomRepository>() {}
        fn _assert_fetcher<T: MediaFetcher>() {}
    }
}
