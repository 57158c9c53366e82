// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions at the bridge's seams.
//!
//! All traits use `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod directory;
pub mod media;
pub mod session;
pub mod store;
pub mod third_party;

pub use adapter::PluginAdapter;
pub use directory::HomeDirectory;
pub use media::{FetchedMedia, MediaFetcher};
pub use session::HomeSession;
pub use store::{RemoteUserStore, RoomRepository, StorageAdapter};
pub use third_party::ThirdPartyAdapter;
