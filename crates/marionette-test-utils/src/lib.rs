// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Marionette integration tests.
//!
//! Provides in-memory stand-ins for every collaborator of the bridge and a
//! harness that wires them together, so relay scenarios run without a
//! homeserver or a third-party network.
//!
//! # Components
//!
//! - [`MockDirectory`] - Room/identity directory with call capture and failure injection
//! - [`MockSession`] - Puppet session with event injection
//! - [`MockAdapter`] - Third-party adapter with message capture
//! - [`MockFetcher`] - Media fetcher serving canned bytes
//! - [`MemoryUserStore`] - Remote user cache
//! - [`TestHarness`] - A fully wired [`marionette_bridge::Bridge`]

pub mod harness;
pub mod mock_adapter;
pub mod mock_directory;
pub mod mock_fetcher;
pub mod mock_session;
pub mod mock_store;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_adapter::MockAdapter;
pub use mock_directory::MockDirectory;
pub use mock_fetcher::MockFetcher;
pub use mock_session::MockSession;
pub use mock_store::MemoryUserStore;

/// Server name used by every mock.
pub const SERVER_NAME: &str = "example.org";

/// The puppet's user id.
pub const PUPPET_USER_ID: &str = "@alice:example.org";

/// The bridge bot's user id.
pub const BOT_USER_ID: &str = "@marionettebot:example.org";
