// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for the Marionette puppet bridge.
//!
//! Holds the remote user profile cache: one row per third-party user the
//! bridge has seen, written on first contact and never overwritten. All
//! access goes through a single `tokio-rusqlite` background connection.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteUserStore;
pub use database::Database;
