// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Matrix client-server transport for the Marionette puppet bridge.
//!
//! [`MatrixDirectory`] implements the bot/ghost side through the
//! application-service API. [`MatrixSession`] drives the puppet's own
//! account, including the `/sync` loop that feeds the bridge.

pub mod client;
pub mod directory;
pub mod session;
pub mod sync;

pub use client::{ApiClient, ApiError};
pub use directory::MatrixDirectory;
pub use session::MatrixSession;
