// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pure transforms shared by both relay directions.
//!
//! - [`ident`]: reversible encoding of third-party identifiers into
//!   home-network-legal name fragments, and the alias/ghost naming scheme.
//! - [`tagger`]: the deduplication marker that keeps the bridge from
//!   relaying its own messages back out.

pub mod ident;
pub mod tagger;

pub use ident::{IdentifierCodec, decode, encode};
pub use tagger::{DEFAULT_TAG, Tagger};
