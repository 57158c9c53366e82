// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runtime for the Marionette puppet bridge.
//!
//! A third-party network integration is a small binary that builds its
//! [`ThirdPartyAdapter`](marionette_core::ThirdPartyAdapter) and hands it to
//! [`serve::run_or_exit`]:
//!
//! ```no_run
//! # use std::sync::Arc;
//! # async fn example(adapter: Arc<dyn marionette_core::ThirdPartyAdapter>) {
//! marionette::serve::run_or_exit(adapter).await;
//! # }
//! ```
//!
//! The `marionette` binary itself only validates and diagnoses a deployment.

pub mod doctor;
pub mod serve;

pub use serve::{run, run_bridge, run_or_exit, serve};
