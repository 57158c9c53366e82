// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The puppet's [`HomeSession`]: its own access token and a `/sync`
//! long-poll loop.

use std::time::Duration;

use async_trait::async_trait;
use marionette_config::model::{HomeserverConfig, PuppetConfig};
use marionette_core::events::{HomeEvent, RoomMessageContent};
use marionette_core::types::{AdapterType, HealthStatus};
use marionette_core::{HomeSession, MarionetteError, PluginAdapter};
use reqwest::Url;
use serde::Deserialize;
use serde::de::IgnoredAny;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{ApiClient, ApiError, txn_id};
use crate::sync::SyncResponse;

/// Server-side wait of each long-poll.
const POLL_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause after a failed sync before polling again.
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Timeline events fetched per room on the first sync.
const INITIAL_TIMELINE_LIMIT: u32 = 1;

#[derive(Debug, Deserialize)]
struct RoomIdResponse {
    room_id: String,
}

#[derive(Debug, Deserialize)]
struct EventIdResponse {
    event_id: String,
}

pub struct MatrixSession {
    api: ApiClient,
    user_id: String,
    buffer: usize,
    request_timeout: Duration,
    cancel: CancellationToken,
}

impl MatrixSession {
    pub fn new(
        homeserver: &HomeserverConfig,
        puppet: &PuppetConfig,
        buffer: usize,
    ) -> Result<Self, MarionetteError> {
        let user_id = puppet
            .user_id
            .clone()
            .ok_or_else(|| MarionetteError::Config("puppet.user_id is required".into()))?;
        let token = puppet
            .access_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                MarionetteError::Config(
                    "puppet.access_token is required (or set MARIONETTE_PUPPET_ACCESS_TOKEN)"
                        .into(),
                )
            })?;
        let request_timeout = Duration::from_secs(homeserver.request_timeout_secs);

        Ok(Self {
            api: ApiClient::new(&homeserver.url, token, request_timeout)?,
            user_id,
            buffer: buffer.max(1),
            request_timeout,
            cancel: CancellationToken::new(),
        })
    }

    /// A client authenticated as the puppet, for member-only directory reads.
    pub fn member_client(&self) -> ApiClient {
        self.api.clone()
    }
}

/// Runs one `/sync` request.
async fn sync_once(
    api: &ApiClient,
    since: Option<&str>,
    poll: Duration,
    request_timeout: Duration,
    filter: Option<&str>,
) -> Result<SyncResponse, ApiError> {
    let mut url: Url = api.client_url(&["sync"]);
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("timeout", &poll.as_millis().to_string());
        if let Some(since) = since {
            query.append_pair("since", since);
        }
        if let Some(filter) = filter {
            query.append_pair("filter", filter);
        }
    }
    // The long-poll may legitimately hold the request for `poll`.
    api.send(api.http().get(url).timeout(poll + request_timeout))
        .await
}

async fn sync_loop(
    api: ApiClient,
    mut since: String,
    request_timeout: Duration,
    events: mpsc::Sender<HomeEvent>,
    cancel: CancellationToken,
) {
    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = sync_once(&api, Some(&since), POLL_TIMEOUT, request_timeout, None) => result,
        };

        match result {
            Ok(batch) => {
                since = batch.next_batch.clone();
                for event in batch.into_events() {
                    if events.send(event).await.is_err() {
                        debug!("event receiver dropped, stopping sync");
                        return;
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "sync failed, retrying");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(RETRY_DELAY) => {}
                }
            }
        }
    }
    info!("sync loop stopped");
}

#[async_trait]
impl PluginAdapter for MatrixSession {
    fn name(&self) -> &str {
        "matrix-session"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Session
    }

    async fn health_check(&self) -> Result<HealthStatus, MarionetteError> {
        if self.cancel.is_cancelled() {
            return Ok(HealthStatus::Unhealthy("session shut down".into()));
        }
        let url = self.api.client_url(&["account", "whoami"]);
        match self.api.send::<IgnoredAny>(self.api.http().get(url)).await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Degraded(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), MarionetteError> {
        self.cancel.cancel();
        Ok(())
    }
}

#[async_trait]
impl HomeSession for MatrixSession {
    fn user_id(&self) -> &str {
        &self.user_id
    }

    async fn start(&self) -> Result<mpsc::Receiver<HomeEvent>, MarionetteError> {
        let filter = json!({
            "room": { "timeline": { "limit": INITIAL_TIMELINE_LIMIT } }
        })
        .to_string();
        let initial = sync_once(
            &self.api,
            None,
            Duration::ZERO,
            self.request_timeout,
            Some(&filter),
        )
        .await
        .map_err(ApiError::into_session)?;

        let since = initial.next_batch.clone();
        let initial_events = initial.into_initial_events();
        info!(
            user_id = %self.user_id,
            events = initial_events.len(),
            "initial sync complete"
        );

        let (tx, rx) = mpsc::channel(self.buffer.max(initial_events.len()));
        for event in initial_events {
            // Capacity covers the whole initial batch.
            tx.try_send(event)
                .map_err(|e| MarionetteError::Internal(format!("initial event dropped: {e}")))?;
        }

        tokio::spawn(sync_loop(
            self.api.clone(),
            since,
            self.request_timeout,
            tx,
            self.cancel.clone(),
        ));
        Ok(rx)
    }

    async fn join_room(&self, room: &str) -> Result<String, MarionetteError> {
        let url = self.api.client_url(&["join", room]);
        let response: RoomIdResponse = self
            .api
            .send(self.api.http().post(url).json(&json!({})))
            .await
            .map_err(|e| e.into_join_error(room, ApiError::into_session))?;
        Ok(response.room_id)
    }

    async fn send_message(
        &self,
        room_id: &str,
        content: &RoomMessageContent,
    ) -> Result<String, MarionetteError> {
        let txn = txn_id();
        let url = self
            .api
            .client_url(&["rooms", room_id, "send", "m.room.message", &txn]);
        let response: EventIdResponse = self
            .api
            .send(self.api.http().put(url).json(content))
            .await
            .map_err(ApiError::into_session)?;
        Ok(response.event_id)
    }

    async fn send_read_receipt(
        &self,
        room_id: &str,
        event_id: &str,
    ) -> Result<(), MarionetteError> {
        let url = self
            .api
            .client_url(&["rooms", room_id, "receipt", "m.read", event_id]);
        self.api
            .send::<IgnoredAny>(self.api.http().post(url).json(&json!({})))
            .await
            .map_err(ApiError::into_session)?;
        Ok(())
    }
}
