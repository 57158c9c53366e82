// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ghost provisioning and profile propagation.
//!
//! Every operation here is idempotent. Registration happens once per
//! process, display names are pushed only when they change, and avatars are
//! never overwritten once a ghost has one.

use std::path::Path;
use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use marionette_codec::IdentifierCodec;
use marionette_core::types::{Actor, GhostSender, MediaSource, RemoteUserRecord};
use marionette_core::{
    FetchedMedia, HomeDirectory, MarionetteError, MediaFetcher, RemoteUserStore, ThirdPartyAdapter,
};
use tracing::{debug, info, warn};

use crate::lock::KeyedLocks;
use crate::media::resolve_mimetype;

/// Keeps ghost accounts and room avatars in sync with third-party profiles.
pub struct ProfileSync {
    directory: Arc<dyn HomeDirectory>,
    adapter: Arc<dyn ThirdPartyAdapter>,
    users: Arc<dyn RemoteUserStore>,
    fetcher: Arc<dyn MediaFetcher>,
    codec: IdentifierCodec,
    registered: DashSet<String>,
    pushed_names: DashMap<String, String>,
    locks: KeyedLocks,
}

impl ProfileSync {
    pub fn new(
        directory: Arc<dyn HomeDirectory>,
        adapter: Arc<dyn ThirdPartyAdapter>,
        users: Arc<dyn RemoteUserStore>,
        fetcher: Arc<dyn MediaFetcher>,
        codec: IdentifierCodec,
    ) -> Self {
        Self {
            directory,
            adapter,
            users,
            fetcher,
            codec,
            registered: DashSet::new(),
            pushed_names: DashMap::new(),
            locks: KeyedLocks::new(),
        }
    }

    /// Registers the sender's ghost and brings its profile up to date.
    ///
    /// Serialized per ghost id. Returns the ghost's user id.
    pub async fn provision(&self, sender: &GhostSender) -> Result<String, MarionetteError> {
        let ghost_id = self.codec.ghost_user_id(&sender.sender_id);
        let _guard = self.locks.lock(&ghost_id).await;

        self.ensure_registered(&ghost_id).await?;
        let record = self.remote_user(&sender.sender_id).await?;

        let name = sender.sender_name.as_deref().or(record.name.as_deref());
        self.ensure_display_name(&ghost_id, name).await?;

        let avatar = sender
            .avatar_url
            .clone()
            .or(record.avatar_url)
            .map(MediaSource::Url);
        self.ensure_avatar(&ghost_id, avatar.as_ref()).await?;

        Ok(ghost_id)
    }

    /// Registers a ghost with the homeserver once per process.
    pub async fn ensure_registered(&self, ghost_id: &str) -> Result<(), MarionetteError> {
        if self.registered.contains(ghost_id) {
            return Ok(());
        }
        self.directory.register_user(ghost_id).await?;
        self.registered.insert(ghost_id.to_string());
        debug!(ghost_id = %ghost_id, "ghost registered");
        Ok(())
    }

    /// Cached profile of a third-party user, fetched and stored on first contact.
    pub async fn remote_user(&self, user_id: &str) -> Result<RemoteUserRecord, MarionetteError> {
        let key = marionette_codec::encode(user_id.as_bytes());
        if let Some(record) = self.users.get(&key).await? {
            return Ok(record);
        }
        let record = RemoteUserRecord::from(self.adapter.get_user_data(user_id).await?);
        self.users.put(&key, &record).await?;
        debug!(user_id = %user_id, "cached remote user profile");
        Ok(record)
    }

    /// Pushes `name` as the ghost's display name unless it was already pushed.
    ///
    /// Returns `true` when the directory was updated.
    pub async fn ensure_display_name(
        &self,
        ghost_id: &str,
        name: Option<&str>,
    ) -> Result<bool, MarionetteError> {
        let Some(name) = name.filter(|n| !n.is_empty()) else {
            return Ok(false);
        };
        if self
            .pushed_names
            .get(ghost_id)
            .is_some_and(|pushed| pushed.value() == name)
        {
            return Ok(false);
        }
        self.directory.set_display_name(ghost_id, name).await?;
        self.pushed_names
            .insert(ghost_id.to_string(), name.to_string());
        info!(ghost_id = %ghost_id, name = %name, "updated ghost display name");
        Ok(true)
    }

    /// Gives the ghost an avatar if it has none.
    ///
    /// An existing avatar is never replaced. Fetch and upload failures are
    /// logged and reported as `Ok(false)`.
    pub async fn ensure_avatar(
        &self,
        ghost_id: &str,
        source: Option<&MediaSource>,
    ) -> Result<bool, MarionetteError> {
        let Some(source) = source else {
            return Ok(false);
        };
        if self
            .directory
            .avatar_url(ghost_id)
            .await?
            .is_some_and(|url| !url.is_empty())
        {
            debug!(ghost_id = %ghost_id, "ghost already has an avatar");
            return Ok(false);
        }

        let actor = Actor::User(ghost_id.to_string());
        let content_uri = match self.upload_source(&actor, source, None).await {
            Ok(uri) => uri,
            Err(e) => {
                warn!(ghost_id = %ghost_id, source = %source.describe(), error = %e, "avatar upload failed");
                return Ok(false);
            }
        };
        self.directory.set_avatar_url(ghost_id, &content_uri).await?;
        info!(ghost_id = %ghost_id, content_uri = %content_uri, "set ghost avatar");
        Ok(true)
    }

    /// Fetches an image from `url` and makes it the room's avatar.
    pub async fn ensure_room_avatar(&self, room_id: &str, url: &str) -> Result<(), MarionetteError> {
        self.assign_room_avatar(room_id, &MediaSource::Url(url.to_string()))
            .await
    }

    /// Reads an image from disk and makes it the room's avatar.
    pub async fn ensure_room_avatar_from_local(
        &self,
        room_id: &str,
        path: &Path,
    ) -> Result<(), MarionetteError> {
        self.assign_room_avatar(room_id, &MediaSource::Path(path.to_path_buf()))
            .await
    }

    async fn assign_room_avatar(
        &self,
        room_id: &str,
        source: &MediaSource,
    ) -> Result<(), MarionetteError> {
        let content_uri = self.upload_source(&Actor::Bot, source, None).await?;
        self.directory.set_room_avatar(room_id, &content_uri).await?;
        info!(room_id = %room_id, content_uri = %content_uri, "set room avatar");
        Ok(())
    }

    /// Resolves media bytes from any source.
    pub async fn resolve_source(&self, source: &MediaSource) -> Result<FetchedMedia, MarionetteError> {
        match source {
            MediaSource::Url(url) => self.fetcher.fetch_url(url).await,
            MediaSource::Path(path) => self.fetcher.read_path(path).await,
            MediaSource::Bytes(bytes) => Ok(FetchedMedia {
                data: bytes.clone(),
                content_type: None,
            }),
        }
    }

    /// Resolves and uploads media as `actor`, returning the content URI.
    pub async fn upload_source(
        &self,
        actor: &Actor,
        source: &MediaSource,
        mimetype: Option<&str>,
    ) -> Result<String, MarionetteError> {
        let media = self.resolve_source(source).await?;
        self.upload_media(actor, media, mimetype, file_name(source))
            .await
            .map(|(uri, _, _)| uri)
    }

    /// Uploads resolved media, returning the content URI, content type and size.
    pub async fn upload_media(
        &self,
        actor: &Actor,
        media: FetchedMedia,
        mimetype: Option<&str>,
        filename: Option<&str>,
    ) -> Result<(String, String, u64), MarionetteError> {
        let content_type = resolve_mimetype(mimetype, &media);
        let size = media.data.len() as u64;
        let uri = self
            .directory
            .upload(actor, media.data, &content_type, filename)
            .await
            .map_err(|e| match e {
                e @ MarionetteError::Upload { .. } => e,
                other => MarionetteError::Upload {
                    message: other.to_string(),
                    source: Some(Box::new(other)),
                },
            })?;
        Ok((uri, content_type, size))
    }
}

fn file_name(source: &MediaSource) -> Option<&str> {
    match source {
        MediaSource::Url(url) => url
            .split(['?', '#'])
            .next()
            .and_then(|u| u.rsplit('/').next())
            .filter(|n| !n.is_empty()),
        MediaSource::Path(path) => path.file_name().and_then(|n| n.to_str()),
        MediaSource::Bytes(_) => None,
    }
}
