// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Application-service implementation of [`HomeDirectory`].
//!
//! Requests run as the bridge bot using the `as_token`; ghost requests add
//! the `user_id` identity assertion. Reading a room's aliases and inviting
//! ghosts need a room member, so those go through an optional member client
//! (the puppet's session) when one is configured.

use std::time::Duration;

use async_trait::async_trait;
use marionette_config::model::HomeserverConfig;
use marionette_core::events::RoomMessageContent;
use marionette_core::types::{Actor, AdapterType, HealthStatus, RoomCreation};
use marionette_core::{HomeDirectory, MarionetteError, PluginAdapter};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde::de::IgnoredAny;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::client::{ApiClient, ApiError, assert_identity, txn_id};

#[derive(Debug, Deserialize)]
struct RoomIdResponse {
    room_id: String,
}

#[derive(Debug, Deserialize)]
struct AliasesResponse {
    #[serde(default)]
    aliases: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AvatarResponse {
    #[serde(default)]
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    content_uri: String,
}

#[derive(Debug, Deserialize)]
struct EventIdResponse {
    event_id: String,
}

/// Bot and ghost operations against a homeserver.
pub struct MatrixDirectory {
    api: ApiClient,
    member: Option<ApiClient>,
    bot_user_id: String,
    server_name: String,
}

impl MatrixDirectory {
    /// Builds the directory from the homeserver section. The `as_token`
    /// must be set.
    pub fn new(homeserver: &HomeserverConfig) -> Result<Self, MarionetteError> {
        let token = homeserver
            .as_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                MarionetteError::Config(
                    "homeserver.as_token is required (or set MARIONETTE_HOMESERVER_AS_TOKEN)"
                        .into(),
                )
            })?;
        let api = ApiClient::new(
            &homeserver.url,
            token,
            Duration::from_secs(homeserver.request_timeout_secs),
        )?;
        Ok(Self {
            api,
            member: None,
            bot_user_id: homeserver.bot_user_id(),
            server_name: homeserver.server_name.clone(),
        })
    }

    /// Uses `member` for alias listing and ghost invites.
    pub fn with_member_client(mut self, member: ApiClient) -> Self {
        self.member = Some(member);
        self
    }

    fn member_api(&self) -> &ApiClient {
        self.member.as_ref().unwrap_or(&self.api)
    }

    async fn try_join(&self, actor: &Actor, room: &str) -> Result<String, ApiError> {
        let url = assert_identity(self.api.client_url(&["join", room]), actor);
        let response: RoomIdResponse = self
            .api
            .send(self.api.http().post(url).json(&json!({})))
            .await?;
        Ok(response.room_id)
    }

    async fn invite(&self, user_id: &str, room: &str) -> Result<(), MarionetteError> {
        let room_id = if room.starts_with('#') {
            self.resolve_alias(room)
                .await?
                .ok_or_else(|| MarionetteError::NotFound {
                    what: room.to_string(),
                })?
        } else {
            room.to_string()
        };
        let api = self.member_api();
        let url = api.client_url(&["rooms", &room_id, "invite"]);
        api.send::<IgnoredAny>(api.http().post(url).json(&json!({ "user_id": user_id })))
            .await
            .map_err(ApiError::into_directory)?;
        debug!(user_id = %user_id, room_id = %room_id, "invited ghost");
        Ok(())
    }
}

fn local_part(user_id: &str) -> &str {
    let rest = user_id.strip_prefix('@').unwrap_or(user_id);
    rest.split_once(':').map_or(rest, |(local, _)| local)
}

#[async_trait]
impl PluginAdapter for MatrixDirectory {
    fn name(&self) -> &str {
        "matrix-directory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Directory
    }

    async fn health_check(&self) -> Result<HealthStatus, MarionetteError> {
        let url = self.api.client_url(&["account", "whoami"]);
        match self.api.send::<IgnoredAny>(self.api.http().get(url)).await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e @ ApiError::Matrix { .. }) => Ok(HealthStatus::Degraded(e.to_string())),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), MarionetteError> {
        Ok(())
    }
}

#[async_trait]
impl HomeDirectory for MatrixDirectory {
    fn bot_user_id(&self) -> &str {
        &self.bot_user_id
    }

    fn server_name(&self) -> &str {
        &self.server_name
    }

    async fn resolve_alias(&self, alias: &str) -> Result<Option<String>, MarionetteError> {
        let url = self.api.client_url(&["directory", "room", alias]);
        match self.api.send::<RoomIdResponse>(self.api.http().get(url)).await {
            Ok(response) => Ok(Some(response.room_id)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into_directory()),
        }
    }

    async fn delete_alias(&self, alias: &str) -> Result<(), MarionetteError> {
        let url = self.api.client_url(&["directory", "room", alias]);
        match self.api.send::<IgnoredAny>(self.api.http().delete(url)).await {
            Ok(_) => {
                info!(alias = %alias, "deleted alias");
                Ok(())
            }
            Err(e) if e.is_not_found() => Err(MarionetteError::NotFound {
                what: alias.to_string(),
            }),
            Err(e) => Err(e.into_directory()),
        }
    }

    async fn room_aliases(&self, room_id: &str) -> Result<Vec<String>, MarionetteError> {
        let api = self.member_api();
        let url = api.client_url(&["rooms", room_id, "aliases"]);
        match api.send::<AliasesResponse>(api.http().get(url)).await {
            Ok(response) => Ok(response.aliases),
            // Not a member or no such room: nothing to reverse-resolve with.
            Err(e) if matches!(e.errcode(), Some("M_FORBIDDEN" | "M_NOT_FOUND")) => {
                debug!(room_id = %room_id, error = %e, "room aliases unavailable");
                Ok(Vec::new())
            }
            Err(e) => Err(e.into_directory()),
        }
    }

    async fn create_room(&self, creation: &RoomCreation) -> Result<String, MarionetteError> {
        let mut body = json!({
            "room_alias_name": creation.alias_local_part,
            "visibility": "private",
            "preset": "private_chat",
            "invite": creation.invite,
        });
        if let Some(name) = &creation.name {
            body["name"] = Value::String(name.clone());
        }
        if let Some(topic) = &creation.topic {
            body["topic"] = Value::String(topic.clone());
        }

        let url = self.api.client_url(&["createRoom"]);
        let response: RoomIdResponse = self
            .api
            .send(self.api.http().post(url).json(&body))
            .await
            .map_err(ApiError::into_directory)?;
        Ok(response.room_id)
    }

    async fn join_room(&self, actor: &Actor, room: &str) -> Result<String, MarionetteError> {
        match self.try_join(actor, room).await {
            Ok(room_id) => Ok(room_id),
            // Ghosts cannot join invite-only rooms on their own.
            Err(e) if e.errcode() == Some("M_FORBIDDEN") => match actor {
                Actor::User(user_id) => {
                    debug!(user_id = %user_id, room = %room, "join forbidden, inviting first");
                    self.invite(user_id, room).await?;
                    self.try_join(actor, room)
                        .await
                        .map_err(|e| e.into_join_error(room, ApiError::into_directory))
                }
                Actor::Bot => Err(e.into_directory()),
            },
            Err(e) => Err(e.into_join_error(room, ApiError::into_directory)),
        }
    }

    async fn leave_room(&self, actor: &Actor, room_id: &str) -> Result<(), MarionetteError> {
        let url = assert_identity(self.api.client_url(&["rooms", room_id, "leave"]), actor);
        self.api
            .send::<IgnoredAny>(self.api.http().post(url).json(&json!({})))
            .await
            .map_err(ApiError::into_directory)?;
        Ok(())
    }

    async fn set_power_level(
        &self,
        room_id: &str,
        user_id: &str,
        level: i64,
    ) -> Result<(), MarionetteError> {
        let url = self
            .api
            .client_url(&["rooms", room_id, "state", "m.room.power_levels", ""]);
        let mut levels: Value = self
            .api
            .send(self.api.http().get(url.clone()))
            .await
            .map_err(ApiError::into_directory)?;

        let users = levels
            .as_object_mut()
            .ok_or_else(|| MarionetteError::directory("power levels content is not an object"))?
            .entry("users")
            .or_insert_with(|| json!({}));
        users
            .as_object_mut()
            .ok_or_else(|| MarionetteError::directory("power levels `users` is not an object"))?
            .insert(user_id.to_string(), json!(level));

        self.api
            .send::<IgnoredAny>(self.api.http().put(url).json(&levels))
            .await
            .map_err(ApiError::into_directory)?;
        Ok(())
    }

    async fn register_user(&self, user_id: &str) -> Result<(), MarionetteError> {
        let url = self.api.client_url(&["register"]);
        let body = json!({
            "type": "m.login.application_service",
            "username": local_part(user_id),
        });
        match self.api.send::<IgnoredAny>(self.api.http().post(url).json(&body)).await {
            Ok(_) => {
                info!(user_id = %user_id, "registered ghost");
                Ok(())
            }
            Err(e) if e.errcode() == Some("M_USER_IN_USE") => Ok(()),
            Err(e) => Err(e.into_directory()),
        }
    }

    async fn set_display_name(&self, user_id: &str, name: &str) -> Result<(), MarionetteError> {
        let actor = Actor::User(user_id.to_string());
        let url = assert_identity(
            self.api.client_url(&["profile", user_id, "displayname"]),
            &actor,
        );
        self.api
            .send::<IgnoredAny>(self.api.http().put(url).json(&json!({ "displayname": name })))
            .await
            .map_err(ApiError::into_directory)?;
        Ok(())
    }

    async fn avatar_url(&self, user_id: &str) -> Result<Option<String>, MarionetteError> {
        let url = self.api.client_url(&["profile", user_id, "avatar_url"]);
        match self.api.send::<AvatarResponse>(self.api.http().get(url)).await {
            Ok(response) => Ok(response.avatar_url.filter(|u| !u.is_empty())),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into_directory()),
        }
    }

    async fn set_avatar_url(
        &self,
        user_id: &str,
        content_uri: &str,
    ) -> Result<(), MarionetteError> {
        let actor = Actor::User(user_id.to_string());
        let url = assert_identity(
            self.api.client_url(&["profile", user_id, "avatar_url"]),
            &actor,
        );
        self.api
            .send::<IgnoredAny>(
                self.api
                    .http()
                    .put(url)
                    .json(&json!({ "avatar_url": content_uri })),
            )
            .await
            .map_err(ApiError::into_directory)?;
        Ok(())
    }

    async fn set_room_avatar(
        &self,
        room_id: &str,
        content_uri: &str,
    ) -> Result<(), MarionetteError> {
        let url = self
            .api
            .client_url(&["rooms", room_id, "state", "m.room.avatar", ""]);
        self.api
            .send::<IgnoredAny>(self.api.http().put(url).json(&json!({ "url": content_uri })))
            .await
            .map_err(ApiError::into_directory)?;
        Ok(())
    }

    async fn upload(
        &self,
        actor: &Actor,
        data: Vec<u8>,
        content_type: &str,
        filename: Option<&str>,
    ) -> Result<String, MarionetteError> {
        let mut url = assert_identity(self.api.media_url(&["upload"]), actor);
        if let Some(filename) = filename {
            url.query_pairs_mut().append_pair("filename", filename);
        }
        let size = data.len();
        let response: UploadResponse = self
            .api
            .send(
                self.api
                    .http()
                    .post(url)
                    .header(CONTENT_TYPE, content_type)
                    .body(data),
            )
            .await
            .map_err(|e| MarionetteError::Upload {
                message: e.to_string(),
                source: Some(Box::new(e)),
            })?;
        debug!(content_uri = %response.content_uri, size, content_type, "uploaded media");
        Ok(response.content_uri)
    }

    async fn send_message(
        &self,
        actor: &Actor,
        room_id: &str,
        content: &RoomMessageContent,
    ) -> Result<String, MarionetteError> {
        let txn = txn_id();
        let url = assert_identity(
            self.api
                .client_url(&["rooms", room_id, "send", "m.room.message", &txn]),
            actor,
        );
        let response: EventIdResponse = self
            .api
            .send(self.api.http().put(url).json(content))
            .await
            .map_err(ApiError::into_directory)?;
        Ok(response.event_id)
    }

    fn download_url(&self, content_uri: &str) -> Option<String> {
        let (server, media_id) = content_uri.strip_prefix("mxc://")?.split_once('/')?;
        if server.is_empty() || media_id.is_empty() {
            warn!(content_uri = %content_uri, "malformed content uri");
            return None;
        }
        Some(
            self.api
                .media_url(&["download", server, media_id])
                .to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, path_regex, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const GHOST: &str = "@mocknet_puppet_alice_626f62:example.org";

    fn homeserver(url: &str) -> HomeserverConfig {
        HomeserverConfig {
            url: url.to_string(),
            server_name: "example.org".into(),
            as_token: Some("as-secret".into()),
            ..Default::default()
        }
    }

    async fn setup() -> (MockServer, MatrixDirectory) {
        let server = MockServer::start().await;
        let directory = MatrixDirectory::new(&homeserver(&server.uri())).unwrap();
        (server, directory)
    }

    fn matrix_error(status: u16, errcode: &str, error: &str) -> ResponseTemplate {
        ResponseTemplate::new(status).set_body_json(json!({ "errcode": errcode, "error": error }))
    }

    #[test]
    fn requires_as_token() {
        let mut hs = homeserver("http://localhost:8008");
        hs.as_token = None;
        assert!(matches!(
            MatrixDirectory::new(&hs),
            Err(MarionetteError::Config(_))
        ));
    }

    #[tokio::test]
    async fn resolves_and_misses_aliases() {
        let (server, directory) = setup().await;
        Mock::given(method("GET"))
            .and(path("/_matrix/client/v3/directory/room/%23known:example.org"))
            .and(header("authorization", "Bearer as-secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "room_id": "!r:example.org", "servers": ["example.org"]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/_matrix/client/v3/directory/room/%23missing:example.org"))
            .respond_with(matrix_error(404, "M_NOT_FOUND", "Room alias not found"))
            .mount(&server)
            .await;

        assert_eq!(
            directory.resolve_alias("#known:example.org").await.unwrap(),
            Some("!r:example.org".to_string())
        );
        assert_eq!(
            directory.resolve_alias("#missing:example.org").await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn delete_missing_alias_is_not_found() {
        let (server, directory) = setup().await;
        Mock::given(method("DELETE"))
            .and(path("/_matrix/client/v3/directory/room/%23gone:example.org"))
            .respond_with(matrix_error(404, "M_NOT_FOUND", "Room alias not found"))
            .mount(&server)
            .await;

        let err = directory.delete_alias("#gone:example.org").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn create_room_sends_metadata() {
        let (server, directory) = setup().await;
        Mock::given(method("POST"))
            .and(path("/_matrix/client/v3/createRoom"))
            .and(body_json(json!({
                "room_alias_name": "mocknet_puppet_alice_7431",
                "visibility": "private",
                "preset": "private_chat",
                "invite": ["@alice:example.org"],
                "name": "Chat",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "room_id": "!new:example.org" })))
            .expect(1)
            .mount(&server)
            .await;

        let room_id = directory
            .create_room(&RoomCreation {
                alias_local_part: "mocknet_puppet_alice_7431".into(),
                name: Some("Chat".into()),
                topic: None,
                invite: vec!["@alice:example.org".into()],
            })
            .await
            .unwrap();
        assert_eq!(room_id, "!new:example.org");
    }

    #[tokio::test]
    async fn unreachable_room_is_unjoinable() {
        let (server, directory) = setup().await;
        Mock::given(method("POST"))
            .and(path("/_matrix/client/v3/join/!dead:example.org"))
            .respond_with(matrix_error(404, "M_UNKNOWN", "No known servers"))
            .mount(&server)
            .await;

        let err = directory
            .join_room(&Actor::Bot, "!dead:example.org")
            .await
            .unwrap_err();
        assert!(err.is_unjoinable(), "got {err:?}");
    }

    #[tokio::test]
    async fn forbidden_ghost_join_invites_then_retries() {
        let (server, directory) = setup().await;
        Mock::given(method("POST"))
            .and(path("/_matrix/client/v3/join/!r:example.org"))
            .and(query_param("user_id", GHOST))
            .respond_with(matrix_error(403, "M_FORBIDDEN", "You are not invited to this room."))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/_matrix/client/v3/rooms/!r:example.org/invite"))
            .and(body_json(json!({ "user_id": GHOST })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/_matrix/client/v3/join/!r:example.org"))
            .and(query_param("user_id", GHOST))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "room_id": "!r:example.org" })))
            .mount(&server)
            .await;

        let room_id = directory
            .join_room(&Actor::User(GHOST.into()), "!r:example.org")
            .await
            .unwrap();
        assert_eq!(room_id, "!r:example.org");
    }

    #[tokio::test]
    async fn power_levels_are_read_modified_written() {
        let (server, directory) = setup().await;
        Mock::given(method("GET"))
            .and(path("/_matrix/client/v3/rooms/!r:example.org/state/m.room.power_levels/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "users": { "@marionettebot:example.org": 100 },
                "users_default": 0
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/_matrix/client/v3/rooms/!r:example.org/state/m.room.power_levels/"))
            .and(body_json(json!({
                "users": { "@marionettebot:example.org": 100, "@alice:example.org": 100 },
                "users_default": 0
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "event_id": "$p" })))
            .expect(1)
            .mount(&server)
            .await;

        directory
            .set_power_level("!r:example.org", "@alice:example.org", 100)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn existing_registration_is_accepted() {
        let (server, directory) = setup().await;
        Mock::given(method("POST"))
            .and(path("/_matrix/client/v3/register"))
            .and(body_json(json!({
                "type": "m.login.application_service",
                "username": "mocknet_puppet_alice_626f62",
            })))
            .respond_with(matrix_error(400, "M_USER_IN_USE", "User ID already taken."))
            .mount(&server)
            .await;

        directory.register_user(GHOST).await.unwrap();
    }

    #[tokio::test]
    async fn profile_updates_assert_the_ghost() {
        let (server, directory) = setup().await;
        Mock::given(method("PUT"))
            .and(path(format!("/_matrix/client/v3/profile/{GHOST}/displayname")))
            .and(query_param("user_id", GHOST))
            .and(body_json(json!({ "displayname": "Bob" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/_matrix/client/v3/profile/{GHOST}/avatar_url")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        directory.set_display_name(GHOST, "Bob").await.unwrap();
        assert_eq!(directory.avatar_url(GHOST).await.unwrap(), None);
    }

    #[tokio::test]
    async fn upload_returns_content_uri() {
        let (server, directory) = setup().await;
        Mock::given(method("POST"))
            .and(path("/_matrix/media/v3/upload"))
            .and(query_param("filename", "cat.png"))
            .and(header("content-type", "image/png"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content_uri": "mxc://example.org/abc"
            })))
            .mount(&server)
            .await;

        let uri = directory
            .upload(&Actor::Bot, vec![1, 2, 3], "image/png", Some("cat.png"))
            .await
            .unwrap();
        assert_eq!(uri, "mxc://example.org/abc");
    }

    #[tokio::test]
    async fn rejected_upload_is_an_upload_error() {
        let (server, directory) = setup().await;
        Mock::given(method("POST"))
            .and(path("/_matrix/media/v3/upload"))
            .respond_with(matrix_error(413, "M_TOO_LARGE", "Upload request body is too large"))
            .mount(&server)
            .await;

        let err = directory
            .upload(&Actor::Bot, vec![0; 16], "image/png", None)
            .await
            .unwrap_err();
        assert!(matches!(err, MarionetteError::Upload { .. }));
    }

    #[tokio::test]
    async fn ghost_send_returns_event_id() {
        let (server, directory) = setup().await;
        Mock::given(method("PUT"))
            .and(path_regex(
                r"^/_matrix/client/v3/rooms/!r:example.org/send/m.room.message/[0-9a-f]+$",
            ))
            .and(query_param("user_id", GHOST))
            .and(body_json(json!({ "msgtype": "m.text", "body": "hi" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "event_id": "$e1" })))
            .mount(&server)
            .await;

        let event_id = directory
            .send_message(
                &Actor::User(GHOST.into()),
                "!r:example.org",
                &RoomMessageContent::text("hi"),
            )
            .await
            .unwrap();
        assert_eq!(event_id, "$e1");
    }

    #[tokio::test]
    async fn aliases_unavailable_to_non_members_are_empty() {
        let (server, directory) = setup().await;
        Mock::given(method("GET"))
            .and(path("/_matrix/client/v3/rooms/!r:example.org/aliases"))
            .respond_with(matrix_error(403, "M_FORBIDDEN", "You don't have permission"))
            .mount(&server)
            .await;

        assert!(directory.room_aliases("!r:example.org").await.unwrap().is_empty());
    }

    #[test]
    fn download_url_maps_content_uris() {
        let directory = MatrixDirectory::new(&homeserver("https://matrix.example.org")).unwrap();
        assert_eq!(
            directory.download_url("mxc://example.org/abc").as_deref(),
            Some("https://matrix.example.org/_matrix/media/v3/download/example.org/abc")
        );
        assert_eq!(directory.download_url("https://example.org/abc"), None);
        assert_eq!(directory.download_url("mxc://example.org/"), None);
    }

    #[test]
    fn local_parts() {
        assert_eq!(local_part("@bob:example.org"), "bob");
        assert_eq!(local_part("bob"), "bob");
    }
}
