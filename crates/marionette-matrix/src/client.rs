// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authenticated HTTP client for the Matrix client-server API.
//!
//! Provides [`ApiClient`], which builds endpoint URLs, attaches the access
//! token, and decodes the standard `{errcode, error}` rejection body into
//! [`ApiError`].

use std::time::Duration;

use marionette_core::MarionetteError;
use marionette_core::types::Actor;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

const CLIENT_PREFIX: [&str; 3] = ["_matrix", "client", "v3"];
const MEDIA_PREFIX: [&str; 3] = ["_matrix", "media", "v3"];

/// Substrings the homeserver uses when no server in a room can be reached.
const UNJOINABLE_MARKERS: [&str; 2] = ["no known servers", "no usable servers"];

/// A failed client-server request.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("homeserver returned {status} ({errcode}): {message}")]
    Matrix {
        status: StatusCode,
        errcode: String,
        message: String,
    },

    #[error("failed to decode homeserver response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    errcode: String,
    #[serde(default)]
    error: String,
}

impl ApiError {
    fn from_response(status: StatusCode, body: &[u8]) -> Self {
        match serde_json::from_slice::<ErrorBody>(body) {
            Ok(err) => Self::Matrix {
                status,
                errcode: err.errcode,
                message: err.error,
            },
            Err(_) => Self::Matrix {
                status,
                errcode: "M_UNKNOWN".to_string(),
                message: String::from_utf8_lossy(body).into_owned(),
            },
        }
    }

    pub fn errcode(&self) -> Option<&str> {
        match self {
            Self::Matrix { errcode, .. } => Some(errcode),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.errcode() == Some("M_NOT_FOUND")
    }

    /// Returns `true` if a join failed because no server in the room is reachable.
    pub fn is_unjoinable(&self) -> bool {
        match self {
            Self::Matrix { message, .. } => {
                let message = message.to_lowercase();
                UNJOINABLE_MARKERS.iter().any(|m| message.contains(m))
            }
            _ => false,
        }
    }

    pub fn into_directory(self) -> MarionetteError {
        MarionetteError::Directory {
            message: self.to_string(),
            source: Some(Box::new(self)),
        }
    }

    pub fn into_session(self) -> MarionetteError {
        MarionetteError::Session {
            message: self.to_string(),
            source: Some(Box::new(self)),
        }
    }

    /// Classifies a failed join: unreachable rooms and unknown aliases get
    /// their own variants, everything else goes through `other`.
    pub fn into_join_error(
        self,
        room: &str,
        other: impl FnOnce(ApiError) -> MarionetteError,
    ) -> MarionetteError {
        if self.is_unjoinable() {
            let message = match &self {
                Self::Matrix { message, .. } => message.clone(),
                _ => self.to_string(),
            };
            return MarionetteError::UnjoinableRoom {
                room_id: room.to_string(),
                message,
            };
        }
        if self.is_not_found() {
            return MarionetteError::NotFound {
                what: room.to_string(),
            };
        }
        other(self)
    }
}

/// HTTP client bound to one homeserver and one access token.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    /// Creates a client sending `token` as a bearer credential.
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, MarionetteError> {
        let base_url = Url::parse(base_url).map_err(|e| {
            MarionetteError::Config(format!("invalid homeserver url `{base_url}`: {e}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(MarionetteError::Config(format!(
                "homeserver url `{base_url}` cannot carry a path"
            )));
        }

        let mut auth = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
            MarionetteError::Config(format!("invalid access token header value: {e}"))
        })?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| MarionetteError::Directory {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self { http, base_url })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// URL of a client-server endpoint. Segments are percent-encoded.
    pub fn client_url(&self, segments: &[&str]) -> Url {
        self.url(&CLIENT_PREFIX, segments)
    }

    /// URL of a media endpoint.
    pub fn media_url(&self, segments: &[&str]) -> Url {
        self.url(&MEDIA_PREFIX, segments)
    }

    fn url(&self, prefix: &[&str], segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // `new` rejected cannot-be-a-base URLs, so this always succeeds.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(prefix).extend(segments);
        }
        url
    }

    /// Sends a request and decodes a successful JSON body.
    pub async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        debug!(status = %status, bytes = body.len(), "homeserver response");

        if status.is_success() {
            // Some endpoints answer with an empty body.
            if body.is_empty() {
                return Ok(serde_json::from_slice(b"{}")?);
            }
            return Ok(serde_json::from_slice(&body)?);
        }
        Err(ApiError::from_response(status, &body))
    }
}

/// Adds the application-service identity assertion for a ghost.
pub fn assert_identity(mut url: Url, actor: &Actor) -> Url {
    if let Actor::User(user_id) = actor {
        url.query_pairs_mut().append_pair("user_id", user_id);
    }
    url
}

/// Fresh transaction id for idempotent sends.
pub fn txn_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> ApiClient {
        ApiClient::new(base, "secret", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn builds_encoded_client_urls() {
        let api = client("https://matrix.example.org");
        let url = api.client_url(&["directory", "room", "#a_b:example.org"]);
        assert_eq!(
            url.as_str(),
            "https://matrix.example.org/_matrix/client/v3/directory/room/%23a_b:example.org"
        );
    }

    #[test]
    fn keeps_base_path_prefix() {
        let api = client("https://example.org/matrix/");
        assert_eq!(
            api.media_url(&["upload"]).as_str(),
            "https://example.org/matrix/_matrix/media/v3/upload"
        );
    }

    #[test]
    fn ghost_identity_is_asserted() {
        let api = client("http://localhost:8008");
        let url = assert_identity(
            api.client_url(&["join", "!r:x"]),
            &Actor::User("@ghost:x".into()),
        );
        assert_eq!(url.query(), Some("user_id=%40ghost%3Ax"));
        let url = assert_identity(api.client_url(&["join", "!r:x"]), &Actor::Bot);
        assert_eq!(url.query(), None);
    }

    #[test]
    fn rejects_bad_base_urls() {
        assert!(ApiClient::new("not a url", "t", Duration::from_secs(1)).is_err());
        assert!(ApiClient::new("mailto:a@b", "t", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn classifies_join_failures() {
        let err = ApiError::from_response(
            StatusCode::NOT_FOUND,
            br#"{"errcode":"M_UNKNOWN","error":"No known servers"}"#,
        );
        assert!(err.is_unjoinable());
        assert!(
            err.into_join_error("!r:x", ApiError::into_directory)
                .is_unjoinable()
        );

        let err = ApiError::from_response(
            StatusCode::NOT_FOUND,
            br#"{"errcode":"M_NOT_FOUND","error":"Room alias not found"}"#,
        );
        assert!(
            err.into_join_error("#a:x", ApiError::into_directory)
                .is_not_found()
        );

        let err = ApiError::from_response(StatusCode::BAD_GATEWAY, b"upstream down");
        assert_eq!(err.errcode(), Some("M_UNKNOWN"));
        assert!(matches!(
            err.into_join_error("!r:x", ApiError::into_session),
            MarionetteError::Session { .. }
        ));
    }
}
