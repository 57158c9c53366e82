// SPDX-FileCopyrightText: 2026 Marionette Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Media byte resolution over HTTP and from local disk.
//!
//! [`HttpMediaFetcher`] is the production [`MediaFetcher`]. The mimetype
//! helpers fill in a content type when neither the origin nor the adapter
//! supplied one.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use marionette_core::{FetchedMedia, MarionetteError, MediaFetcher};
use tracing::debug;

/// Fallback content type for unrecognised bytes.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Fetches media with a shared `reqwest` client and reads files with `tokio::fs`.
#[derive(Debug, Clone)]
pub struct HttpMediaFetcher {
    client: reqwest::Client,
}

impl HttpMediaFetcher {
    pub fn new(timeout: Duration) -> Result<Self, MarionetteError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MarionetteError::Upload {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn fetch_url(&self, url: &str) -> Result<FetchedMedia, MarionetteError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MarionetteError::Upload {
                message: format!("failed to fetch {url}: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(MarionetteError::upload(format!(
                "fetching {url} returned {status}"
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| !v.is_empty());

        let data = response
            .bytes()
            .await
            .map_err(|e| MarionetteError::Upload {
                message: format!("failed to read body of {url}: {e}"),
                source: Some(Box::new(e)),
            })?
            .to_vec();

        debug!(url = %url, size = data.len(), "fetched media");
        Ok(FetchedMedia { data, content_type })
    }

    async fn read_path(&self, path: &Path) -> Result<FetchedMedia, MarionetteError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| MarionetteError::Upload {
                message: format!("failed to read {}: {e}", path.display()),
                source: Some(Box::new(e)),
            })?;
        debug!(path = %path.display(), size = data.len(), "read media from disk");
        Ok(FetchedMedia {
            content_type: mimetype_from_extension(path).map(str::to_string),
            data,
        })
    }
}

/// Guesses an image content type from magic bytes.
pub fn sniff_mimetype(data: &[u8]) -> Option<&'static str> {
    match data {
        [0x89, b'P', b'N', b'G', ..] => Some("image/png"),
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [b'G', b'I', b'F', b'8', ..] => Some("image/gif"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
        [b'B', b'M', ..] => Some("image/bmp"),
        _ => None,
    }
}

/// Guesses a content type from a file extension.
pub fn mimetype_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "svg" => Some("image/svg+xml"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

/// Picks the best known content type: explicit, then reported, then sniffed.
pub fn resolve_mimetype(explicit: Option<&str>, media: &FetchedMedia) -> String {
    explicit
        .or(media.content_type.as_deref())
        .or_else(|| sniff_mimetype(&media.data))
        .unwrap_or(OCTET_STREAM)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];

    fn fetcher() -> HttpMediaFetcher {
        HttpMediaFetcher::new(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn sniffs_common_formats() {
        assert_eq!(sniff_mimetype(PNG), Some("image/png"));
        assert_eq!(sniff_mimetype(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(sniff_mimetype(b"GIF89a"), Some("image/gif"));
        assert_eq!(sniff_mimetype(b"hello"), None);
    }

    #[test]
    fn explicit_mimetype_wins() {
        let media = FetchedMedia {
            data: PNG.to_vec(),
            content_type: Some("image/x-custom".into()),
        };
        assert_eq!(resolve_mimetype(Some("image/jpeg"), &media), "image/jpeg");
        assert_eq!(resolve_mimetype(None, &media), "image/x-custom");

        let bare = FetchedMedia {
            data: b"???".to_vec(),
            content_type: None,
        };
        assert_eq!(resolve_mimetype(None, &bare), OCTET_STREAM);
    }

    #[tokio::test]
    async fn fetch_url_returns_body_and_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cat.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png; charset=binary")
                    .set_body_bytes(PNG),
            )
            .mount(&server)
            .await;

        let media = fetcher()
            .fetch_url(&format!("{}/cat.png", server.uri()))
            .await
            .unwrap();
        assert_eq!(media.data, PNG);
        assert_eq!(media.content_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn fetch_url_rejects_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = fetcher()
            .fetch_url(&format!("{}/gone.png", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, MarionetteError::Upload { .. }));
    }

    #[tokio::test]
    async fn read_path_uses_extension() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("icon.PNG");
        std::fs::write(&file, PNG).unwrap();

        let media = fetcher().read_path(&file).await.unwrap();
        assert_eq!(media.data, PNG);
        assert_eq!(media.content_type.as_deref(), Some("image/png"));

        assert!(fetcher().read_path(&dir.path().join("missing.png")).await.is_err());
    }
}
