//! Remote song API: stream resolution and favourites sync

use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::model::{ResolvedSong, Track};

/// Maps a track identifier to a playable stream.
#[async_trait]
pub trait SongResolver: Send + Sync {
    async fn resolve(&self, track: &Track) -> Result<ResolvedSong>;
}

/// Server-side copy of the user's favourites.
#[async_trait]
pub trait FavouritesRemote: Send + Sync {
    /// Tells the server the track is now liked (`true`) or not.
    async fn sync(&self, track: &Track, liked: bool) -> Result<()>;
}

/// Runs `operation`, and once more if the first attempt fails.
///
/// Each attempt is bounded by `timeout`.
pub async fn with_retry<T, F, Fut>(label: &str, timeout: Duration, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempt = || async {
        match tokio::time::timeout(timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(anyhow!("{label} timed out after {}ms", timeout.as_millis())),
        }
    };

    match attempt().await {
        Ok(value) => Ok(value),
        Err(e) => {
            tracing::debug!(operation = label, error = %e, "First attempt failed, retrying once");
            attempt().await
        }
    }
}

#[derive(Deserialize)]
struct SongResponse {
    song: Option<SongPayload>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SongPayload {
    #[serde(default)]
    adaptive_formats: Vec<UrlEntry>,
    #[serde(default)]
    thumbnail: Vec<UrlEntry>,
    title: Option<String>,
    author: Option<String>,
    length_seconds: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct UrlEntry {
    url: Option<String>,
}

#[derive(Deserialize)]
struct FavouritesResponse {
    #[serde(default)]
    success: bool,
    message: Option<String>,
}

impl SongPayload {
    fn into_resolved(self) -> Option<ResolvedSong> {
        // Formats and thumbnails are ordered by quality; the last one is the best.
        let stream_url = self.adaptive_formats.into_iter().rev().find_map(|f| f.url)?;
        let duration_hint = match self.length_seconds {
            Some(serde_json::Value::Number(n)) => n.as_f64(),
            Some(serde_json::Value::String(s)) => s.parse().ok(),
            _ => None,
        }
        .filter(|s| s.is_finite() && *s > 0.0)
        .map(Duration::from_secs_f64);

        Some(ResolvedSong {
            stream_url,
            title: self.title,
            artist: self.author,
            artwork: self.thumbnail.into_iter().rev().find_map(|t| t.url),
            duration_hint,
        })
    }
}

/// HTTP client for the song API.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    user_email: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, user_email: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_email,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{path}", self.base_url)
    }

    pub fn has_user(&self) -> bool {
        self.user_email.is_some()
    }
}

#[async_trait]
impl SongResolver for ApiClient {
    async fn resolve(&self, track: &Track) -> Result<ResolvedSong> {
        tracing::debug!(track_id = %track.id, title = %track.title, "Resolving stream");
        let response: SongResponse = self
            .http
            .post(self.endpoint("song"))
            .json(&json!({ "id": track.id, "song": track, "email": self.user_email }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("decoding song response")?;

        response
            .song
            .and_then(SongPayload::into_resolved)
            .ok_or_else(|| anyhow!("no playable format returned for {}", track.id))
    }
}

#[async_trait]
impl FavouritesRemote for ApiClient {
    async fn sync(&self, track: &Track, liked: bool) -> Result<()> {
        let email = self
            .user_email
            .as_deref()
            .ok_or_else(|| anyhow!("not signed in"))?;
        let response: FavouritesResponse = self
            .http
            .post(self.endpoint("favourites"))
            .json(&json!({ "email": email, "song": track, "liked": liked }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("decoding favourites response")?;

        if response.success {
            Ok(())
        } else {
            Err(anyhow!(response.message.unwrap_or_else(|| "favourites update rejected".to_string())))
        }
    }
}
