//! Index of songs saved on the device

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{PlaybackSource, Track};
use crate::store::{get_json, set_json, PreferenceStore};

pub const DOWNLOADS_KEY: &str = "downloaded";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DownloadedSong {
    pub track: Track,
    /// Local file URI written by the downloader.
    pub file_uri: String,
    pub downloaded_at: DateTime<Utc>,
}

impl DownloadedSong {
    /// The track as the player should load it: already resolved to the local file.
    pub fn playable(&self) -> Track {
        Track {
            stream_url: Some(self.file_uri.clone()),
            source: PlaybackSource::Downloads,
            ..self.track.clone()
        }
    }
}

pub async fn list(store: &dyn PreferenceStore) -> Result<Vec<DownloadedSong>> {
    Ok(get_json(store, DOWNLOADS_KEY).await?.unwrap_or_default())
}

/// Adds or replaces the entry for the song's track id.
pub async fn record(store: &dyn PreferenceStore, song: DownloadedSong) -> Result<()> {
    let mut songs = list(store).await?;
    songs.retain(|s| s.track.id != song.track.id);
    songs.push(song);
    set_json(store, DOWNLOADS_KEY, &songs).await
}

pub async fn remove(store: &dyn PreferenceStore, track_id: &str) -> Result<bool> {
    let mut songs = list(store).await?;
    let before = songs.len();
    songs.retain(|s| s.track.id != track_id);
    if songs.len() == before {
        return Ok(false);
    }
    set_json(store, DOWNLOADS_KEY, &songs).await?;
    Ok(true)
}
