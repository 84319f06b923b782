//! Recently played list

use anyhow::Result;

use crate::model::{PlaybackSource, Track};
use crate::store::{get_json, set_json, PreferenceStore};

pub const RECENTS_KEY: &str = "recents";

/// Oldest first, most recent last, one entry per track id.
pub struct RecentlyPlayed {
    tracks: Vec<Track>,
    limit: usize,
}

impl RecentlyPlayed {
    pub async fn load(store: &dyn PreferenceStore, limit: usize) -> Result<Self> {
        let tracks = match get_json::<Vec<Track>>(store, RECENTS_KEY).await {
            Ok(tracks) => tracks.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "Recently played list unreadable, starting empty");
                Vec::new()
            }
        };
        Ok(Self { tracks, limit: limit.max(1) })
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Most recent first, as the recents screen lists them.
    pub fn latest_first(&self) -> Vec<Track> {
        self.tracks.iter().rev().cloned().collect()
    }

    /// Moves `track` to the end of the list and persists it.
    pub async fn record(&mut self, store: &dyn PreferenceStore, track: &Track) -> Result<()> {
        let mut entry = track.clone();
        // Remote stream URLs expire; only local files stay playable.
        if entry.source != PlaybackSource::Downloads {
            entry.stream_url = None;
        }

        self.tracks.retain(|t| t.id != entry.id);
        self.tracks.push(entry);
        if self.tracks.len() > self.limit {
            let excess = self.tracks.len() - self.limit;
            self.tracks.drain(..excess);
        }

        set_json(store, RECENTS_KEY, &self.tracks).await
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn track(id: &str) -> Track {
        Track::new(id, id, "artist").with_stream_url("https://cdn/expiring")
    }

    #[tokio::test]
    async fn replaying_moves_track_to_the_end() {
        let store = MemoryStore::new();
        let mut recents = RecentlyPlayed::load(&store, 10).await.unwrap();

        for id in ["a", "b", "a"] {
            recents.record(&store, &track(id)).await.unwrap();
        }

        let ids: Vec<_> = recents.tracks().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
        assert!(recents.tracks().iter().all(|t| t.stream_url.is_none()));

        let reloaded = RecentlyPlayed::load(&store, 10).await.unwrap();
        assert_eq!(reloaded.tracks().len(), 2);
    }

    #[tokio::test]
    async fn oldest_entries_fall_off() {
        let store = MemoryStore::new();
        let mut recents = RecentlyPlayed::load(&store, 2).await.unwrap();
        for id in ["a", "b", "c"] {
            recents.record(&store, &track(id)).await.unwrap();
        }

        let ids: Vec<_> = recents.latest_first().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, ["c", "b"]);
    }
}
