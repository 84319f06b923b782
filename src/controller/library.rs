//! Favourites, downloads and user data

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::api::FavouritesRemote;
use crate::error::{PlayerError, Result};
use crate::library::{downloads, FavouriteMutation, SyncStatus};
use crate::model::{PlaybackSource, Track};

use super::{Command, Orchestrator};

const MEDIA_LIBRARY: &str = "media library";

impl Orchestrator {
    /// Flips the liked state locally, then syncs it in the background when signed in.
    pub(super) async fn toggle_favourite(&mut self, track: Option<Track>) -> Result<bool> {
        let track = match track {
            Some(track) => track,
            None => self
                .queue
                .as_ref()
                .and_then(|q| q.current_track().cloned())
                .ok_or(PlayerError::NothingPlaying)?,
        };

        let remote = self.favourites_remote.clone();
        let mutation = self
            .library
            .toggle_favourite(&track, remote.is_some())
            .await
            .map_err(|e| PlayerError::store(&e))?;
        tracing::info!(track_id = %track.id, liked = mutation.liked, revision = mutation.revision, "Favourite toggled");
        self.publish();

        let liked = mutation.liked;
        if let Some(remote) = remote {
            self.spawn_favourite_sync(remote, vec![mutation]);
        }
        Ok(liked)
    }

    pub(super) async fn retry_failed_favourites(&mut self) -> Result<usize> {
        let Some(remote) = self.favourites_remote.clone() else {
            return Ok(0);
        };
        let mutations = self
            .library
            .requeue_failed_favourites()
            .await
            .map_err(|e| PlayerError::store(&e))?;
        let count = mutations.len();
        if count > 0 {
            tracing::info!(count, "Retrying failed favourites sync");
            self.spawn_favourite_sync(remote, mutations);
        }
        Ok(count)
    }

    fn spawn_favourite_sync(&self, remote: Arc<dyn FavouritesRemote>, mutations: Vec<FavouriteMutation>) {
        let commands = self.commands.clone();
        let timeout = self.resolve_timeout;

        tokio::spawn(async move {
            let results = join_all(mutations.iter().map(|m| sync_once(remote.as_ref(), m, timeout))).await;
            let Some(commands) = commands.upgrade() else {
                return;
            };
            for (mutation, succeeded) in mutations.iter().zip(results) {
                let _ = commands.send(Command::FavouriteSynced {
                    track_id: mutation.track.id.clone(),
                    revision: mutation.revision,
                    succeeded,
                });
            }
        });
    }

    pub(super) async fn on_favourite_synced(&mut self, track_id: &str, revision: u64, succeeded: bool) {
        match self.library.complete_favourite(track_id, revision, succeeded).await {
            Ok(Some(SyncStatus::Failed)) => {
                tracing::warn!(track_id, revision, "Favourite kept locally, server sync failed");
            }
            Ok(Some(status)) => tracing::debug!(track_id, revision, ?status, "Favourite synced"),
            Ok(None) => {}
            Err(e) => tracing::warn!(track_id, error = %e, "Could not persist favourite sync state"),
        }
    }

    pub(super) async fn play_downloads(&mut self, start_index: usize) -> Result<()> {
        let granted = match self.media_library.request_permission().await {
            Ok(granted) => granted,
            Err(e) => {
                tracing::warn!(error = %e, "Media library permission request failed");
                false
            }
        };
        if !granted {
            return Err(PlayerError::PermissionDenied(MEDIA_LIBRARY.to_string()));
        }

        let songs = downloads::list(self.library.store())
            .await
            .map_err(|e| PlayerError::store(&e))?;
        let tracks: Vec<Track> = songs.iter().map(|s| s.playable()).collect();
        tracing::debug!(count = tracks.len(), start_index, "Playing downloads");
        self.start_queue(tracks, start_index, PlaybackSource::Downloads).await
    }

    pub(super) async fn open_deep_link(&mut self, url: &str) -> Result<()> {
        let track = super::parse_deep_link(url)?;
        tracing::info!(track_id = %track.id, "Opening shared track");
        self.start_queue(vec![track], 0, PlaybackSource::Share).await
    }

    pub(super) async fn clear_user_data(&mut self) -> Result<()> {
        self.library
            .clear_user_data()
            .await
            .map_err(|e| PlayerError::store(&e))?;
        tracing::info!("User data cleared");
        self.publish();
        Ok(())
    }
}

async fn sync_once(remote: &dyn FavouritesRemote, mutation: &FavouriteMutation, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, remote.sync(&mutation.track, mutation.liked)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!(track_id = %mutation.track.id, error = %e, "Favourites sync failed");
            false
        }
        Err(_) => {
            tracing::warn!(track_id = %mutation.track.id, "Favourites sync timed out");
            false
        }
    }
}
