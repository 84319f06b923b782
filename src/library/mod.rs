//! Library state persisted in the preference store
//!
//! - `recents`: recently played tracks
//! - `favourites`: liked tracks and their sync state
//! - `downloads`: index of songs saved on the device
//! - `home_feed`: cached home feed with expiry

pub mod downloads;
mod favourites;
pub mod home_feed;
mod recents;

use std::sync::Arc;

use anyhow::Result;

use crate::model::Track;
use crate::store::PreferenceStore;

pub use downloads::DownloadedSong;
pub use favourites::{FavouriteMutation, Favourites, SyncStatus, FAVOURITES_KEY, FAVOURITES_SYNC_KEY};
pub use home_feed::CachedFeed;
pub use recents::{RecentlyPlayed, RECENTS_KEY};

/// Recently played and favourites, loaded once per player session.
pub struct Library {
    pub(crate) store: Arc<dyn PreferenceStore>,
    pub recents: RecentlyPlayed,
    pub favourites: Favourites,
}

impl Library {
    pub async fn load(store: Arc<dyn PreferenceStore>, recents_limit: usize) -> Result<Self> {
        let recents = RecentlyPlayed::load(store.as_ref(), recents_limit).await?;
        let favourites = match Favourites::load(store.as_ref()).await {
            Ok(favourites) => favourites,
            Err(e) => {
                tracing::warn!(error = %e, "Favourites unreadable, starting empty");
                Favourites::load(&crate::store::MemoryStore::new()).await?
            }
        };
        tracing::debug!(
            recents = recents.tracks().len(),
            favourites = favourites.tracks().len(),
            "Library loaded"
        );
        Ok(Self { store, recents, favourites })
    }

    pub fn store(&self) -> &dyn PreferenceStore {
        self.store.as_ref()
    }

    pub async fn record_played(&mut self, track: &Track) -> Result<()> {
        self.recents.record(self.store.as_ref(), track).await
    }

    pub async fn toggle_favourite(&mut self, track: &Track, remote: bool) -> Result<FavouriteMutation> {
        self.favourites.toggle(self.store.as_ref(), track, remote).await
    }

    pub async fn complete_favourite(&mut self, track_id: &str, revision: u64, succeeded: bool) -> Result<Option<SyncStatus>> {
        self.favourites
            .complete(self.store.as_ref(), track_id, revision, succeeded)
            .await
    }

    pub async fn requeue_failed_favourites(&mut self) -> Result<Vec<FavouriteMutation>> {
        self.favourites.requeue_failed(self.store.as_ref()).await
    }

    /// Forgets user data on sign-out.
    pub async fn clear_user_data(&mut self) -> Result<()> {
        self.store
            .multi_remove(&[RECENTS_KEY, FAVOURITES_KEY, FAVOURITES_SYNC_KEY])
            .await?;
        self.recents.clear();
        self.favourites.clear();
        Ok(())
    }
}
