//! Favourites with per-track sync state
//!
//! The local list is the source of truth for the UI. Each like/unlike records
//! a mutation that moves from `pending` to `confirmed` or `failed` when the
//! server answers; the answer never rewrites the local list.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Track;
use crate::store::{get_json, set_json, PreferenceStore};

pub const FAVOURITES_KEY: &str = "favourites";
pub const FAVOURITES_SYNC_KEY: &str = "favourites_sync";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// No remote account; nothing to send.
    LocalOnly,
    Pending,
    Confirmed,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FavouriteMutation {
    pub track: Track,
    pub liked: bool,
    pub status: SyncStatus,
    pub revision: u64,
    pub updated_at: DateTime<Utc>,
}

pub struct Favourites {
    tracks: Vec<Track>,
    mutations: HashMap<String, FavouriteMutation>,
    revision: u64,
}

struct Snapshot {
    tracks: Vec<Track>,
    mutations: HashMap<String, FavouriteMutation>,
    revision: u64,
}

impl Favourites {
    pub async fn load(store: &dyn PreferenceStore) -> Result<Self> {
        let tracks: Vec<Track> = get_json(store, FAVOURITES_KEY).await?.unwrap_or_default();
        let mutations: Vec<FavouriteMutation> = get_json(store, FAVOURITES_SYNC_KEY).await?.unwrap_or_default();
        let revision = mutations.iter().map(|m| m.revision).max().unwrap_or(0);

        Ok(Self {
            tracks,
            mutations: mutations.into_iter().map(|m| (m.track.id.clone(), m)).collect(),
            revision,
        })
    }

    pub fn is_liked(&self, track_id: &str) -> bool {
        self.tracks.iter().any(|t| t.id == track_id)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn mutation(&self, track_id: &str) -> Option<&FavouriteMutation> {
        self.mutations.get(track_id)
    }

    /// Flips the local state right away and records a mutation to sync.
    ///
    /// Nothing changes when the store rejects the write, so a pending
    /// mutation always has a sync on its way.
    pub async fn toggle(&mut self, store: &dyn PreferenceStore, track: &Track, remote: bool) -> Result<FavouriteMutation> {
        let before = self.snapshot();
        let liked = !self.is_liked(&track.id);
        if liked {
            let mut entry = track.clone();
            entry.stream_url = None;
            self.tracks.push(entry);
        } else {
            self.tracks.retain(|t| t.id != track.id);
        }

        let status = if remote { SyncStatus::Pending } else { SyncStatus::LocalOnly };
        let mutation = self.record(track, liked, status);
        if let Err(e) = self.persist(store).await {
            self.restore(before);
            return Err(e);
        }
        Ok(mutation)
    }

    /// Settles a sync result. Answers for superseded revisions are ignored.
    pub async fn complete(
        &mut self,
        store: &dyn PreferenceStore,
        track_id: &str,
        revision: u64,
        succeeded: bool,
    ) -> Result<Option<SyncStatus>> {
        let Some(mutation) = self.mutations.get_mut(track_id) else {
            return Ok(None);
        };
        if mutation.revision != revision {
            tracing::debug!(track_id, revision, current = mutation.revision, "Stale favourites sync result ignored");
            return Ok(None);
        }

        mutation.status = if succeeded { SyncStatus::Confirmed } else { SyncStatus::Failed };
        mutation.updated_at = Utc::now();
        let status = mutation.status;
        set_json(store, FAVOURITES_SYNC_KEY, &self.mutation_list()).await?;
        Ok(Some(status))
    }

    /// Puts every failed mutation back to pending under a new revision.
    pub async fn requeue_failed(&mut self, store: &dyn PreferenceStore) -> Result<Vec<FavouriteMutation>> {
        let before = self.snapshot();
        let failed: Vec<(Track, bool)> = self
            .mutations
            .values()
            .filter(|m| m.status == SyncStatus::Failed)
            .map(|m| (m.track.clone(), m.liked))
            .collect();

        let requeued: Vec<FavouriteMutation> = failed
            .into_iter()
            .map(|(track, liked)| self.record(&track, liked, SyncStatus::Pending))
            .collect();

        if !requeued.is_empty() {
            if let Err(e) = set_json(store, FAVOURITES_SYNC_KEY, &self.mutation_list()).await {
                self.restore(before);
                return Err(e);
            }
        }
        Ok(requeued)
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
        self.mutations.clear();
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            tracks: self.tracks.clone(),
            mutations: self.mutations.clone(),
            revision: self.revision,
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.tracks = snapshot.tracks;
        self.mutations = snapshot.mutations;
        self.revision = snapshot.revision;
    }

    fn record(&mut self, track: &Track, liked: bool, status: SyncStatus) -> FavouriteMutation {
        self.revision += 1;
        let mutation = FavouriteMutation {
            track: Track { stream_url: None, ..track.clone() },
            liked,
            status,
            revision: self.revision,
            updated_at: Utc::now(),
        };
        self.mutations.insert(track.id.clone(), mutation.clone());
        mutation
    }

    fn mutation_list(&self) -> Vec<&FavouriteMutation> {
        let mut list: Vec<_> = self.mutations.values().collect();
        list.sort_by_key(|m| m.revision);
        list
    }

    async fn persist(&self, store: &dyn PreferenceStore) -> Result<()> {
        set_json(store, FAVOURITES_KEY, &self.tracks).await?;
        set_json(store, FAVOURITES_SYNC_KEY, &self.mutation_list()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn like_is_local_before_the_server_answers() {
        let store = MemoryStore::new();
        let mut favourites = Favourites::load(&store).await.unwrap();
        let track = Track::new("a", "A", "artist");

        let mutation = favourites.toggle(&store, &track, true).await.unwrap();
        assert!(favourites.is_liked("a"));
        assert_eq!(mutation.status, SyncStatus::Pending);

        let status = favourites.complete(&store, "a", mutation.revision, false).await.unwrap();
        assert_eq!(status, Some(SyncStatus::Failed));
        assert!(favourites.is_liked("a"), "a failed sync must not revert the like");

        let reloaded = Favourites::load(&store).await.unwrap();
        assert!(reloaded.is_liked("a"));
        assert_eq!(reloaded.mutation("a").map(|m| m.status), Some(SyncStatus::Failed));
    }

    #[tokio::test]
    async fn newer_mutation_supersedes_older_answer() {
        let store = MemoryStore::new();
        let mut favourites = Favourites::load(&store).await.unwrap();
        let track = Track::new("a", "A", "artist");

        let like = favourites.toggle(&store, &track, true).await.unwrap();
        let unlike = favourites.toggle(&store, &track, true).await.unwrap();

        assert_eq!(favourites.complete(&store, "a", like.revision, true).await.unwrap(), None);
        assert_eq!(favourites.mutation("a").map(|m| m.status), Some(SyncStatus::Pending));
        assert_eq!(
            favourites.complete(&store, "a", unlike.revision, true).await.unwrap(),
            Some(SyncStatus::Confirmed)
        );
        assert!(!favourites.is_liked("a"));
    }

    #[tokio::test]
    async fn failed_mutations_are_requeued_with_new_revisions() {
        let store = MemoryStore::new();
        let mut favourites = Favourites::load(&store).await.unwrap();
        let like = favourites.toggle(&store, &Track::new("a", "A", "x"), true).await.unwrap();
        favourites.complete(&store, "a", like.revision, false).await.unwrap();

        let requeued = favourites.requeue_failed(&store).await.unwrap();
        assert_eq!(requeued.len(), 1);
        assert!(requeued[0].revision > like.revision);
        assert_eq!(requeued[0].status, SyncStatus::Pending);
    }

    /// Accepts reads, refuses every write.
    struct ReadOnlyStore(MemoryStore);

    #[async_trait]
    impl PreferenceStore for ReadOnlyStore {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            self.0.get(key).await
        }

        async fn set(&self, key: &str, _value: String) -> Result<()> {
            anyhow::bail!("disk full writing '{key}'")
        }

        async fn multi_remove(&self, _keys: &[&str]) -> Result<()> {
            anyhow::bail!("disk full")
        }
    }

    #[tokio::test]
    async fn rejected_write_leaves_favourites_untouched() {
        let store = MemoryStore::new();
        let mut favourites = Favourites::load(&store).await.unwrap();
        let like = favourites.toggle(&store, &Track::new("a", "A", "x"), true).await.unwrap();
        favourites.complete(&store, "a", like.revision, false).await.unwrap();

        let read_only = ReadOnlyStore(store);
        assert!(favourites.toggle(&read_only, &Track::new("b", "B", "x"), true).await.is_err());
        assert!(!favourites.is_liked("b"));
        assert!(favourites.mutation("b").is_none());

        assert!(favourites.requeue_failed(&read_only).await.is_err());
        assert_eq!(favourites.mutation("a").map(|m| m.status), Some(SyncStatus::Failed));

        let retried = favourites.requeue_failed(&read_only.0).await.unwrap();
        assert_eq!(retried.len(), 1);
        assert_eq!(retried[0].revision, like.revision + 1);
    }

    #[tokio::test]
    async fn without_an_account_mutations_stay_local() {
        let store = MemoryStore::new();
        let mut favourites = Favourites::load(&store).await.unwrap();
        let mutation = favourites.toggle(&store, &Track::new("a", "A", "x"), false).await.unwrap();
        assert_eq!(mutation.status, SyncStatus::LocalOnly);
    }
}
