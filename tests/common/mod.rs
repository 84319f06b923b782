//! Shared fixtures: a scripted resolver, a scripted favourites server and a
//! controller wired to the simulated session.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::broadcast;

use vibe_rs::api::{FavouritesRemote, SongResolver};
use vibe_rs::config::PlayerConfig;
use vibe_rs::model::{Notice, ResolvedSong, Track};
use vibe_rs::session::{FixedPermission, SimulatedSession};
use vibe_rs::store::MemoryStore;
use vibe_rs::{PlayerController, PlayerDeps};

pub const TRACK_LENGTH: Duration = Duration::from_secs(200);

/// Resolves every id to `https://cdn.test/<id>.m4a` unless told to fail it.
#[derive(Default)]
pub struct ScriptedResolver {
    failing: Mutex<HashSet<String>>,
    stalls: Mutex<HashMap<String, Duration>>,
    calls: AtomicUsize,
}

impl ScriptedResolver {
    pub fn fail(&self, id: &str) {
        self.failing.lock().unwrap().insert(id.to_string());
    }

    /// Makes every resolve of `id` take `delay`.
    pub fn stall(&self, id: &str, delay: Duration) {
        self.stalls.lock().unwrap().insert(id.to_string(), delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SongResolver for ScriptedResolver {
    async fn resolve(&self, track: &Track) -> Result<ResolvedSong> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let stall = self.stalls.lock().unwrap().get(&track.id).copied();
        if let Some(delay) = stall {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(&track.id) {
            bail!("song {} unavailable", track.id);
        }
        let mut song = ResolvedSong::from_url(format!("https://cdn.test/{}.m4a", track.id));
        song.duration_hint = Some(TRACK_LENGTH);
        Ok(song)
    }
}

/// Favourites server that records what it was sent.
#[derive(Default)]
pub struct ScriptedRemote {
    offline: AtomicBool,
    sent: Mutex<Vec<(String, bool)>>,
}

impl ScriptedRemote {
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(String, bool)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl FavouritesRemote for ScriptedRemote {
    async fn sync(&self, track: &Track, liked: bool) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            bail!("network unreachable");
        }
        self.sent.lock().unwrap().push((track.id.clone(), liked));
        Ok(())
    }
}

pub struct Options {
    pub signed_in: bool,
    pub permission: bool,
    pub lookahead: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            signed_in: true,
            permission: true,
            lookahead: 2,
        }
    }
}

pub struct Harness {
    pub controller: PlayerController,
    pub session: Arc<SimulatedSession>,
    pub resolver: Arc<ScriptedResolver>,
    pub remote: Arc<ScriptedRemote>,
    pub store: Arc<MemoryStore>,
    pub notices: broadcast::Receiver<Notice>,
}

impl Harness {
    pub async fn start() -> Self {
        Self::with(Options::default()).await
    }

    pub async fn with(options: Options) -> Self {
        let session = Arc::new(SimulatedSession::new());
        let resolver = Arc::new(ScriptedResolver::default());
        let remote = Arc::new(ScriptedRemote::default());
        let store = Arc::new(MemoryStore::new());
        let config = PlayerConfig {
            lookahead: options.lookahead,
            resolve_timeout_ms: 500,
            ..PlayerConfig::default()
        };

        let favourites_remote: Option<Arc<dyn FavouritesRemote>> = if options.signed_in {
            Some(remote.clone() as Arc<dyn FavouritesRemote>)
        } else {
            None
        };
        let controller = PlayerController::spawn(
            &config,
            PlayerDeps {
                session: session.clone(),
                resolver: resolver.clone(),
                favourites_remote,
                media_library: Arc::new(FixedPermission(options.permission)),
                store: store.clone(),
            },
        )
        .await
        .unwrap();
        let notices = controller.notices();

        Self {
            controller,
            session,
            resolver,
            remote,
            store,
            notices,
        }
    }

    /// Waits until every session event emitted so far has been handled.
    ///
    /// Native events are always drained before the next command, so a
    /// command round-trip is enough.
    pub async fn settle(&self) {
        self.controller.refresh_status().await.unwrap();
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        let mut notices = Vec::new();
        while let Ok(notice) = self.notices.try_recv() {
            notices.push(notice);
        }
        notices
    }

    pub fn current_id(&self) -> Option<String> {
        self.controller.now_playing().current_id().map(str::to_string)
    }

    pub fn count_calls(&self, operation: &str) -> usize {
        self.session
            .calls()
            .iter()
            .filter(|c| c.as_str() == operation || c.starts_with(&format!("{operation}(")))
            .count()
    }
}

pub fn tracks(ids: &[&str]) -> Vec<Track> {
    ids.iter()
        .map(|id| Track::new(*id, format!("Song {id}"), "Artist"))
        .collect()
}

/// Polls `check` for up to a second, yielding to spawned tasks in between.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
