//! Controller module - the playback orchestrator
//!
//! A single task owns the logical queue, the library and the derived playback
//! status. UI intents reach it as commands through [`PlayerController`];
//! native session events arrive on the session's event channel. Both are
//! handled one at a time, native events first, so two reconciliations never
//! interleave.
//!
//! - `playback`: transport operations and queue navigation
//! - `session_events`: reconciliation of native events
//! - `prefetch`: look-ahead resolution of upcoming tracks
//! - `library`: favourites, recently played and downloads
//! - `deep_link`: share links turned into a playable track

mod deep_link;
mod library;
mod playback;
mod prefetch;
mod session_events;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::api::{FavouritesRemote, SongResolver};
use crate::config::PlayerConfig;
use crate::error::{PlayerError, Result};
use crate::library::{Library, SyncStatus};
use crate::model::{LogicalQueue, Notice, NowPlaying, PlaybackSource, PlaybackStatus, RepeatMode, Track};
use crate::session::{AudioSession, MediaLibrary, SessionEventChannel};
use crate::store::PreferenceStore;

pub use deep_link::parse_deep_link;

const NOTICE_CAPACITY: usize = 16;

/// External collaborators handed to the orchestrator for the lifetime of a session.
#[derive(Clone)]
pub struct PlayerDeps {
    pub session: Arc<dyn AudioSession>,
    pub resolver: Arc<dyn SongResolver>,
    /// `None` when nobody is signed in: favourites stay local.
    pub favourites_remote: Option<Arc<dyn FavouritesRemote>>,
    pub media_library: Arc<dyn MediaLibrary>,
    pub store: Arc<dyn PreferenceStore>,
}

type Reply<T> = oneshot::Sender<Result<T>>;

enum Command {
    StartQueue {
        tracks: Vec<Track>,
        start_index: usize,
        source: PlaybackSource,
        reply: Reply<()>,
    },
    PlayPause { reply: Reply<()> },
    Next { reply: Reply<()> },
    Previous { reply: Reply<()> },
    SeekTo { seconds: f64, reply: Reply<()> },
    ToggleRepeat { reply: Reply<RepeatMode> },
    RefreshStatus { reply: Reply<PlaybackStatus> },
    ToggleFavourite { track: Option<Track>, reply: Reply<bool> },
    RetryFavourites { reply: Reply<usize> },
    FavouriteStatus { track_id: String, reply: Reply<Option<SyncStatus>> },
    Favourites { reply: Reply<Vec<Track>> },
    RecentlyPlayed { reply: Reply<Vec<Track>> },
    PlayDownloads { start_index: usize, reply: Reply<()> },
    OpenDeepLink { url: String, reply: Reply<()> },
    ClearUserData { reply: Reply<()> },
    PrefetchFinished {
        generation: u64,
        index: usize,
        result: std::result::Result<Track, String>,
    },
    FavouriteSynced {
        track_id: String,
        revision: u64,
        succeeded: bool,
    },
    Shutdown { reply: oneshot::Sender<()> },
}

/// Handle used by the UI (and the remote-control service) to drive playback.
#[derive(Clone)]
pub struct PlayerController {
    commands: mpsc::UnboundedSender<Command>,
    now_playing: watch::Receiver<NowPlaying>,
    notices: broadcast::Sender<Notice>,
}

impl PlayerController {
    /// Loads the library, takes the session's event channel and starts the orchestrator task.
    pub async fn spawn(config: &PlayerConfig, deps: PlayerDeps) -> anyhow::Result<Self> {
        let events = deps
            .session
            .take_event_channel()
            .ok_or_else(|| anyhow::anyhow!("audio session events are already subscribed"))?;
        let library = Library::load(deps.store.clone(), config.recents_limit).await?;

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (now_playing_tx, now_playing_rx) = watch::channel(NowPlaying::default());
        let (notices_tx, _) = broadcast::channel(NOTICE_CAPACITY);

        let orchestrator = Orchestrator {
            session: deps.session,
            resolver: deps.resolver,
            favourites_remote: deps.favourites_remote,
            media_library: deps.media_library,
            library,
            queue: None,
            repeat: RepeatMode::Off,
            status: PlaybackStatus::default(),
            generation: 0,
            lookahead: config.lookahead,
            resolve_timeout: config.resolve_timeout(),
            commands: commands_tx.downgrade(),
            now_playing: now_playing_tx,
            notices: notices_tx.clone(),
        };

        tracing::info!(lookahead = config.lookahead, "Starting playback orchestrator");
        tokio::spawn(orchestrator.run(commands_rx, events));

        Ok(Self {
            commands: commands_tx,
            now_playing: now_playing_rx,
            notices: notices_tx,
        })
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands.send(make(reply)).map_err(|_| PlayerError::Closed)?;
        response.await.map_err(|_| PlayerError::Closed)?
    }

    /// Plays `tracks[start_index..]` as a new queue.
    pub async fn start_queue(&self, tracks: Vec<Track>, start_index: usize, source: PlaybackSource) -> Result<()> {
        self.request(|reply| Command::StartQueue { tracks, start_index, source, reply })
            .await
    }

    pub async fn play_pause(&self) -> Result<()> {
        self.request(|reply| Command::PlayPause { reply }).await
    }

    pub async fn next(&self) -> Result<()> {
        self.request(|reply| Command::Next { reply }).await
    }

    pub async fn previous(&self) -> Result<()> {
        self.request(|reply| Command::Previous { reply }).await
    }

    pub async fn seek_to(&self, seconds: f64) -> Result<()> {
        self.request(|reply| Command::SeekTo { seconds, reply }).await
    }

    /// Cycles the repeat mode and returns the new one.
    pub async fn toggle_repeat(&self) -> Result<RepeatMode> {
        self.request(|reply| Command::ToggleRepeat { reply }).await
    }

    /// Polls the native session for its state and progress.
    pub async fn refresh_status(&self) -> Result<PlaybackStatus> {
        self.request(|reply| Command::RefreshStatus { reply }).await
    }

    /// Likes or unlikes `track` (the current track when `None`). Returns the new liked state.
    pub async fn toggle_favourite(&self, track: Option<Track>) -> Result<bool> {
        self.request(|reply| Command::ToggleFavourite { track, reply }).await
    }

    /// Re-sends favourites whose sync failed. Returns how many were re-sent.
    pub async fn retry_failed_favourites(&self) -> Result<usize> {
        self.request(|reply| Command::RetryFavourites { reply }).await
    }

    pub async fn favourite_status(&self, track_id: &str) -> Result<Option<SyncStatus>> {
        let track_id = track_id.to_string();
        self.request(|reply| Command::FavouriteStatus { track_id, reply }).await
    }

    pub async fn favourites(&self) -> Result<Vec<Track>> {
        self.request(|reply| Command::Favourites { reply }).await
    }

    /// Most recent first.
    pub async fn recently_played(&self) -> Result<Vec<Track>> {
        self.request(|reply| Command::RecentlyPlayed { reply }).await
    }

    pub async fn play_downloads(&self, start_index: usize) -> Result<()> {
        self.request(|reply| Command::PlayDownloads { start_index, reply }).await
    }

    pub async fn open_deep_link(&self, url: &str) -> Result<()> {
        let url = url.to_string();
        self.request(|reply| Command::OpenDeepLink { url, reply }).await
    }

    pub async fn clear_user_data(&self) -> Result<()> {
        self.request(|reply| Command::ClearUserData { reply }).await
    }

    pub fn now_playing(&self) -> NowPlaying {
        self.now_playing.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<NowPlaying> {
        self.now_playing.clone()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    /// Stops the orchestrator task. In-flight prefetches finish on their own and are dropped.
    pub async fn shutdown(&self) {
        let (reply, done) = oneshot::channel();
        if self.commands.send(Command::Shutdown { reply }).is_ok() {
            let _ = done.await;
        }
    }
}

struct Orchestrator {
    session: Arc<dyn AudioSession>,
    resolver: Arc<dyn SongResolver>,
    favourites_remote: Option<Arc<dyn FavouritesRemote>>,
    media_library: Arc<dyn MediaLibrary>,
    library: Library,
    queue: Option<LogicalQueue>,
    repeat: RepeatMode,
    status: PlaybackStatus,
    generation: u64,
    lookahead: usize,
    resolve_timeout: Duration,
    /// Weak so that dropping every handle ends the task.
    commands: mpsc::WeakUnboundedSender<Command>,
    now_playing: watch::Sender<NowPlaying>,
    notices: broadcast::Sender<Notice>,
}

impl Orchestrator {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>, mut events: SessionEventChannel) {
        let mut events_open = true;
        loop {
            tokio::select! {
                biased;

                event = events.recv(), if events_open => match event {
                    Some(event) => self.handle_session_event(event).await,
                    None => {
                        tracing::warn!("Audio session event channel closed");
                        events_open = false;
                    }
                },
                command = commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
            }
        }
        tracing::info!("Playback orchestrator stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::StartQueue { tracks, start_index, source, reply } => {
                let result = self.start_queue(tracks, start_index, source).await;
                self.finish(reply, result);
            }
            Command::PlayPause { reply } => {
                let result = self.play_pause().await;
                self.finish(reply, result);
            }
            Command::Next { reply } => {
                let result = self.next().await;
                self.finish(reply, result);
            }
            Command::Previous { reply } => {
                let result = self.previous().await;
                self.finish(reply, result);
            }
            Command::SeekTo { seconds, reply } => {
                let result = self.seek_to(seconds).await;
                self.finish(reply, result);
            }
            Command::ToggleRepeat { reply } => {
                let result = self.toggle_repeat().await;
                self.finish(reply, result);
            }
            Command::RefreshStatus { reply } => {
                let result = self.refresh_status().await;
                self.finish(reply, result);
            }
            Command::ToggleFavourite { track, reply } => {
                let result = self.toggle_favourite(track).await;
                self.finish(reply, result);
            }
            Command::RetryFavourites { reply } => {
                let result = self.retry_failed_favourites().await;
                self.finish(reply, result);
            }
            Command::FavouriteStatus { track_id, reply } => {
                let status = self.library.favourites.mutation(&track_id).map(|m| m.status);
                let _ = reply.send(Ok(status));
            }
            Command::Favourites { reply } => {
                let _ = reply.send(Ok(self.library.favourites.tracks().to_vec()));
            }
            Command::RecentlyPlayed { reply } => {
                let _ = reply.send(Ok(self.library.recents.latest_first()));
            }
            Command::PlayDownloads { start_index, reply } => {
                let result = self.play_downloads(start_index).await;
                self.finish(reply, result);
            }
            Command::OpenDeepLink { url, reply } => {
                let result = self.open_deep_link(&url).await;
                self.finish(reply, result);
            }
            Command::ClearUserData { reply } => {
                let result = self.clear_user_data().await;
                self.finish(reply, result);
            }
            Command::PrefetchFinished { generation, index, result } => {
                self.on_prefetch_finished(generation, index, result).await;
            }
            Command::FavouriteSynced { track_id, revision, succeeded } => {
                self.on_favourite_synced(&track_id, revision, succeeded).await;
            }
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    /// Reports a failed intent to the user, then answers the caller.
    fn finish<T>(&self, reply: Reply<T>, result: Result<T>) {
        if let Err(e) = &result {
            self.report_failure(e);
        }
        let _ = reply.send(result);
    }

    fn report_failure(&self, error: &PlayerError) {
        tracing::warn!(error = %error, "Player operation failed");
        let notice = match error {
            PlayerError::PermissionDenied(_) => Notice::Alert(error.user_message()),
            _ => Notice::Toast(error.user_message()),
        };
        self.notify(notice);
    }

    fn notify(&self, notice: Notice) {
        // No subscriber is fine: the UI may be detached.
        let _ = self.notices.send(notice);
    }

    fn publish(&self) {
        let snapshot = match &self.queue {
            Some(queue) => {
                let track = queue.current_track().cloned();
                let index = queue.current_index().unwrap_or(0);
                let upcoming = match queue.current_index() {
                    Some(current) => queue.tracks().skip(current + 1).cloned().collect(),
                    None => Vec::new(),
                };
                NowPlaying {
                    liked: track.as_ref().is_some_and(|t| self.library.favourites.is_liked(&t.id)),
                    track,
                    index,
                    queue_len: queue.len(),
                    upcoming,
                    source: Some(queue.source().clone()),
                    status: self.status.clone(),
                }
            }
            None => NowPlaying {
                status: self.status.clone(),
                ..NowPlaying::default()
            },
        };
        self.now_playing.send_replace(snapshot);
    }
}
