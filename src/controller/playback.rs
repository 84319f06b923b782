//! Playback control methods

use std::future::Future;
use std::time::Duration;

use crate::api::with_retry;
use crate::error::{PlayerError, Result};
use crate::model::{EntryState, LogicalQueue, PlaybackSource, PlaybackState, PlaybackStatus, RepeatMode, Track};

use super::Orchestrator;

/// Awaits a native session call and maps its failure to [`PlayerError::Session`].
pub(super) async fn session_call<T>(
    operation: &'static str,
    call: impl Future<Output = anyhow::Result<T>>,
) -> Result<T> {
    let result = call.await;
    crate::log_session_result!(operation, result);
    result.map_err(|e| PlayerError::session(operation, &e))
}

impl Orchestrator {
    pub(super) async fn start_queue(
        &mut self,
        tracks: Vec<Track>,
        start_index: usize,
        source: PlaybackSource,
    ) -> Result<()> {
        if tracks.is_empty() {
            return Err(PlayerError::EmptyQueue);
        }
        if start_index >= tracks.len() {
            return Err(PlayerError::StartIndexOutOfRange {
                index: start_index,
                len: tracks.len(),
            });
        }

        let generation = self.generation + 1;
        let mut queue = LogicalQueue::from_slice(&tracks, start_index, source, generation);
        tracing::info!(generation, len = queue.len(), source = %queue.source(), "Starting queue");

        // Resolve before touching the session: a failure here keeps the old queue playing.
        let first = match queue.track(0) {
            Some(track) => self.resolve_track(track).await?,
            None => return Err(PlayerError::EmptyQueue),
        };
        queue.store_resolved(0, first.clone());

        session_call("reset", self.session.reset()).await?;
        if let Some(previous) = self.queue.as_mut() {
            previous.unload_all();
        }
        self.apply_repeat_mode().await;
        if let Err(e) = self.load_first(first).await {
            // The old queue is gone from the session and the new one never started.
            tracing::warn!(generation, error = %e, "New queue failed to start, stopping playback");
            let _ = session_call("reset", self.session.reset()).await;
            self.mark_idle();
            return Err(e);
        }
        queue.mark_loaded(0);

        self.generation = generation;
        self.queue = Some(queue);
        self.commit_current(0).await;
        Ok(())
    }

    async fn load_first(&self, first: Track) -> Result<()> {
        session_call("add", self.session.add(vec![first])).await?;
        session_call("play", self.session.play()).await
    }

    pub(super) async fn play_pause(&mut self) -> Result<()> {
        let state = session_call("state", self.session.state()).await?;
        tracing::debug!(?state, "Toggling playback");
        if state.is_active() {
            self.pause().await
        } else {
            self.play().await
        }
    }

    /// Resumes playback. After the queue ran out, starts it again from the top.
    pub(super) async fn play(&mut self) -> Result<()> {
        let restart = self
            .queue
            .as_ref()
            .filter(|q| q.current_index().is_none())
            .and_then(|q| q.first_playable());
        match restart {
            Some(first) => {
                tracing::info!("Restarting finished queue");
                self.jump_to(first).await
            }
            None => session_call("play", self.session.play()).await,
        }
    }

    pub(super) async fn pause(&mut self) -> Result<()> {
        session_call("pause", self.session.pause()).await
    }

    pub(super) async fn next(&mut self) -> Result<()> {
        let Some(queue) = self.queue.as_ref() else {
            tracing::debug!("Next requested without a queue");
            return Ok(());
        };
        let Some(current) = queue.current_index() else {
            return Ok(());
        };

        match queue.next_playable_after(current) {
            Some(target) => self.jump_to(target).await,
            None if self.repeat == RepeatMode::Queue => match queue.first_playable() {
                Some(first) => {
                    tracing::info!("End of queue, wrapping to the start");
                    self.jump_to(first).await
                }
                None => Ok(()),
            },
            None => {
                tracing::info!("End of queue, stopping");
                session_call("reset", self.session.reset()).await?;
                self.mark_idle();
                Ok(())
            }
        }
    }

    pub(super) async fn previous(&mut self) -> Result<()> {
        let target = self
            .queue
            .as_ref()
            .and_then(|q| q.current_index().and_then(|current| q.previous_playable_before(current)));
        match target {
            Some(target) => self.jump_to(target).await,
            None => {
                tracing::debug!("Already at the start of the queue");
                Ok(())
            }
        }
    }

    pub(super) async fn seek_to(&mut self, seconds: f64) -> Result<()> {
        let position = self.validate_seek(seconds).await?;
        // Position is picked up from the session's progress report.
        session_call("seek_to", self.session.seek_to(position)).await
    }

    pub(super) async fn validate_seek(&self, seconds: f64) -> Result<Duration> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(PlayerError::InvalidSeek(seconds));
        }
        if self.queue.as_ref().and_then(|q| q.current_track()).is_none() {
            return Err(PlayerError::NothingPlaying);
        }
        let duration = match self.session.progress().await {
            Ok(progress) if !progress.duration.is_zero() => progress.duration,
            _ => self.status.duration,
        };
        let position = Duration::from_secs_f64(seconds);
        if !duration.is_zero() && position > duration {
            return Err(PlayerError::InvalidSeek(seconds));
        }
        Ok(position)
    }

    pub(super) async fn toggle_repeat(&mut self) -> Result<RepeatMode> {
        let next = self.repeat.cycle();
        session_call("set_repeat_mode", self.session.set_repeat_mode(next.native())).await?;
        self.repeat = next;
        self.status.repeat = next;
        tracing::info!(mode = next.label(), "Repeat mode changed");
        self.publish();
        Ok(next)
    }

    pub(super) async fn refresh_status(&mut self) -> Result<PlaybackStatus> {
        let state = session_call("state", self.session.state()).await?;
        let progress = session_call("progress", self.session.progress()).await?;
        self.status.state = state.into();
        self.status.update_progress(progress.position, progress.duration);
        self.publish();
        Ok(self.status.clone())
    }

    /// Makes `target` the playing entry, loading it into the session first if needed.
    pub(super) async fn jump_to(&mut self, target: usize) -> Result<()> {
        let position = self.ensure_loaded(target).await?;
        session_call("skip", self.session.skip(position)).await?;
        session_call("play", self.session.play()).await?;
        self.commit_current(target).await;
        Ok(())
    }

    /// Points the queue at `index` and runs the side effects of a track change.
    pub(super) async fn commit_current(&mut self, index: usize) {
        let Some(queue) = self.queue.as_mut() else {
            return;
        };
        if !queue.set_current(index) {
            return;
        }
        let Some(track) = queue.current_track().cloned() else {
            return;
        };
        tracing::info!(index, track_id = %track.id, title = %track.title, "Now playing");

        self.status.position = Duration::ZERO;
        self.status.duration = track.duration.unwrap_or_default();
        if let Err(e) = self.library.record_played(&track).await {
            tracing::warn!(error = %e, "Could not update recently played");
        }
        self.publish();
        self.prefetch_upcoming().await;
    }

    /// Nothing current, nothing loaded. The entries are kept for a later restart.
    pub(super) fn mark_idle(&mut self) {
        if let Some(queue) = self.queue.as_mut() {
            queue.clear_current();
            queue.unload_all();
        }
        self.status.state = PlaybackState::Stopped;
        self.status.position = Duration::ZERO;
        self.publish();
    }

    /// The track with its stream URL, calling the resolver (with one retry) when needed.
    pub(super) async fn resolve_track(&self, track: &Track) -> Result<Track> {
        if track.is_resolved() {
            return Ok(track.clone());
        }
        let resolver = &self.resolver;
        match with_retry("resolve", self.resolve_timeout, || resolver.resolve(track)).await {
            Ok(song) => Ok(track.resolved_with(song)),
            Err(e) => {
                tracing::warn!(track_id = %track.id, error = %e, "Could not resolve track");
                Err(PlayerError::resolve(&track.id, &e))
            }
        }
    }

    async fn apply_repeat_mode(&self) {
        // A failure is logged by session_call; the mode is sent again on the next toggle.
        let _ = session_call("set_repeat_mode", self.session.set_repeat_mode(self.repeat.native())).await;
    }

    /// Loads `target` into the native session if it is not there yet and
    /// returns its position in the native queue.
    async fn ensure_loaded(&mut self, target: usize) -> Result<usize> {
        let queue = self.queue.as_ref().ok_or(PlayerError::EmptyQueue)?;
        let track = queue.track(target).cloned().ok_or(PlayerError::StartIndexOutOfRange {
            index: target,
            len: queue.len(),
        })?;
        let state = queue.state(target);

        if state != Some(EntryState::Loaded) {
            if state != Some(EntryState::Resolved) {
                match self.resolve_track(&track).await {
                    Ok(resolved) => {
                        if let Some(queue) = self.queue.as_mut() {
                            queue.store_resolved(target, resolved);
                        }
                    }
                    Err(e) => {
                        if let Some(queue) = self.queue.as_mut() {
                            queue.set_state(target, EntryState::Failed);
                        }
                        return Err(e);
                    }
                }
            }
            self.load_into_session(target).await?;
        }

        self.native_position(target).await
    }

    async fn load_into_session(&mut self, target: usize) -> Result<()> {
        let queue = self.queue.as_mut().ok_or(PlayerError::EmptyQueue)?;
        let Some(track) = queue.track(target).cloned() else {
            return Ok(());
        };

        if queue.last_loaded().is_none_or(|last| target > last) {
            session_call("add", self.session.add(vec![track])).await?;
            queue.mark_loaded(target);
            return Ok(());
        }

        // Behind the loaded window: rebuild the native queue in logical order.
        queue.mark_loaded(target);
        let tracks = queue.loaded_tracks();
        tracing::debug!(target, loaded = tracks.len(), "Rebuilding native queue");
        if let Err(e) = session_call("set_queue", self.session.set_queue(tracks)).await {
            queue.set_state(target, EntryState::Resolved);
            return Err(e);
        }
        Ok(())
    }

    /// Native position of a loaded entry.
    ///
    /// The native queue holds exactly the loaded entries in logical order, so
    /// the position is the count of loaded entries before `target`. When the
    /// session disagrees, it is searched by id, and as a last resort rebuilt.
    async fn native_position(&mut self, target: usize) -> Result<usize> {
        let queue = self.queue.as_ref().ok_or(PlayerError::EmptyQueue)?;
        let id = queue.track(target).map(|t| t.id.clone()).unwrap_or_default();
        let expected = (0..target)
            .filter(|&i| queue.state(i) == Some(EntryState::Loaded))
            .count();
        let loaded = queue.loaded_tracks();

        let native = session_call("queue", self.session.queue()).await?;
        if native.get(expected).is_some_and(|t| t.id == id) {
            return Ok(expected);
        }
        if let Some(position) = native.iter().position(|t| t.id == id) {
            tracing::warn!(target, expected, position, "Native queue out of order");
            return Ok(position);
        }

        tracing::warn!(target, native_len = native.len(), "Track missing from native queue, reloading");
        session_call("set_queue", self.session.set_queue(loaded)).await?;
        Ok(expected)
    }
}
