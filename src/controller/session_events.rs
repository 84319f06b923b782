//! Reconciliation of native session events

use crate::model::{Notice, RepeatMode};
use crate::session::SessionEvent;

use super::playback::session_call;
use super::Orchestrator;

const PLAYBACK_ERROR_MESSAGE: &str = "Error playing song";

impl Orchestrator {
    pub(super) async fn handle_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::ActiveTrackChanged { index, track_id } => {
                tracing::debug!(?index, ?track_id, "SessionEvent::ActiveTrackChanged");
                self.reconcile_active(track_id).await;
            }
            SessionEvent::QueueEnded { track_index } => {
                tracing::debug!(?track_index, "SessionEvent::QueueEnded");
                self.handle_queue_ended().await;
            }
            SessionEvent::PlaybackError { message } => {
                tracing::error!(message = %message, "SessionEvent::PlaybackError");
                self.notify(Notice::Toast(PLAYBACK_ERROR_MESSAGE.to_string()));
            }
            SessionEvent::StateChanged(state) => {
                tracing::trace!(?state, "SessionEvent::StateChanged");
                self.status.state = state.into();
                self.publish();
            }
            SessionEvent::Progress(progress) => {
                tracing::trace!(position_ms = progress.position.as_millis() as u64, "SessionEvent::Progress");
                self.status.update_progress(progress.position, progress.duration);
                self.publish();
            }
            SessionEvent::RemotePlay => {
                let result = self.play().await;
                self.report_remote("play", result);
            }
            SessionEvent::RemotePause => {
                let result = self.pause().await;
                self.report_remote("pause", result);
            }
            SessionEvent::RemoteNext => {
                let result = self.next().await;
                self.report_remote("next", result);
            }
            SessionEvent::RemotePrevious => {
                let result = self.previous().await;
                self.report_remote("previous", result);
            }
            SessionEvent::RemoteSeek(seconds) => {
                let result = self.remote_seek(seconds).await;
                self.report_remote("seek", result);
            }
        }
    }

    fn report_remote(&self, control: &'static str, result: crate::error::Result<()>) {
        match result {
            Ok(()) => tracing::debug!(control, "Remote control handled"),
            Err(e) => self.report_failure(&e),
        }
    }

    /// Seeks, then resumes playback if the session was paused.
    async fn remote_seek(&mut self, seconds: f64) -> crate::error::Result<()> {
        self.seek_to(seconds).await?;
        let state = session_call("state", self.session.state()).await?;
        if !state.is_active() {
            session_call("play", self.session.play()).await?;
        }
        Ok(())
    }

    /// Aligns the current entry with the track the native session is playing.
    ///
    /// The session is queried rather than trusting the event payload, so a
    /// stale event (one the orchestrator caused itself, or one overtaken by a
    /// later skip) resolves to the same track and changes nothing.
    pub(super) async fn reconcile_active(&mut self, hint: Option<String>) {
        if self.queue.is_none() {
            tracing::trace!("No queue, ignoring active track change");
            return;
        }

        let (position, active_id) = match self.live_active().await {
            Ok(Some((position, id))) => (Some(position), id),
            Ok(None) => {
                tracing::trace!("Native session has no active track");
                return;
            }
            Err(e) => match hint {
                Some(id) => {
                    tracing::warn!(error = %e, "Could not query active track, using event payload");
                    (None, id)
                }
                None => return,
            },
        };
        let Some(queue) = self.queue.as_ref() else {
            return;
        };
        let Some(index) = queue.find(&active_id) else {
            tracing::warn!(track_id = %active_id, "Active track is not in the queue, ignoring");
            return;
        };
        let current = queue.current_index();
        if current == Some(index) {
            tracing::trace!(index, "Active track unchanged");
            return;
        }

        if let Some(target) = self.unloaded_continuation(position, index) {
            tracing::info!(from = ?current, target, "Native session wrapped early, continuing the queue");
            if let Err(e) = self.jump_to(target).await {
                self.report_failure(&e);
            }
            return;
        }

        tracing::info!(from = ?current, to = index, "Native session moved to another track");
        self.commit_current(index).await;
    }

    /// With queue repeat the native player wraps at the end of what it holds,
    /// which is only a prefix of the logical queue. A jump back to native
    /// position 0 while playable entries remain after the current one is such
    /// a wrap; returns the entry playback should continue with instead.
    fn unloaded_continuation(&self, position: Option<usize>, index: usize) -> Option<usize> {
        if self.repeat != RepeatMode::Queue || position != Some(0) {
            return None;
        }
        let queue = self.queue.as_ref()?;
        let current = queue.current_index().filter(|&c| index < c)?;
        queue.next_playable_after(current)
    }

    /// Native position and id of the active track.
    async fn live_active(&self) -> crate::error::Result<Option<(usize, String)>> {
        let Some(position) = session_call("active_track_index", self.session.active_track_index()).await? else {
            return Ok(None);
        };
        let native = session_call("queue", self.session.queue()).await?;
        Ok(native.get(position).map(|t| (position, t.id.clone())))
    }

    /// The native queue ran out: continue with the logical queue, wrap, or go idle.
    async fn handle_queue_ended(&mut self) {
        if self.queue.is_none() {
            return;
        }

        let native = session_call("queue", self.session.queue()).await;
        let active = session_call("active_track_index", self.session.active_track_index()).await;
        if let (Ok(native), Ok(Some(active))) = (&native, &active) {
            if active + 1 < native.len() {
                tracing::debug!(active, native_len = native.len(), "Native queue still has tracks, ignoring");
                return;
            }
        }

        self.reconcile_active(None).await;

        let Some(queue) = self.queue.as_ref() else {
            return;
        };
        let next = queue.current_index().and_then(|c| queue.next_playable_after(c));
        let wrap = queue.first_playable();

        let result = match next {
            Some(target) => {
                tracing::info!(target, "Native queue ended early, continuing");
                self.jump_to(target).await
            }
            None if self.repeat == RepeatMode::Queue => match wrap {
                Some(first) => {
                    tracing::info!("Queue ended, repeating from the start");
                    self.jump_to(first).await
                }
                None => Ok(()),
            },
            None => {
                tracing::info!("Queue ended");
                if let Err(e) = session_call("reset", self.session.reset()).await {
                    self.report_failure(&e);
                }
                self.mark_idle();
                Ok(())
            }
        };

        if let Err(e) = result {
            self.report_failure(&e);
        }
    }
}
