//! Look-ahead resolution of upcoming tracks
//!
//! Keeps up to `lookahead` entries after the current one loaded in the native
//! session. Resolver calls run in spawned tasks and report back through the
//! command channel; results for an older queue generation are dropped.

use crate::api::with_retry;
use crate::model::{EntryState, Track};

use super::{Command, Orchestrator};

impl Orchestrator {
    /// Appends whatever is already resolved, then starts resolving more if the window is short.
    pub(super) async fn prefetch_upcoming(&mut self) {
        self.flush_resolved().await;

        let Some(queue) = self.queue.as_mut() else {
            return;
        };
        let in_pipeline = queue.pipeline_ahead();
        if in_pipeline >= self.lookahead {
            return;
        }

        let generation = queue.generation();
        let mut requests = Vec::new();
        for index in queue.prefetch_candidates(self.lookahead - in_pipeline) {
            if let Some(track) = queue.track(index).cloned() {
                queue.set_state(index, EntryState::Resolving);
                requests.push((index, track));
            }
        }

        for (index, track) in requests {
            tracing::debug!(generation, index, track_id = %track.id, "Prefetching track");
            self.spawn_resolve(generation, index, track);
        }
    }

    fn spawn_resolve(&self, generation: u64, index: usize, track: Track) {
        let resolver = self.resolver.clone();
        let commands = self.commands.clone();
        let timeout = self.resolve_timeout;

        tokio::spawn(async move {
            let result = with_retry("prefetch", timeout, || resolver.resolve(&track))
                .await
                .map(|song| track.resolved_with(song))
                .map_err(|e| format!("{e:#}"));
            if let Some(commands) = commands.upgrade() {
                let _ = commands.send(Command::PrefetchFinished { generation, index, result });
            }
        });
    }

    pub(super) async fn on_prefetch_finished(
        &mut self,
        generation: u64,
        index: usize,
        result: Result<Track, String>,
    ) {
        let Some(queue) = self.queue.as_mut().filter(|q| q.generation() == generation) else {
            tracing::debug!(generation, index, "Dropping prefetch result for an old queue");
            return;
        };
        // Navigation may have resolved and loaded the entry in the meantime.
        if queue.state(index) != Some(EntryState::Resolving) {
            return;
        }

        match result {
            Ok(track) => {
                tracing::debug!(index, track_id = %track.id, "Prefetch resolved");
                queue.store_resolved(index, track);
            }
            Err(reason) => {
                tracing::warn!(index, reason = %reason, "Prefetch failed, entry will be skipped");
                queue.set_state(index, EntryState::Failed);
            }
        }

        self.prefetch_upcoming().await;
        self.publish();
    }

    /// Appends resolved entries that directly follow the loaded window.
    async fn flush_resolved(&mut self) {
        // Idle: the session was reset and stays empty until playback restarts.
        let Some(queue) = self.queue.as_mut().filter(|q| q.current_index().is_some()) else {
            return;
        };
        let ready = queue.appendable();
        if ready.is_empty() {
            return;
        }
        let tracks: Vec<Track> = ready.iter().filter_map(|&i| queue.track(i).cloned()).collect();

        let result = self.session.add(tracks).await;
        crate::log_session_result!("add", result);
        match result {
            Ok(()) => {
                for index in ready {
                    queue.mark_loaded(index);
                }
            }
            // Left resolved; the next flush tries again.
            Err(e) => tracing::warn!(error = %e, count = ready.len(), "Could not append upcoming tracks"),
        }
    }
}
