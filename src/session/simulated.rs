//! In-process stand-in for the native audio session
//!
//! Keeps a queue, an active index and a transport state, and emits the same
//! events a mobile background player does. The headless binary plays through
//! it, and tests use its hooks to end tracks, inject remote controls or make
//! calls fail.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{AudioSession, MediaLibrary, NativeRepeatMode, NativeState, Progress, SessionEvent, SessionEventChannel};
use crate::model::Track;

#[derive(Default)]
struct Inner {
    queue: Vec<Track>,
    active: Option<usize>,
    state: NativeState,
    repeat: NativeRepeatMode,
    position: Duration,
    failing: HashSet<&'static str>,
    calls: Vec<String>,
}

pub struct SimulatedSession {
    inner: Mutex<Inner>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: Mutex<Option<SessionEventChannel>>,
}

impl SimulatedSession {
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            inner: Mutex::new(Inner::default()),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs `operation` unless it was made to fail, recording the call.
    fn call<T>(&self, operation: &'static str, detail: String, f: impl FnOnce(&mut Inner) -> Result<(T, Vec<SessionEvent>)>) -> Result<T> {
        let (value, events) = {
            let mut inner = self.lock();
            inner.calls.push(if detail.is_empty() { operation.to_string() } else { format!("{operation}({detail})") });
            if inner.failing.contains(operation) {
                bail!("{operation}: native session unavailable");
            }
            f(&mut *inner)?
        };
        for event in events {
            self.emit(event);
        }
        Ok(value)
    }

    fn active_changed(inner: &Inner) -> SessionEvent {
        SessionEvent::ActiveTrackChanged {
            index: inner.active,
            track_id: inner.active.and_then(|i| inner.queue.get(i)).map(|t| t.id.clone()),
        }
    }

    /// Pushes an event as if the native layer had sent it.
    pub fn emit(&self, event: SessionEvent) {
        if self.events_tx.send(event).is_err() {
            tracing::trace!("Simulated session event dropped, no listener");
        }
    }

    /// Makes every later call to `operation` fail until [`recover`](Self::recover).
    pub fn fail_on(&self, operation: &'static str) {
        self.lock().failing.insert(operation);
    }

    pub fn recover(&self, operation: &'static str) {
        self.lock().failing.remove(operation);
    }

    /// Calls received so far, e.g. `skip(2)` or `play`.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn queued_ids(&self) -> Vec<String> {
        self.lock().queue.iter().map(|t| t.id.clone()).collect()
    }

    pub fn active_id(&self) -> Option<String> {
        let inner = self.lock();
        inner.active.and_then(|i| inner.queue.get(i)).map(|t| t.id.clone())
    }

    pub fn native_state(&self) -> NativeState {
        self.lock().state
    }

    pub fn repeat_mode(&self) -> NativeRepeatMode {
        self.lock().repeat
    }

    /// The current track reached its end: advance the way a native player does.
    pub fn finish_track(&self) {
        let events = {
            let mut inner = self.lock();
            let Some(active) = inner.active else {
                return;
            };
            inner.position = Duration::ZERO;
            let repeat = inner.repeat;
            match repeat {
                NativeRepeatMode::Track => vec![],
                _ if active + 1 < inner.queue.len() => {
                    inner.active = Some(active + 1);
                    vec![Self::active_changed(&inner)]
                }
                NativeRepeatMode::Queue if !inner.queue.is_empty() => {
                    inner.active = Some(0);
                    vec![Self::active_changed(&inner)]
                }
                _ => {
                    inner.state = NativeState::Ended;
                    vec![
                        SessionEvent::StateChanged(NativeState::Ended),
                        SessionEvent::QueueEnded { track_index: Some(active) },
                    ]
                }
            }
        };
        for event in events {
            self.emit(event);
        }
    }
}

impl Default for SimulatedSession {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioSession for SimulatedSession {
    async fn reset(&self) -> Result<()> {
        self.call("reset", String::new(), |inner| {
            inner.queue.clear();
            inner.active = None;
            inner.position = Duration::ZERO;
            inner.state = NativeState::None;
            Ok(((), vec![
                SessionEvent::StateChanged(NativeState::None),
                SessionEvent::ActiveTrackChanged { index: None, track_id: None },
            ]))
        })
    }

    async fn add(&self, tracks: Vec<Track>) -> Result<()> {
        let ids = tracks.iter().map(|t| t.id.as_str()).collect::<Vec<_>>().join(",");
        self.call("add", ids, |inner| {
            if let Some(track) = tracks.iter().find(|t| !t.is_resolved()) {
                bail!("track {} has no stream url", track.id);
            }
            let was_empty = inner.queue.is_empty();
            inner.queue.extend(tracks);
            let mut events = vec![];
            if was_empty && !inner.queue.is_empty() {
                inner.active = Some(0);
                inner.state = NativeState::Ready;
                events.push(Self::active_changed(inner));
            }
            Ok(((), events))
        })
    }

    async fn set_queue(&self, tracks: Vec<Track>) -> Result<()> {
        let ids = tracks.iter().map(|t| t.id.as_str()).collect::<Vec<_>>().join(",");
        self.call("set_queue", ids, |inner| {
            let previous = inner.active.and_then(|i| inner.queue.get(i)).map(|t| t.id.clone());
            inner.queue = tracks;
            inner.active = previous
                .and_then(|id| inner.queue.iter().position(|t| t.id == id))
                .or(if inner.queue.is_empty() { None } else { Some(0) });
            Ok(((), vec![Self::active_changed(inner)]))
        })
    }

    async fn skip(&self, index: usize) -> Result<()> {
        self.call("skip", index.to_string(), |inner| {
            if index >= inner.queue.len() {
                bail!("skip index {index} out of bounds ({} tracks)", inner.queue.len());
            }
            let changed = inner.active != Some(index);
            inner.active = Some(index);
            inner.position = Duration::ZERO;
            let events = if changed { vec![Self::active_changed(inner)] } else { vec![] };
            Ok(((), events))
        })
    }

    async fn play(&self) -> Result<()> {
        self.call("play", String::new(), |inner| {
            if inner.active.is_none() {
                return Ok(((), vec![]));
            }
            inner.state = NativeState::Playing;
            Ok(((), vec![SessionEvent::StateChanged(NativeState::Playing)]))
        })
    }

    async fn pause(&self) -> Result<()> {
        self.call("pause", String::new(), |inner| {
            inner.state = NativeState::Paused;
            Ok(((), vec![SessionEvent::StateChanged(NativeState::Paused)]))
        })
    }

    async fn seek_to(&self, position: Duration) -> Result<()> {
        self.call("seek_to", format!("{:.1}", position.as_secs_f64()), |inner| {
            inner.position = position;
            let duration = inner
                .active
                .and_then(|i| inner.queue.get(i))
                .and_then(|t| t.duration)
                .unwrap_or_default();
            Ok(((), vec![SessionEvent::Progress(Progress { position, duration })]))
        })
    }

    async fn set_repeat_mode(&self, mode: NativeRepeatMode) -> Result<()> {
        self.call("set_repeat_mode", format!("{mode:?}"), |inner| {
            inner.repeat = mode;
            Ok(((), vec![]))
        })
    }

    async fn active_track_index(&self) -> Result<Option<usize>> {
        self.call("active_track_index", String::new(), |inner| Ok((inner.active, vec![])))
    }

    async fn queue(&self) -> Result<Vec<Track>> {
        self.call("queue", String::new(), |inner| Ok((inner.queue.clone(), vec![])))
    }

    async fn state(&self) -> Result<NativeState> {
        self.call("state", String::new(), |inner| Ok((inner.state, vec![])))
    }

    async fn progress(&self) -> Result<Progress> {
        self.call("progress", String::new(), |inner| {
            let duration = inner
                .active
                .and_then(|i| inner.queue.get(i))
                .and_then(|t| t.duration)
                .unwrap_or_default();
            Ok((Progress { position: inner.position, duration }, vec![]))
        })
    }

    fn take_event_channel(&self) -> Option<SessionEventChannel> {
        self.events_rx.lock().ok().and_then(|mut rx| rx.take())
    }
}

/// Media library that always answers the same way.
pub struct FixedPermission(pub bool);

#[async_trait]
impl MediaLibrary for FixedPermission {
    async fn request_permission(&self) -> Result<bool> {
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playable(id: &str) -> Track {
        Track::new(id, id, "artist").with_stream_url(format!("https://cdn/{id}"))
    }

    #[tokio::test]
    async fn event_channel_is_handed_out_once() {
        let session = SimulatedSession::new();
        assert!(session.take_event_channel().is_some());
        assert!(session.take_event_channel().is_none());
    }

    #[tokio::test]
    async fn first_add_activates_the_queue() {
        let session = SimulatedSession::new();
        let mut events = session.take_event_channel().unwrap();

        session.add(vec![playable("a"), playable("b")]).await.unwrap();

        assert_eq!(session.active_id().as_deref(), Some("a"));
        assert_eq!(
            events.recv().await,
            Some(SessionEvent::ActiveTrackChanged { index: Some(0), track_id: Some("a".to_string()) })
        );
    }

    #[tokio::test]
    async fn end_of_last_track_emits_queue_ended() {
        let session = SimulatedSession::new();
        let mut events = session.take_event_channel().unwrap();
        session.add(vec![playable("a")]).await.unwrap();
        let _ = events.recv().await;

        session.finish_track();

        assert_eq!(events.recv().await, Some(SessionEvent::StateChanged(NativeState::Ended)));
        assert_eq!(events.recv().await, Some(SessionEvent::QueueEnded { track_index: Some(0) }));
    }

    #[tokio::test]
    async fn failing_operation_reports_an_error() {
        let session = SimulatedSession::new();
        session.fail_on("skip");
        session.add(vec![playable("a")]).await.unwrap();

        assert!(session.skip(0).await.is_err());
        session.recover("skip");
        assert!(session.skip(0).await.is_ok());
        assert!(session.calls().contains(&"skip(0)".to_string()));
    }

    #[tokio::test]
    async fn unresolved_tracks_are_rejected() {
        let session = SimulatedSession::new();
        assert!(session.add(vec![Track::new("a", "a", "x")]).await.is_err());
        assert!(session.queued_ids().is_empty());
    }
}
