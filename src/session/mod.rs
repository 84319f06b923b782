//! Native background audio session contract
//!
//! The native layer owns the audio that is actually playing. The orchestrator
//! drives it through [`AudioSession`] and learns about changes through the
//! single [`SessionEventChannel`] it takes at startup.

mod simulated;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::model::Track;

pub use simulated::{FixedPermission, SimulatedSession};

/// Repeat modes understood by the native session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum NativeRepeatMode {
    #[default]
    Off,
    Track,
    Queue,
}

/// Raw player state reported by the native session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum NativeState {
    #[default]
    None,
    Ready,
    Loading,
    Buffering,
    Playing,
    Paused,
    Stopped,
    Ended,
    Error,
}

impl NativeState {
    /// States in which a play/pause toggle should pause.
    pub fn is_active(self) -> bool {
        matches!(self, NativeState::Playing | NativeState::Buffering | NativeState::Loading)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Progress {
    pub position: Duration,
    pub duration: Duration,
}

/// Events emitted by the native session, including notification and lock-screen controls.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    ActiveTrackChanged {
        index: Option<usize>,
        track_id: Option<String>,
    },
    QueueEnded {
        track_index: Option<usize>,
    },
    PlaybackError {
        message: String,
    },
    StateChanged(NativeState),
    Progress(Progress),
    RemotePlay,
    RemotePause,
    RemoteNext,
    RemotePrevious,
    /// Requested position in seconds, as sent by the OS.
    RemoteSeek(f64),
}

pub type SessionEventChannel = mpsc::UnboundedReceiver<SessionEvent>;

#[async_trait]
pub trait AudioSession: Send + Sync {
    /// Stops playback and clears the native queue.
    async fn reset(&self) -> Result<()>;
    /// Appends tracks to the native queue.
    async fn add(&self, tracks: Vec<Track>) -> Result<()>;
    /// Replaces the native queue.
    async fn set_queue(&self, tracks: Vec<Track>) -> Result<()>;
    async fn skip(&self, index: usize) -> Result<()>;
    async fn play(&self) -> Result<()>;
    async fn pause(&self) -> Result<()>;
    async fn seek_to(&self, position: Duration) -> Result<()>;
    async fn set_repeat_mode(&self, mode: NativeRepeatMode) -> Result<()>;
    async fn active_track_index(&self) -> Result<Option<usize>>;
    async fn queue(&self) -> Result<Vec<Track>>;
    async fn state(&self) -> Result<NativeState>;
    async fn progress(&self) -> Result<Progress>;

    /// Hands out the event channel. Only the first caller gets it.
    fn take_event_channel(&self) -> Option<SessionEventChannel>;
}

/// Device media library access, needed for downloaded and local songs.
#[async_trait]
pub trait MediaLibrary: Send + Sync {
    /// Asks the OS for access. `Ok(false)` means the user refused.
    async fn request_permission(&self) -> Result<bool>;
}
