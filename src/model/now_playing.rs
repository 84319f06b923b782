//! State exposed to the UI

use super::playback::PlaybackStatus;
use super::track::{PlaybackSource, Track};

/// Snapshot published after every change handled by the orchestrator.
#[derive(Clone, Debug, Default)]
pub struct NowPlaying {
    /// `None` when idle.
    pub track: Option<Track>,
    /// Position in the logical queue; 0 when idle.
    pub index: usize,
    pub queue_len: usize,
    pub upcoming: Vec<Track>,
    pub source: Option<PlaybackSource>,
    pub status: PlaybackStatus,
    pub liked: bool,
}

impl NowPlaying {
    pub fn is_idle(&self) -> bool {
        self.track.is_none()
    }

    pub fn current_id(&self) -> Option<&str> {
        self.track.as_ref().map(|t| t.id.as_str())
    }
}

/// Transient message for the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    /// Short-lived, non-blocking.
    Toast(String),
    /// Needs acknowledgement.
    Alert(String),
}

impl Notice {
    pub fn message(&self) -> &str {
        match self {
            Notice::Toast(m) | Notice::Alert(m) => m,
        }
    }
}
