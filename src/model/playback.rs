//! Playback status and repeat-mode handling

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::session::{NativeRepeatMode, NativeState};

/// Repeat mode as understood by the app.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    #[default]
    Off,
    Track,
    Queue,
}

/// Every app repeat mode maps to exactly one native mode.
///
/// A single "repeat" toggle means whole-queue repeat; single-track repeat is
/// the next step of the cycle.
pub const REPEAT_MODE_TABLE: [(RepeatMode, NativeRepeatMode); 3] = [
    (RepeatMode::Off, NativeRepeatMode::Off),
    (RepeatMode::Track, NativeRepeatMode::Track),
    (RepeatMode::Queue, NativeRepeatMode::Queue),
];

impl RepeatMode {
    /// Off -> Queue -> Track -> Off
    pub fn cycle(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::Queue,
            RepeatMode::Queue => RepeatMode::Track,
            RepeatMode::Track => RepeatMode::Off,
        }
    }

    pub fn native(self) -> NativeRepeatMode {
        REPEAT_MODE_TABLE
            .iter()
            .find(|(mode, _)| *mode == self)
            .map(|(_, native)| *native)
            .unwrap_or(NativeRepeatMode::Off)
    }

    pub fn label(self) -> &'static str {
        match self {
            RepeatMode::Off => "off",
            RepeatMode::Track => "track",
            RepeatMode::Queue => "queue",
        }
    }
}

/// Transport state derived from the native session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Loading,
    Buffering,
    Playing,
    Paused,
}

impl From<NativeState> for PlaybackState {
    fn from(state: NativeState) -> Self {
        match state {
            NativeState::None | NativeState::Stopped | NativeState::Ended | NativeState::Error => {
                PlaybackState::Stopped
            }
            NativeState::Loading => PlaybackState::Loading,
            NativeState::Buffering => PlaybackState::Buffering,
            NativeState::Ready | NativeState::Paused => PlaybackState::Paused,
            NativeState::Playing => PlaybackState::Playing,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    pub position: Duration,
    pub duration: Duration,
    pub repeat: RepeatMode,
}

impl PlaybackStatus {
    pub fn update_progress(&mut self, position: Duration, duration: Duration) {
        self.duration = duration;
        self.position = if duration.is_zero() { position } else { position.min(duration) };
    }
}

/// Formats a position as `m:ss`.
pub fn format_time(position: Duration) -> String {
    let secs = position.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}
