//! Error types surfaced by the playback orchestrator

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("Cannot start playback from an empty list")]
    EmptyQueue,
    #[error("No track is playing")]
    NothingPlaying,
    #[error("Start index {index} is out of range for a list of {len} tracks")]
    StartIndexOutOfRange { index: usize, len: usize },
    #[error("Could not resolve a stream for {track_id}: {reason}")]
    Resolve { track_id: String, reason: String },
    #[error("Audio session call '{operation}' failed: {reason}")]
    Session {
        operation: &'static str,
        reason: String,
    },
    #[error("Invalid seek position: {0}")]
    InvalidSeek(f64),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Preference store error: {0}")]
    Store(String),
    #[error("Invalid deep link: {0}")]
    DeepLink(String),
    #[error("Player has shut down")]
    Closed,
}

impl PlayerError {
    pub fn resolve(track_id: &str, error: &anyhow::Error) -> Self {
        PlayerError::Resolve {
            track_id: track_id.to_string(),
            reason: format!("{error:#}"),
        }
    }

    pub fn session(operation: &'static str, error: &anyhow::Error) -> Self {
        PlayerError::Session {
            operation,
            reason: format!("{error:#}"),
        }
    }

    pub fn store(error: &anyhow::Error) -> Self {
        PlayerError::Store(format!("{error:#}"))
    }

    /// Short text shown to the user in a toast or alert.
    pub fn user_message(&self) -> String {
        match self {
            PlayerError::EmptyQueue => "Nothing to play".to_string(),
            PlayerError::NothingPlaying => "Nothing is playing".to_string(),
            PlayerError::StartIndexOutOfRange { .. } => "That song is no longer in the list".to_string(),
            PlayerError::Resolve { .. } => "Playback failed. Check your connection.".to_string(),
            PlayerError::Session { .. } => "Player is not responding. Try again.".to_string(),
            PlayerError::InvalidSeek(_) => "Cannot seek there".to_string(),
            PlayerError::PermissionDenied(what) => format!("Permission required: {what}"),
            PlayerError::Store(_) => "Could not save your library".to_string(),
            PlayerError::DeepLink(_) => "This link cannot be played".to_string(),
            PlayerError::Closed => "Player is not running".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;
