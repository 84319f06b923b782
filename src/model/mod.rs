//! Model module - playback data types
//!
//! - `track`: song entries and resolver answers
//! - `queue`: the logical queue and its per-entry load state
//! - `playback`: transport status and repeat-mode mapping
//! - `now_playing`: state and notices published to the UI

mod now_playing;
mod playback;
mod queue;
mod track;

pub use now_playing::{Notice, NowPlaying};
pub use playback::{format_time, PlaybackState, PlaybackStatus, RepeatMode, REPEAT_MODE_TABLE};
pub use queue::{EntryState, LogicalQueue, QueueEntry};
pub use track::{PlaybackSource, ResolvedSong, Track};
