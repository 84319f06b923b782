//! Playback queue synchronization for a streaming music client
//!
//! [`PlayerController`] keeps an app-side [`LogicalQueue`](model::LogicalQueue)
//! in step with a native background [`AudioSession`](session::AudioSession):
//! tracks are resolved to stream URLs on demand, a few upcoming ones are
//! prefetched, and the native session's events are reconciled back into the
//! state the UI observes.

pub mod api;
pub mod config;
pub mod controller;
pub mod error;
pub mod library;
pub mod logging;
pub mod model;
pub mod session;
pub mod store;

pub use controller::{PlayerController, PlayerDeps};
pub use error::{PlayerError, Result};
