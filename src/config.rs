//! Runtime configuration for the player
//!
//! Values come from an optional JSON file (`vibe.json` by default) and are then
//! overridden by environment variables, so a packaged build can be pointed at
//! another API without editing files.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "vibe.json";

const ENV_API_URL: &str = "VIBE_API_URL";
const ENV_USER_EMAIL: &str = "VIBE_USER_EMAIL";
const ENV_STORE_PATH: &str = "VIBE_STORE_PATH";

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Base URL of the song API (`/api/song`, `/api/favourites`).
    pub api_url: String,
    /// Signed-in user, forwarded to the API. `None` keeps favourites local.
    pub user_email: Option<String>,
    /// Where the preference store keeps its JSON document.
    pub store_path: PathBuf,
    /// How many tracks past the current one should be loaded in the session.
    pub lookahead: usize,
    pub resolve_timeout_ms: u64,
    pub recents_limit: usize,
    pub home_feed_ttl_secs: i64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3000".to_string(),
            user_email: None,
            store_path: PathBuf::from(".cache/preferences.json"),
            lookahead: 2,
            resolve_timeout_ms: 10_000,
            recents_limit: 50,
            home_feed_ttl_secs: 6 * 60 * 60,
        }
    }
}

impl PlayerConfig {
    /// Load the config file if it exists, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            PlayerConfig::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var(ENV_API_URL) {
            self.api_url = url;
        }
        if let Some(email) = var(ENV_USER_EMAIL) {
            self.user_email = (!email.is_empty()).then_some(email);
        }
        if let Some(path) = var(ENV_STORE_PATH) {
            self.store_path = PathBuf::from(path);
        }
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.resolve_timeout_ms)
    }

    pub fn home_feed_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.home_feed_ttl_secs)
    }
}
