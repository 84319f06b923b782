//! Cached home feed with an expiry timestamp

use anyhow::Result;
use chrono::{Duration, Utc};

use crate::store::{get_json, set_json, PreferenceStore};

pub const HOME_KEY: &str = "home";
pub const HOME_EXPIRY_KEY: &str = "home_updated_at";

#[derive(Debug, PartialEq)]
pub enum CachedFeed {
    Fresh(serde_json::Value),
    /// Still usable while a refetch runs.
    Expired(serde_json::Value),
    Missing,
}

/// Reads the cached feed and classifies it against its stored expiry.
pub async fn load(store: &dyn PreferenceStore) -> Result<CachedFeed> {
    let Some(feed) = get_json::<serde_json::Value>(store, HOME_KEY).await? else {
        return Ok(CachedFeed::Missing);
    };
    // Expiry is kept in epoch milliseconds; a missing one counts as expired.
    let expires_at: Option<i64> = get_json(store, HOME_EXPIRY_KEY).await.unwrap_or(None);
    match expires_at {
        Some(at) if Utc::now().timestamp_millis() <= at => Ok(CachedFeed::Fresh(feed)),
        _ => Ok(CachedFeed::Expired(feed)),
    }
}

pub async fn save(store: &dyn PreferenceStore, feed: &serde_json::Value, ttl: Duration) -> Result<()> {
    set_json(store, HOME_KEY, feed).await?;
    set_json(store, HOME_EXPIRY_KEY, &(Utc::now() + ttl).timestamp_millis()).await
}
