//! Persisted key-value preference store
//!
//! Values are JSON strings, the same way the mobile key-value storage keeps
//! them. [`JsonFileStore`] keeps every key in one document on disk;
//! [`MemoryStore`] is used when nothing should outlive the process.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String) -> Result<()>;
    async fn multi_remove(&self, keys: &[&str]) -> Result<()>;
}

/// Reads `key` as JSON, treating an absent key as `None`.
pub async fn get_json<T: DeserializeOwned>(store: &dyn PreferenceStore, key: &str) -> Result<Option<T>> {
    match store.get(key).await? {
        Some(raw) => Ok(Some(
            serde_json::from_str(&raw).with_context(|| format!("decoding stored '{key}'"))?,
        )),
        None => Ok(None),
    }
}

pub async fn set_json<T: Serialize + Sync>(store: &dyn PreferenceStore, key: &str, value: &T) -> Result<()> {
    store.set(key, serde_json::to_string(value)?).await
}

#[derive(Default)]
pub struct MemoryStore {
    values: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreferenceStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn multi_remove(&self, keys: &[&str]) -> Result<()> {
        let mut values = self.values.write().await;
        for key in keys {
            values.remove(*key);
        }
        Ok(())
    }
}

/// Store backed by a single JSON object on disk, rewritten on every change.
pub struct JsonFileStore {
    path: PathBuf,
    values: RwLock<BTreeMap<String, String>>,
}

impl JsonFileStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };
        tracing::debug!(path = %path.display(), keys = values.len(), "Preference store opened");
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    async fn save(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        let content = serde_json::to_string(values)?;
        // Write then rename so a crash never leaves half a document behind.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("writing {}", self.path.display()))
    }
}

#[async_trait]
impl PreferenceStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let mut values = self.values.write().await;
        values.insert(key.to_string(), value);
        self.save(&values).await
    }

    async fn multi_remove(&self, keys: &[&str]) -> Result<()> {
        let mut values = self.values.write().await;
        for key in keys {
            values.remove(*key);
        }
        self.save(&values).await
    }
}
