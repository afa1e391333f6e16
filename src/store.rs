//! Durable key/value persistence for engine state.
//!
//! Keys are logically independent (`seen_history`, `drawdown`,
//! `quiet_gate`), so no multi-key transaction is needed; each save is
//! atomic on its own via temp-file + rename. A crash between saves leaves
//! every key at its prior value.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use tokio::fs;

pub const KEY_SEEN_HISTORY: &str = "seen_history";
pub const KEY_DRAWDOWN: &str = "drawdown";
pub const KEY_QUIET_GATE: &str = "quiet_gate";

#[async_trait::async_trait]
pub trait StateStore: Send + Sync {
    /// Returns `None` when the key has never been saved.
    async fn load_raw(&self, key: &str) -> Result<Option<String>>;
    async fn save_raw(&self, key: &str, value: &str) -> Result<()>;
}

/// Typed load; absent key or corrupt value both fall back to `None`
/// (a corrupt snapshot is logged and treated as state loss, per the
/// at-most-one-cycle recovery contract).
pub async fn load_json<T: DeserializeOwned>(store: &dyn StateStore, key: &str) -> Option<T> {
    match store.load_raw(key).await {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(key, error = %e, "corrupt state snapshot, starting fresh");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(key, error = %e, "state load failed, starting fresh");
            None
        }
    }
}

pub async fn save_json<T: Serialize>(store: &dyn StateStore, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string_pretty(value).context("serialize state")?;
    store.save_raw(key, &raw).await
}

/// File-per-key JSON store under a state directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait::async_trait]
impl StateStore for JsonFileStore {
    async fn load_raw(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path).await {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    async fn save_raw(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating {}", self.dir.display()))?;
        let path = self.path_for(key);
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        fs::write(&tmp, value)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("renaming into {}", path.display()))?;
        Ok(())
    }
}
