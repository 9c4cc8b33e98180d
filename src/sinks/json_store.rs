//! Filesystem stand-in for the remote real-time store.
//!
//! Layout under the base directory:
//!
//! ```text
//! realtime_data.json      latest snapshot, replaced on every record
//! logs/<key>.json         one history entry per record
//! ```
//!
//! Files are written to a temporary name and renamed into place, so a reader
//! never sees a half-written document.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{KeyedHistory, RealtimeMirror, HISTORY_NODE, REALTIME_NODE};
use crate::error::{Result, VitalinkError};
use crate::types::{HistoryEntry, RealtimeSnapshot};

const SINK: &str = "local_store";

pub struct LocalJsonStore {
    base_dir: PathBuf,
    /// Orders overwrites of the real-time slot.
    realtime_lock: Mutex<()>,
}

impl LocalJsonStore {
    /// Open the store, creating the directory tree if needed.
    pub async fn open<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(base_dir.join(HISTORY_NODE))
            .await
            .map_err(|e| {
                VitalinkError::sink(SINK, format!("failed to create {}: {}", base_dir.display(), e))
            })?;

        log::info!("[LocalStore] Mirroring into {}", base_dir.display());
        Ok(Self {
            base_dir,
            realtime_lock: Mutex::new(()),
        })
    }

    fn realtime_path(&self) -> PathBuf {
        self.base_dir.join(format!("{}.json", REALTIME_NODE))
    }

    fn history_path(&self, key: &str) -> PathBuf {
        self.base_dir.join(HISTORY_NODE).join(format!("{}.json", key))
    }

    pub async fn read_realtime(&self) -> Result<Option<RealtimeSnapshot>> {
        read_json(&self.realtime_path()).await
    }

    pub async fn read_history(&self, key: &str) -> Result<Option<HistoryEntry>> {
        read_json(&self.history_path(key)).await
    }

    /// Keys of all history entries, sorted.
    pub async fn history_keys(&self) -> Result<Vec<String>> {
        let mut dir = fs::read_dir(self.base_dir.join(HISTORY_NODE))
            .await
            .map_err(|e| VitalinkError::sink(SINK, e))?;
        let mut keys = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(|e| VitalinkError::sink(SINK, e))? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(key) = name.strip_suffix(".json") {
                keys.push(key.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let body = serde_json::to_vec_pretty(value).map_err(|e| VitalinkError::Serialization(e.to_string()))?;
    let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));

    fs::write(&tmp, &body)
        .await
        .map_err(|e| VitalinkError::sink(SINK, format!("failed to write {}: {}", tmp.display(), e)))?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(VitalinkError::sink(
            SINK,
            format!("failed to move {} into place: {}", path.display(), e),
        ));
    }
    Ok(())
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| VitalinkError::MalformedRecord(format!("{}: {}", path.display(), e))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(VitalinkError::sink(SINK, e)),
    }
}

#[async_trait]
impl RealtimeMirror for LocalJsonStore {
    async fn overwrite(&self, snapshot: &RealtimeSnapshot) -> Result<()> {
        let _guard = self.realtime_lock.lock().await;
        write_json_atomic(&self.realtime_path(), snapshot).await
    }

    fn name(&self) -> &'static str {
        "local_realtime"
    }
}

#[async_trait]
impl KeyedHistory for LocalJsonStore {
    async fn put(&self, key: &str, entry: &HistoryEntry) -> Result<()> {
        if key.is_empty() || key.contains(['/', '\\', '.']) {
            return Err(VitalinkError::sink(SINK, format!("unsafe history key {:?}", key)));
        }
        write_json_atomic(&self.history_path(key), entry).await
    }

    fn name(&self) -> &'static str {
        "local_history"
    }
}
