//! In-process sinks. Used by tests and when running without storage.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{DurableLog, KeyedHistory, RealtimeMirror};
use crate::error::{Result, VitalinkError};
use crate::types::{HistoryEntry, RealtimeSnapshot, TelemetryRecord};

fn poisoned(sink: &'static str) -> VitalinkError {
    VitalinkError::sink(sink, "lock poisoned")
}

#[derive(Default)]
pub struct MemoryLog {
    rows: Mutex<Vec<TelemetryRecord>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TelemetryRecord> {
        self.rows.lock().map(|rows| rows.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DurableLog for MemoryLog {
    async fn append(&self, record: &TelemetryRecord) -> Result<()> {
        let mut rows = self.rows.lock().map_err(|_| poisoned("memory_log"))?;
        rows.push(record.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory_log"
    }
}

#[derive(Default)]
pub struct MemoryMirror {
    slot: Mutex<(Option<RealtimeSnapshot>, u64)>,
}

impl MemoryMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<RealtimeSnapshot> {
        self.slot.lock().ok().and_then(|slot| slot.0.clone())
    }

    /// Number of overwrites so far.
    pub fn writes(&self) -> u64 {
        self.slot.lock().map(|slot| slot.1).unwrap_or(0)
    }
}

#[async_trait]
impl RealtimeMirror for MemoryMirror {
    async fn overwrite(&self, snapshot: &RealtimeSnapshot) -> Result<()> {
        let mut slot = self.slot.lock().map_err(|_| poisoned("memory_mirror"))?;
        slot.0 = Some(snapshot.clone());
        slot.1 += 1;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory_mirror"
    }
}

#[derive(Default)]
pub struct MemoryHistory {
    entries: Mutex<BTreeMap<String, HistoryEntry>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<HistoryEntry> {
        self.entries.lock().ok().and_then(|entries| entries.get(key).cloned())
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries
            .lock()
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KeyedHistory for MemoryHistory {
    async fn put(&self, key: &str, entry: &HistoryEntry) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| poisoned("memory_history"))?;
        entries.insert(key.to_string(), entry.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory_history"
    }
}
