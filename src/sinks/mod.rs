//! Sink contracts and the per-record fan-out.
//!
//! Every decoded record goes to three independent destinations, in order:
//! 1. durable log (append)
//! 2. real-time mirror (overwrite latest state)
//! 3. keyed history (one entry per record, keyed by sanitized timestamp)
//!
//! A failing sink is logged and skipped; it never stops the others.
//! Implementations must be safe to share between sessions.

pub mod csv_log;
pub mod json_store;
pub mod memory;
pub mod rest;

use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use crate::error::{Result, VitalinkError};
use crate::types::{HistoryEntry, RealtimeSnapshot, TelemetryRecord};

pub use csv_log::CsvFileLog;
pub use json_store::LocalJsonStore;
pub use memory::{MemoryHistory, MemoryLog, MemoryMirror};
pub use rest::RestStore;

/// Node name of the real-time slot in the remote store.
pub const REALTIME_NODE: &str = "realtime_data";
/// Node name under which keyed history entries live.
pub const HISTORY_NODE: &str = "logs";

#[async_trait]
pub trait DurableLog: Send + Sync {
    async fn append(&self, record: &TelemetryRecord) -> Result<()>;

    fn name(&self) -> &'static str {
        "durable_log"
    }
}

#[async_trait]
pub trait RealtimeMirror: Send + Sync {
    async fn overwrite(&self, snapshot: &RealtimeSnapshot) -> Result<()>;

    fn name(&self) -> &'static str {
        "realtime_mirror"
    }
}

#[async_trait]
pub trait KeyedHistory: Send + Sync {
    async fn put(&self, key: &str, entry: &HistoryEntry) -> Result<()>;

    fn name(&self) -> &'static str {
        "keyed_history"
    }
}

/// Make a timestamp usable as a store key: everything outside
/// `[A-Za-z0-9_-]` (notably `:` `.` `+`) becomes `_`.
pub fn sanitize_key(timestamp: &str) -> String {
    timestamp
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Which sinks accepted one record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub logged: bool,
    pub mirrored: bool,
    pub archived: bool,
}

impl DispatchReport {
    pub fn all_ok(&self) -> bool {
        self.logged && self.mirrored && self.archived
    }

    pub fn failures(&self) -> usize {
        [self.logged, self.mirrored, self.archived]
            .iter()
            .filter(|ok| !**ok)
            .count()
    }
}

/// How many recently issued history keys are remembered for collision checks.
const RECENT_KEYS: usize = 4096;

/// Issues history keys. A sanitized timestamp that repeats among the recent
/// keys (two producers sampling in the same microsecond) gets `_2`, `_3`...
#[derive(Default)]
struct KeyLedger {
    order: VecDeque<String>,
    issued: HashSet<String>,
}

impl KeyLedger {
    fn issue(&mut self, base: String) -> String {
        let mut key = base.clone();
        let mut n = 1;
        while self.issued.contains(&key) {
            n += 1;
            key = format!("{}_{}", base, n);
        }

        self.issued.insert(key.clone());
        self.order.push_back(key.clone());
        if self.order.len() > RECENT_KEYS {
            if let Some(oldest) = self.order.pop_front() {
                self.issued.remove(&oldest);
            }
        }
        key
    }
}

/// Shared handles to the three sinks. Cheap to clone into each session.
#[derive(Clone)]
pub struct SinkSet {
    log: Arc<dyn DurableLog>,
    mirror: Arc<dyn RealtimeMirror>,
    history: Arc<dyn KeyedHistory>,
    keys: Arc<Mutex<KeyLedger>>,
}

impl SinkSet {
    pub fn new(
        log: Arc<dyn DurableLog>,
        mirror: Arc<dyn RealtimeMirror>,
        history: Arc<dyn KeyedHistory>,
    ) -> Self {
        Self {
            log,
            mirror,
            history,
            keys: Arc::new(Mutex::new(KeyLedger::default())),
        }
    }

    fn history_key(&self, timestamp: &str) -> String {
        let base = sanitize_key(timestamp);
        match self.keys.lock() {
            Ok(mut ledger) => ledger.issue(base),
            Err(_) => base,
        }
    }

    /// Write one record to every sink, in order, isolating failures.
    pub async fn dispatch(&self, record: &TelemetryRecord) -> DispatchReport {
        let logged = settle(self.log.name(), self.log.append(record).await);
        let mirrored = settle(self.mirror.name(), self.mirror.overwrite(&record.snapshot()).await);
        let key = self.history_key(&record.timestamp);
        let archived = settle(
            self.history.name(),
            self.history.put(&key, &record.history_entry()).await,
        );

        DispatchReport {
            logged,
            mirrored,
            archived,
        }
    }
}

fn settle(sink: &'static str, result: Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            let e = match e {
                VitalinkError::SinkWrite { .. } => e,
                other => VitalinkError::sink(sink, other),
            };
            log::warn!("[Sinks] {}", e);
            false
        }
    }
}
