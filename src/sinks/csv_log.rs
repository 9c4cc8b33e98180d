//! Append-only CSV log of every record the collector accepted.
//!
//! The header row is written once, when the file is new or empty. Each row is
//! flushed before `append` returns.

use async_trait::async_trait;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::DurableLog;
use crate::error::{Result, VitalinkError};
use crate::types::{TelemetryRecord, FIELD_NAMES};

const SINK: &str = "csv_log";

pub struct CsvFileLog {
    path: PathBuf,
    writer: Arc<Mutex<csv::Writer<File>>>,
}

impl CsvFileLog {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                VitalinkError::sink(SINK, format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| VitalinkError::sink(SINK, format!("failed to open {}: {}", path.display(), e)))?;
        let is_empty = file
            .metadata()
            .map_err(|e| VitalinkError::sink(SINK, e))?
            .len()
            == 0;

        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if is_empty {
            writer
                .write_record(FIELD_NAMES)
                .and_then(|_| writer.flush().map_err(csv::Error::from))
                .map_err(|e| VitalinkError::sink(SINK, format!("failed to write header: {}", e)))?;
        }

        log::info!("[CsvLog] Appending to {}", path.display());
        Ok(Self {
            path,
            writer: Arc::new(Mutex::new(writer)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a log file back, header included in the check.
    pub fn read_all<P: AsRef<Path>>(path: P) -> Result<Vec<TelemetryRecord>> {
        let mut reader = csv::Reader::from_path(path.as_ref())
            .map_err(|e| VitalinkError::sink(SINK, e))?;

        let headers = reader.headers().map_err(|e| VitalinkError::sink(SINK, e))?;
        if headers.iter().ne(FIELD_NAMES.iter().copied()) {
            return Err(VitalinkError::sink(SINK, format!("unexpected header {:?}", headers)));
        }

        reader
            .deserialize()
            .map(|row| row.map_err(|e| VitalinkError::MalformedRecord(e.to_string())))
            .collect()
    }
}

#[async_trait]
impl DurableLog for CsvFileLog {
    async fn append(&self, record: &TelemetryRecord) -> Result<()> {
        let writer = self.writer.clone();
        let record = record.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut writer = writer
                .lock()
                .map_err(|_| VitalinkError::sink(SINK, "lock poisoned"))?;
            writer
                .serialize(&record)
                .map_err(|e| VitalinkError::sink(SINK, e))?;
            writer.flush().map_err(|e| VitalinkError::sink(SINK, e))
        })
        .await
        .map_err(|e| VitalinkError::sink(SINK, format!("writer task failed: {}", e)))?
    }

    fn name(&self) -> &'static str {
        SINK
    }
}
