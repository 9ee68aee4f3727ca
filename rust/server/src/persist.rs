//! Persistence collaborators. The orchestrator calls these after every
//! transition batch (snapshots) and once per finished hand (history);
//! their failures are logged and swallowed so a hand never aborts on a
//! sink problem.

use std::collections::HashMap;
use std::fs::{create_dir_all, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use felt_engine::events::{HandEvent, PotAward};

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization failure: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Crash-recovery snapshots, opaque to the sink. Last write wins.
pub trait SnapshotSink: Send + Sync {
    fn put(&self, game_id: Uuid, state: Value) -> Result<(), PersistError>;
}

/// One line per finished hand, append-only and ordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandHistoryRecord {
    pub game_id: Uuid,
    pub hand_number: u64,
    /// RFC3339, stamped at append time when absent.
    #[serde(default)]
    pub ts: Option<String>,
    pub events: Vec<HandEvent>,
    pub winners: Vec<PotAward>,
}

pub trait HandHistorySink: Send + Sync {
    fn append(&self, record: HandHistoryRecord) -> Result<(), PersistError>;
}

/// In-memory snapshot store, also the test double.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    blobs: RwLock<HashMap<Uuid, Value>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, game_id: Uuid) -> Option<Value> {
        self.blobs
            .read()
            .expect("snapshot lock poisoned")
            .get(&game_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().expect("snapshot lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotSink for MemorySnapshotStore {
    fn put(&self, game_id: Uuid, state: Value) -> Result<(), PersistError> {
        self.blobs
            .write()
            .expect("snapshot lock poisoned")
            .insert(game_id, state);
        Ok(())
    }
}

/// JSONL hand-history writer with one file per UTC day: the base path
/// gains a `-YYYYMMDD` suffix and rolls over when the date changes.
/// Files open in append mode so a restart continues the day's file.
#[derive(Debug)]
pub struct JsonlHandHistory {
    base: PathBuf,
    writer: Mutex<Option<(String, BufWriter<File>)>>,
}

impl JsonlHandHistory {
    pub fn create(base: impl AsRef<Path>) -> Result<Self, PersistError> {
        let base = base.as_ref().to_path_buf();
        if let Some(parent) = base.parent() {
            if !parent.as_os_str().is_empty() {
                create_dir_all(parent)?;
            }
        }
        Ok(Self {
            base,
            writer: Mutex::new(None),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base
    }

    /// Today's output file.
    pub fn current_path(&self) -> PathBuf {
        dated_path(&self.base, &today())
    }
}

fn today() -> String {
    Utc::now().format("%Y%m%d").to_string()
}

/// `hands.jsonl` + `20260801` → `hands-20260801.jsonl`.
fn dated_path(base: &Path, date: &str) -> PathBuf {
    let stem = base
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("hands");
    let name = match base.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}-{date}.{ext}"),
        None => format!("{stem}-{date}"),
    };
    base.with_file_name(name)
}

impl HandHistorySink for JsonlHandHistory {
    fn append(&self, mut record: HandHistoryRecord) -> Result<(), PersistError> {
        if record.ts.is_none() {
            record.ts = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
        }
        let line = serde_json::to_string(&record)?;

        let date = today();
        let mut guard = self.writer.lock().expect("history lock poisoned");
        let stale = guard.as_ref().map(|(d, _)| d != &date).unwrap_or(true);
        if stale {
            if let Some((_, mut old)) = guard.take() {
                let _ = old.flush();
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(dated_path(&self.base, &date))?;
            *guard = Some((date, BufWriter::new(file)));
        }
        let (_, writer) = guard.as_mut().expect("writer opened above");
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

/// In-memory hand history for tests and bot-only deployments.
#[derive(Debug, Default)]
pub struct MemoryHandHistory {
    records: RwLock<Vec<HandHistoryRecord>>,
}

impl MemoryHandHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<HandHistoryRecord> {
        self.records.read().expect("history lock poisoned").clone()
    }
}

impl HandHistorySink for MemoryHandHistory {
    fn append(&self, mut record: HandHistoryRecord) -> Result<(), PersistError> {
        if record.ts.is_none() {
            record.ts = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
        }
        self.records
            .write()
            .expect("history lock poisoned")
            .push(record);
        Ok(())
    }
}
