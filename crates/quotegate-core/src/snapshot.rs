//! Durable copy of the last live batch.
//!
//! The store holds exactly one snapshot. Every `save` replaces the whole
//! file through a temporary file in the same directory, so a reader never
//! observes a half-written snapshot. `load` never fails: a missing,
//! unreadable or corrupt file is reported as "no snapshot".

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::PersistenceError;
use crate::{Batch, Provenance, QuoteRecord, Symbol, UtcDateTime};

pub const DEFAULT_SNAPSHOT_PATH: &str = "quotegate-snapshot.json";

/// Loaded snapshot: the batch, retagged `cached`, and when it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub saved_at: UtcDateTime,
    pub batch: Batch,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotDocument {
    saved_at: UtcDateTime,
    #[serde(default)]
    requested: Vec<Symbol>,
    records: BTreeMap<Symbol, SnapshotEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEntry {
    price: Option<f64>,
    change_percent: Option<f64>,
    volume: Option<i64>,
    currency: Option<String>,
    as_of: Option<i64>,
    provenance: Provenance,
}

impl SnapshotEntry {
    fn from_record(record: &QuoteRecord) -> Self {
        Self {
            price: record.price,
            change_percent: record.change_percent,
            volume: record.volume,
            currency: record.currency.clone(),
            as_of: record.as_of,
            provenance: record.provenance,
        }
    }

    fn into_cached_record(self, symbol: Symbol) -> QuoteRecord {
        QuoteRecord {
            symbol,
            price: self.price,
            change_percent: self.change_percent,
            volume: self.volume,
            currency: self.currency,
            as_of: self.as_of,
            provenance: Provenance::Cached,
        }
    }
}

/// Single-file snapshot store.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the snapshot with `batch`.
    ///
    /// Batches holding `cached` records are refused so stale data is never
    /// written back as if it were live.
    pub fn save(&self, batch: &Batch) -> Result<(), PersistenceError> {
        if batch.is_empty() {
            return Err(PersistenceError::EmptyBatch);
        }
        let cached = batch
            .records()
            .iter()
            .filter(|record| record.provenance == Provenance::Cached)
            .count();
        if cached > 0 {
            return Err(PersistenceError::CachedRecords { count: cached });
        }

        let document = SnapshotDocument {
            saved_at: UtcDateTime::now(),
            requested: batch.requested().to_vec(),
            records: batch
                .records()
                .iter()
                .map(|record| (record.symbol.clone(), SnapshotEntry::from_record(record)))
                .collect(),
        };

        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        let mut temp = NamedTempFile::new_in(&parent)?;
        serde_json::to_writer_pretty(temp.as_file_mut(), &document)?;
        temp.as_file_mut().write_all(b"\n")?;
        temp.as_file_mut().sync_all()?;
        temp.persist(&self.path)?;

        tracing::debug!(
            path = %self.path.display(),
            records = batch.len(),
            "snapshot written"
        );
        Ok(())
    }

    /// Last saved batch with every record retagged `cached`.
    pub fn load(&self) -> Option<Batch> {
        self.load_snapshot().map(|snapshot| snapshot.batch)
    }

    pub fn load_snapshot(&self) -> Option<Snapshot> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no snapshot on disk");
                return None;
            }
            Err(error) => {
                tracing::warn!(path = %self.path.display(), %error, "snapshot unreadable");
                return None;
            }
        };

        let document: SnapshotDocument = match serde_json::from_str(&raw) {
            Ok(document) => document,
            Err(error) => {
                tracing::warn!(path = %self.path.display(), %error, "snapshot corrupt, ignoring");
                return None;
            }
        };

        let mut batch = Batch::new(document.requested);
        for (symbol, entry) in document.records {
            batch.insert(entry.into_cached_record(symbol));
        }

        if batch.is_empty() {
            tracing::warn!(path = %self.path.display(), "snapshot holds no records, ignoring");
            return None;
        }

        Some(Snapshot {
            saved_at: document.saved_at,
            batch,
        })
    }
}
