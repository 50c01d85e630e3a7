//! JSON snapshot store for bank records
//!
//! Provides a `JsonFileStore` that keeps every record in one JSON file keyed by
//! identity key. Writes go to a staging file that is renamed over the snapshot,
//! so a reader sees either the previous contents or the new ones.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::store::{validate, validate_batch, BankStore, StoreError, UpsertReport};
use super::QueryMatcher;
use crate::config::default_store_path;
use crate::data::BankRecord;

/// On-disk layout of the snapshot
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    /// When the snapshot was last written
    updated_at: Option<DateTime<Utc>>,
    /// Records keyed by identity key
    banks: BTreeMap<String, BankRecord>,
}

/// Stores bank records in a single JSON file
///
/// A missing file reads as an empty store. Writers are serialized within the
/// process; concurrent processes writing the same file are not coordinated.
#[derive(Debug)]
pub struct JsonFileStore {
    /// Path of the snapshot file
    path: PathBuf,
    /// Serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Creates a store at the platform data directory
    ///
    /// Returns `None` if the directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        default_store_path().map(Self::with_path)
    }

    /// Creates a store backed by a specific file
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the snapshot file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the staging file used for atomic replacement
    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Reads the snapshot, treating a missing file as empty
    async fn load(&self) -> Result<Snapshot, StoreError> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Snapshot::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes `snapshot` to the staging file
    async fn stage(&self, snapshot: &Snapshot) -> Result<PathBuf, StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_string_pretty(snapshot)?;
        let staging = self.staging_path();
        fs::write(&staging, json).await?;
        Ok(staging)
    }

    /// Moves a staged snapshot over the live one
    async fn commit(&self, staging: &Path) -> Result<(), StoreError> {
        fs::rename(staging, &self.path).await?;
        Ok(())
    }

    /// Stages then commits a snapshot
    async fn save(&self, mut snapshot: Snapshot) -> Result<(), StoreError> {
        snapshot.updated_at = Some(Utc::now());
        let staging = self.stage(&snapshot).await?;
        self.commit(&staging).await
    }
}

#[async_trait]
impl BankStore for JsonFileStore {
    async fn find(&self, query: &str) -> Result<Vec<BankRecord>, StoreError> {
        let snapshot = self.load().await?;
        let matcher = QueryMatcher::new(query);
        Ok(matcher.filter(snapshot.banks.values()))
    }

    async fn upsert(&self, record: &BankRecord) -> Result<(), StoreError> {
        validate(record)?;

        let _guard = self.write_lock.lock().await;
        let mut snapshot = self.load().await?;
        snapshot
            .banks
            .insert(record.identity_key.clone(), record.clone());
        self.save(snapshot).await
    }

    async fn delete_all(&self) -> Result<usize, StoreError> {
        let _guard = self.write_lock.lock().await;
        let removed = match self.load().await {
            Ok(snapshot) => snapshot.banks.len(),
            Err(StoreError::Corrupt(e)) => {
                warn!(error = %e, "discarding corrupt snapshot");
                0
            }
            Err(e) => return Err(e),
        };
        self.save(Snapshot::default()).await?;
        Ok(removed)
    }

    /// Writes the whole batch in one snapshot update
    ///
    /// Invalid records are rejected individually; if the snapshot write itself
    /// fails, every valid record in the batch is reported as failed.
    async fn upsert_all(&self, records: &[BankRecord]) -> UpsertReport {
        let mut report = UpsertReport::default();
        let mut accepted = Vec::with_capacity(records.len());
        for record in records {
            match validate(record) {
                Ok(()) => accepted.push(record),
                Err(e) => {
                    warn!(identity_key = %record.identity_key, error = %e, "upsert rejected");
                    report.failed.push((record.identity_key.clone(), e));
                }
            }
        }
        if accepted.is_empty() {
            return report;
        }

        let _guard = self.write_lock.lock().await;
        let result = async {
            let mut snapshot = self.load().await?;
            for record in &accepted {
                snapshot
                    .banks
                    .insert(record.identity_key.clone(), (*record).clone());
            }
            self.save(snapshot).await
        }
        .await;

        match result {
            Ok(()) => {
                report.written = accepted.len();
                debug!(count = report.written, path = %self.path.display(), "snapshot updated");
            }
            Err(e) => {
                warn!(error = %e, count = accepted.len(), "snapshot write failed");
                let reason = e.to_string();
                report.failed.extend(
                    accepted
                        .iter()
                        .map(|r| (r.identity_key.clone(), StoreError::Rejected(reason.clone()))),
                );
            }
        }
        report
    }

    async fn reset_and_replace(&self, records: &[BankRecord]) -> Result<usize, StoreError> {
        validate_batch(records).map_err(|e| StoreError::InsertFailed(e.to_string()))?;

        let snapshot = Snapshot {
            updated_at: Some(Utc::now()),
            banks: records
                .iter()
                .map(|r| (r.identity_key.clone(), r.clone()))
                .collect(),
        };
        let count = snapshot.banks.len();

        let _guard = self.write_lock.lock().await;
        let staging = self
            .stage(&snapshot)
            .await
            .map_err(|e| StoreError::InsertFailed(e.to_string()))?;
        if let Err(e) = self.commit(&staging).await {
            let _ = fs::remove_file(&staging).await;
            return Err(StoreError::ClearFailed(format!(
                "could not commit new snapshot, previous snapshot left in place: {}",
                e
            )));
        }
        Ok(count)
    }
}
