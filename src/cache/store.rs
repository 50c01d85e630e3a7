//! Bank store trait and in-memory implementation

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::future::join_all;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::warn;

use super::QueryMatcher;
use crate::data::BankRecord;

/// Errors that can occur when reading or writing the store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot exists but cannot be decoded
    #[error("store snapshot is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// Record violates the store's constraints
    #[error("record rejected: {0}")]
    Rejected(String),

    /// Existing records could not be removed or replaced; they are untouched
    ///
    /// Stores that swap a staged snapshot in one step report a failed swap
    /// here, since the old snapshot is still in place.
    #[error("failed to clear store: {0}")]
    ClearFailed(String),

    /// Insert half of a reset failed
    #[error("failed to insert records: {0}")]
    InsertFailed(String),

    /// Operation exceeded its time bound
    #[error("store operation timed out")]
    Timeout,
}

/// Outcome of a bulk upsert
#[derive(Debug, Default)]
pub struct UpsertReport {
    /// Records written
    pub written: usize,
    /// Identity keys that failed, with the reason
    pub failed: Vec<(String, StoreError)>,
}

impl UpsertReport {
    /// Whether every record was written
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Persisted collection of bank records keyed by identity
#[async_trait]
pub trait BankStore: Send + Sync {
    /// Returns records whose name or short code contains the query
    async fn find(&self, query: &str) -> Result<Vec<BankRecord>, StoreError>;

    /// Replaces or inserts one record keyed by its identity key
    async fn upsert(&self, record: &BankRecord) -> Result<(), StoreError>;

    /// Removes every record, returning how many were removed
    async fn delete_all(&self) -> Result<usize, StoreError>;

    /// Replaces or inserts each record, continuing past failures
    async fn upsert_all(&self, records: &[BankRecord]) -> UpsertReport {
        let results = join_all(records.iter().map(|r| self.upsert(r))).await;

        let mut report = UpsertReport::default();
        for (record, result) in records.iter().zip(results) {
            match result {
                Ok(()) => report.written += 1,
                Err(e) => {
                    warn!(identity_key = %record.identity_key, error = %e, "upsert failed");
                    report.failed.push((record.identity_key.clone(), e));
                }
            }
        }
        report
    }

    /// Clears the store then inserts `records`
    ///
    /// Clear and insert failures are reported as `ClearFailed` and
    /// `InsertFailed` respectively.
    async fn reset_and_replace(&self, records: &[BankRecord]) -> Result<usize, StoreError> {
        validate_batch(records).map_err(|e| StoreError::InsertFailed(e.to_string()))?;

        self.delete_all()
            .await
            .map_err(|e| StoreError::ClearFailed(e.to_string()))?;

        let report = self.upsert_all(records).await;
        if let Some((key, err)) = report.failed.first() {
            return Err(StoreError::InsertFailed(format!(
                "{} of {} records failed, first {}: {}",
                report.failed.len(),
                records.len(),
                key,
                err
            )));
        }
        Ok(report.written)
    }
}

/// Checks the constraints every stored record must satisfy
pub(crate) fn validate(record: &BankRecord) -> Result<(), StoreError> {
    if record.name.trim().is_empty() {
        return Err(StoreError::Rejected(format!(
            "record '{}' has an empty name",
            record.identity_key
        )));
    }
    if record.identity_key.is_empty() {
        return Err(StoreError::Rejected(format!(
            "record '{}' has an empty identity key",
            record.name
        )));
    }
    Ok(())
}

/// Validates a whole batch, also rejecting repeated identity keys
pub(crate) fn validate_batch(records: &[BankRecord]) -> Result<(), StoreError> {
    let mut seen = std::collections::HashSet::with_capacity(records.len());
    for record in records {
        validate(record)?;
        if !seen.insert(record.identity_key.as_str()) {
            return Err(StoreError::Rejected(format!(
                "duplicate identity key '{}'",
                record.identity_key
            )));
        }
    }
    Ok(())
}

/// Store held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, BankRecord>>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with `records`; invalid ones are skipped
    pub fn with_records(records: impl IntoIterator<Item = BankRecord>) -> Self {
        let map = records
            .into_iter()
            .filter(|r| validate(r).is_ok())
            .map(|r| (r.identity_key.clone(), r))
            .collect();
        Self {
            records: Mutex::new(map),
        }
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    /// Whether the store holds no records
    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Every stored record, ordered by identity key
    pub async fn snapshot(&self) -> Vec<BankRecord> {
        self.records.lock().await.values().cloned().collect()
    }
}

#[async_trait]
impl BankStore for MemoryStore {
    async fn find(&self, query: &str) -> Result<Vec<BankRecord>, StoreError> {
        let matcher = QueryMatcher::new(query);
        let records = self.records.lock().await;
        Ok(matcher.filter(records.values()))
    }

    async fn upsert(&self, record: &BankRecord) -> Result<(), StoreError> {
        validate(record)?;
        self.records
            .lock()
            .await
            .insert(record.identity_key.clone(), record.clone());
        Ok(())
    }

    async fn delete_all(&self) -> Result<usize, StoreError> {
        let mut records = self.records.lock().await;
        let removed = records.len();
        records.clear();
        Ok(removed)
    }

    async fn reset_and_replace(&self, records: &[BankRecord]) -> Result<usize, StoreError> {
        validate_batch(records).map_err(|e| StoreError::InsertFailed(e.to_string()))?;

        // Swapping under one lock means readers never observe an empty store
        let replacement: BTreeMap<String, BankRecord> = records
            .iter()
            .map(|r| (r.identity_key.clone(), r.clone()))
            .collect();
        let mut guard = self.records.lock().await;
        *guard = replacement;
        Ok(guard.len())
    }
}
