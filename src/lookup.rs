//! Cache-aside bank lookup
//!
//! `BankLookup` answers a search from the store when the store has at least
//! one match. Otherwise it fetches the partner directory, normalizes it,
//! answers from the fresh batch and queues the whole batch for persistence
//! without waiting for the write.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::cache::{BankStore, QueryMatcher, StoreError};
use crate::data::{normalize, BankRecord, UpstreamError, UpstreamGateway};
use crate::error::LookupError;
use crate::persist::PersistQueue;

/// Where a lookup's answer came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    Upstream,
}

/// Result of a successful search
#[derive(Debug, Clone)]
pub struct LookupOutcome {
    /// Matching banks
    pub banks: Vec<BankRecord>,
    /// Whether the store or the partner API answered
    pub source: Source,
}

/// Envelope returned to callers
#[derive(Debug, Clone, Serialize)]
pub struct LookupResponse {
    /// Whether the lookup completed
    pub success: bool,
    /// Matching banks; always an array, possibly empty
    pub data: Vec<BankRecord>,
    /// Result count on success, a generic notice on failure
    pub message: String,
}

impl LookupResponse {
    fn found(banks: Vec<BankRecord>) -> Self {
        let message = match banks.len() {
            1 => "Found 1 bank".to_string(),
            n => format!("Found {} banks", n),
        };
        Self {
            success: true,
            data: banks,
            message,
        }
    }

    fn failed(error: &LookupError) -> Self {
        Self {
            success: false,
            data: Vec::new(),
            message: error.public_message().to_string(),
        }
    }
}

/// Cache-aside orchestrator over a store and an upstream gateway
pub struct BankLookup {
    store: Arc<dyn BankStore>,
    upstream: Arc<dyn UpstreamGateway>,
    persist: PersistQueue,
    /// Bound on each store query and upstream fetch
    timeout: Duration,
}

impl BankLookup {
    /// Creates an orchestrator from its collaborators
    pub fn new(
        store: Arc<dyn BankStore>,
        upstream: Arc<dyn UpstreamGateway>,
        persist: PersistQueue,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            upstream,
            persist,
            timeout,
        }
    }

    /// Searches for banks whose name or short code contains `query`
    ///
    /// Any non-empty store result is a hit. An empty result, a store error or
    /// a store timeout is a miss, which goes to the partner API; there is no
    /// fallback if that call fails.
    pub async fn search(&self, query: &str) -> Result<LookupOutcome, LookupError> {
        match self.check_cache(query).await {
            Ok(banks) if !banks.is_empty() => {
                info!(query, count = banks.len(), "cache hit");
                return Ok(LookupOutcome {
                    banks,
                    source: Source::Cache,
                });
            }
            Ok(_) => info!(query, "cache miss"),
            Err(e) => {
                let e = LookupError::StoreUnavailable(e);
                warn!(query, error = %e, "treating store failure as cache miss");
            }
        }

        let fresh = self.fetch_normalized().await?;
        let banks = QueryMatcher::new(query).filter(&fresh);
        info!(
            query,
            matched = banks.len(),
            fetched = fresh.len(),
            "answered from upstream"
        );

        self.persist.submit(fresh);

        Ok(LookupOutcome {
            banks,
            source: Source::Upstream,
        })
    }

    /// Runs a search and wraps the outcome in the caller-facing envelope
    pub async fn respond(&self, query: &str) -> LookupResponse {
        match self.search(query).await {
            Ok(outcome) => LookupResponse::found(outcome.banks),
            Err(e) => {
                warn!(query, error = %e, "lookup failed");
                LookupResponse::failed(&e)
            }
        }
    }

    /// Replaces the whole store with a fresh upstream snapshot
    ///
    /// Administrative path; unlike a search, store failures are returned.
    pub async fn refresh(&self) -> Result<usize, LookupError> {
        let fresh = self.fetch_normalized().await?;
        let count = tokio::time::timeout(self.timeout, self.store.reset_and_replace(&fresh))
            .await
            .unwrap_or(Err(StoreError::Timeout))
            .map_err(LookupError::PersistenceFailure)?;
        info!(count, "store reset from upstream");
        Ok(count)
    }

    /// Removes every stored record
    pub async fn clear(&self) -> Result<usize, LookupError> {
        let removed = tokio::time::timeout(self.timeout, self.store.delete_all())
            .await
            .unwrap_or(Err(StoreError::Timeout))
            .map_err(LookupError::StoreUnavailable)?;
        info!(removed, "store cleared");
        Ok(removed)
    }

    async fn check_cache(&self, query: &str) -> Result<Vec<BankRecord>, StoreError> {
        tokio::time::timeout(self.timeout, self.store.find(query))
            .await
            .unwrap_or(Err(StoreError::Timeout))
    }

    async fn fetch_normalized(&self) -> Result<Vec<BankRecord>, LookupError> {
        let raw = tokio::time::timeout(self.timeout, self.upstream.fetch_all())
            .await
            .unwrap_or_else(|_| {
                Err(UpstreamError::Unavailable(
                    "bank directory timed out".to_string(),
                ))
            })?;
        Ok(normalize(&raw, Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::data::RawRecord;
    use crate::persist::{self, PersistConfig};
    use async_trait::async_trait;
    use serde_json::json;

    struct StaticUpstream(Vec<RawRecord>);

    #[async_trait]
    impl UpstreamGateway for StaticUpstream {
        async fn fetch_all(&self) -> Result<Vec<RawRecord>, UpstreamError> {
            Ok(self.0.clone())
        }
    }

    struct SlowUpstream;

    #[async_trait]
    impl UpstreamGateway for SlowUpstream {
        async fn fetch_all(&self) -> Result<Vec<RawRecord>, UpstreamError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }
    }

    fn raw(name: &str, code: &str) -> RawRecord {
        json!({"name": name, "code": code})
            .as_object()
            .cloned()
            .expect("object literal")
    }

    fn lookup_with(upstream: Arc<dyn UpstreamGateway>) -> (BankLookup, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let (queue, _worker) = persist::spawn(store.clone(), PersistConfig::default());
        let lookup = BankLookup::new(store.clone(), upstream, queue, Duration::from_millis(200));
        (lookup, store)
    }

    #[test]
    fn test_response_serializes_empty_data_as_array() {
        let response = LookupResponse::found(Vec::new());
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["success"], true);
        assert!(json["data"].is_array());
        assert_eq!(json["message"], "Found 0 banks");
    }

    #[tokio::test]
    async fn test_miss_filters_fresh_batch() {
        let upstream = Arc::new(StaticUpstream(vec![
            raw("GTBank", "058"),
            raw("Zenith Bank", "057"),
        ]));
        let (lookup, _store) = lookup_with(upstream);

        let outcome = lookup.search("gtb").await.unwrap();

        assert_eq!(outcome.source, Source::Upstream);
        assert_eq!(outcome.banks.len(), 1);
        assert_eq!(outcome.banks[0].name, "GTBank");
    }

    #[tokio::test]
    async fn test_upstream_timeout_is_unavailable() {
        let (lookup, _store) = lookup_with(Arc::new(SlowUpstream));

        let result = lookup.search("").await;

        assert!(matches!(result, Err(LookupError::UpstreamUnavailable(_))));
    }

    #[tokio::test]
    async fn test_respond_hides_failure_detail() {
        let (lookup, _store) = lookup_with(Arc::new(SlowUpstream));

        let response = lookup.respond("zen").await;

        assert!(!response.success);
        assert!(response.data.is_empty());
        assert_eq!(response.message, "Failed to look up banks");
    }

    #[tokio::test]
    async fn test_refresh_replaces_store() {
        let upstream = Arc::new(StaticUpstream(vec![
            raw("GTBank", "058"),
            raw("Zenith Bank", "057"),
        ]));
        let (lookup, store) = lookup_with(upstream);
        store
            .upsert(&BankRecord::new("Defunct", "999", None, Utc::now()))
            .await
            .unwrap();

        assert_eq!(lookup.refresh().await.unwrap(), 2);
        assert_eq!(store.len().await, 2);
        assert!(store.find("defunct").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_empties_store() {
        let (lookup, store) = lookup_with(Arc::new(StaticUpstream(Vec::new())));
        store
            .upsert(&BankRecord::new("GTBank", "058", None, Utc::now()))
            .await
            .unwrap();

        assert_eq!(lookup.clear().await.unwrap(), 1);
        assert!(store.is_empty().await);
    }
}
