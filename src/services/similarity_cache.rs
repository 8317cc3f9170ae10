use chrono::{TimeDelta, Utc};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError, Weak},
    time::Duration,
};
use tokio::sync::Mutex as AsyncMutex;
use tracing::instrument;

use crate::{
    db::CatalogRepository,
    models::{CatalogArtist, SimilarityMap, SimilaritySnapshot},
    services::providers::SimilarityProvider,
};

/// Outcome of a similarity lookup
#[derive(Debug, Clone, PartialEq)]
pub enum CachedSimilarity {
    /// Cached data within its TTL; no provider call was made
    Fresh(SimilarityMap),
    /// Fetched from the provider during this lookup
    Refreshed(SimilarityMap),
    /// Refresh failed; the previously cached data is returned
    Stale(SimilarityMap),
    /// Refresh failed (or the record is unknown) and nothing was ever cached
    Unavailable,
}

impl CachedSimilarity {
    pub fn map(&self) -> Option<&SimilarityMap> {
        match self {
            CachedSimilarity::Fresh(map)
            | CachedSimilarity::Refreshed(map)
            | CachedSimilarity::Stale(map) => Some(map),
            CachedSimilarity::Unavailable => None,
        }
    }

    pub fn into_map(self) -> Option<SimilarityMap> {
        match self {
            CachedSimilarity::Fresh(map)
            | CachedSimilarity::Refreshed(map)
            | CachedSimilarity::Stale(map) => Some(map),
            CachedSimilarity::Unavailable => None,
        }
    }

    /// Weight towards `other_id`; anything missing counts as 0
    pub fn weight_of(&self, other_id: &str) -> f64 {
        self.map()
            .and_then(|map| map.get(other_id))
            .copied()
            .unwrap_or(0.0)
    }

    /// True when a zero weight may mean "unknown" rather than "unrelated"
    pub fn is_unavailable(&self) -> bool {
        matches!(self, CachedSimilarity::Unavailable)
    }
}

/// Read-through cache of per-artist similarity maps
///
/// Records live in a [`CatalogRepository`]; the provider is only called when
/// a record was never fetched or its data is older than the TTL. Refreshes
/// of the same record are serialised by a per-id lock; different records
/// refresh independently.
pub struct SimilarityCache {
    repository: Arc<dyn CatalogRepository>,
    provider: Arc<dyn SimilarityProvider>,
    ttl: TimeDelta,
    fetch_timeout: Duration,
    refresh_locks: Mutex<HashMap<String, Weak<AsyncMutex<()>>>>,
}

impl SimilarityCache {
    pub fn new(
        repository: Arc<dyn CatalogRepository>,
        provider: Arc<dyn SimilarityProvider>,
        ttl: TimeDelta,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            repository,
            provider,
            ttl,
            fetch_timeout,
            refresh_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Similarity map for `catalog_id`, refreshed first when stale
    ///
    /// Returns `None` only when nothing was ever cached and the refresh
    /// failed.
    pub async fn get_similarity_map(&self, catalog_id: &str) -> Option<SimilarityMap> {
        self.lookup(catalog_id).await.into_map()
    }

    /// Similarity of `catalog_id` towards `other_id`, in `[0, 1]`
    pub async fn similarity_between(&self, catalog_id: &str, other_id: &str) -> f64 {
        if catalog_id == other_id {
            return 1.0;
        }
        self.lookup(catalog_id).await.weight_of(other_id)
    }

    /// Like [`get_similarity_map`](Self::get_similarity_map), but reports
    /// where the data came from
    #[instrument(skip(self))]
    pub async fn lookup(&self, catalog_id: &str) -> CachedSimilarity {
        let Some(record) = self.load(catalog_id).await else {
            return CachedSimilarity::Unavailable;
        };

        if let Some(snapshot) = fresh_snapshot(&record, self.ttl) {
            tracing::debug!("Similarity cache hit");
            return CachedSimilarity::Fresh(snapshot.map);
        }

        tracing::debug!("Similarity cache miss");
        self.refresh(catalog_id).await
    }

    async fn refresh(&self, catalog_id: &str) -> CachedSimilarity {
        let lock = self.refresh_lock(catalog_id);
        let _guard = lock.lock().await;

        // Another task may have refreshed the record while this one waited
        let Some(record) = self.load(catalog_id).await else {
            return CachedSimilarity::Unavailable;
        };
        if let Some(snapshot) = fresh_snapshot(&record, self.ttl) {
            return CachedSimilarity::Fresh(snapshot.map);
        }

        let fetched = match tokio::time::timeout(self.fetch_timeout, self.provider.fetch(catalog_id)).await {
            Ok(Ok(map)) => map,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Similarity provider failed, keeping cached data");
                return fallback(record);
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.fetch_timeout.as_millis() as u64,
                    "Similarity provider timed out, keeping cached data"
                );
                return fallback(record);
            }
        };

        let snapshot = SimilaritySnapshot::new(fetched, Utc::now());
        match self.repository.store_similarity(catalog_id, &snapshot).await {
            Ok(true) => {
                tracing::info!(related = snapshot.map.len(), "Similarity data refreshed");
            }
            Ok(false) => {
                tracing::warn!("Catalog artist disappeared before refresh could be stored");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to persist refreshed similarity data");
            }
        }

        CachedSimilarity::Refreshed(snapshot.map)
    }

    async fn load(&self, catalog_id: &str) -> Option<CatalogArtist> {
        match self.repository.get(catalog_id).await {
            Ok(Some(record)) => Some(record),
            Ok(None) => {
                tracing::warn!("Unknown catalog artist");
                None
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load catalog artist");
                None
            }
        }
    }

    /// Lock guarding refreshes of one record
    ///
    /// Entries are weak so the table only holds ids with a refresh in flight.
    fn refresh_lock(&self, catalog_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self
            .refresh_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(lock) = locks.get(catalog_id).and_then(Weak::upgrade) {
            return lock;
        }

        locks.retain(|_, lock| lock.strong_count() > 0);
        let lock = Arc::new(AsyncMutex::new(()));
        locks.insert(catalog_id.to_string(), Arc::downgrade(&lock));
        lock
    }
}

fn fresh_snapshot(record: &CatalogArtist, ttl: TimeDelta) -> Option<SimilaritySnapshot> {
    if record.needs_refresh(Utc::now(), ttl) {
        None
    } else {
        record.similarity.clone()
    }
}

fn fallback(record: CatalogArtist) -> CachedSimilarity {
    match record.similarity {
        Some(snapshot) => CachedSimilarity::Stale(snapshot.map),
        None => CachedSimilarity::Unavailable,
    }
}
