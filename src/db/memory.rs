//! In-memory stores
//!
//! Back the engine without a database: unit tests, HTTP tests and local demos
//! all seed these directly.

use chrono::NaiveDate;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::{
    db::{CatalogRepository, ConcertSource, SubscriberSource},
    error::AppResult,
    models::{CatalogArtist, Concert, SimilaritySnapshot, Subscriber},
};

#[derive(Default)]
pub struct InMemoryCatalog {
    records: RwLock<HashMap<String, CatalogArtist>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from complete records, cached similarity included
    pub fn with_artists(artists: impl IntoIterator<Item = CatalogArtist>) -> Self {
        let records = artists
            .into_iter()
            .map(|artist| (artist.catalog_id.clone(), artist))
            .collect();
        Self {
            records: RwLock::new(records),
        }
    }
}

#[async_trait::async_trait]
impl CatalogRepository for InMemoryCatalog {
    async fn get(&self, catalog_id: &str) -> AppResult<Option<CatalogArtist>> {
        Ok(self.records.read().await.get(catalog_id).cloned())
    }

    async fn store_similarity(
        &self,
        catalog_id: &str,
        snapshot: &SimilaritySnapshot,
    ) -> AppResult<bool> {
        let mut records = self.records.write().await;
        match records.get_mut(catalog_id) {
            Some(record) => {
                record.similarity = Some(snapshot.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct InMemoryConcerts {
    concerts: RwLock<Vec<Concert>>,
}

impl InMemoryConcerts {
    pub fn new(concerts: Vec<Concert>) -> Self {
        Self {
            concerts: RwLock::new(concerts),
        }
    }
}

#[async_trait::async_trait]
impl ConcertSource for InMemoryConcerts {
    async fn concerts_between(&self, start: NaiveDate, end: NaiveDate) -> AppResult<Vec<Concert>> {
        Ok(self
            .concerts
            .read()
            .await
            .iter()
            .filter(|c| start <= c.date && c.date <= end)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemorySubscribers {
    subscribers: RwLock<Vec<Subscriber>>,
}

impl InMemorySubscribers {
    /// Subscribers given here are assumed to be opted in and verified
    pub fn new(subscribers: Vec<Subscriber>) -> Self {
        Self {
            subscribers: RwLock::new(subscribers),
        }
    }
}

#[async_trait::async_trait]
impl SubscriberSource for InMemorySubscribers {
    async fn digest_subscribers(&self) -> AppResult<Vec<Subscriber>> {
        Ok(self.subscribers.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_get_returns_seeded_record() {
        let now = Utc::now();
        let catalog = InMemoryCatalog::with_artists([CatalogArtist::new("123", "Seeded")
            .with_similarity(HashMap::from([("456".to_string(), 0.5)]), now)]);

        let artist = catalog.get("123").await.unwrap().unwrap();
        assert_eq!(artist.display_name, "Seeded");
        assert_eq!(artist.cached_at(), Some(now));
        assert_eq!(catalog.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_similarity_missing_record() {
        let catalog = InMemoryCatalog::new();
        let snapshot = SimilaritySnapshot::new(HashMap::new(), Utc::now());
        assert!(!catalog.store_similarity("nope", &snapshot).await.unwrap());
    }

    #[tokio::test]
    async fn test_store_similarity_replaces_pair() {
        let catalog = InMemoryCatalog::with_artists([CatalogArtist::new("123", "a")]);
        let snapshot = SimilaritySnapshot::new(HashMap::from([("9".to_string(), 0.1)]), Utc::now());

        assert!(catalog.store_similarity("123", &snapshot).await.unwrap());
        let artist = catalog.get("123").await.unwrap().unwrap();
        assert_eq!(artist.similarity, Some(snapshot));
    }
}
