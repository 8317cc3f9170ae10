use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Related catalog id → similarity weight in `[0, 1]`
pub type SimilarityMap = HashMap<String, f64>;

/// A similarity map together with the moment it was fetched
///
/// Map and timestamp always travel together so a record can never hold a
/// fresh timestamp next to a stale map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilaritySnapshot {
    pub map: SimilarityMap,
    pub cached_at: DateTime<Utc>,
}

impl SimilaritySnapshot {
    pub fn new(map: SimilarityMap, cached_at: DateTime<Utc>) -> Self {
        Self { map, cached_at }
    }

    /// True once `cached_at` is older than `now - ttl`
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.cached_at < now - ttl
    }
}

/// External-catalog performer used as a node of the similarity graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogArtist {
    pub catalog_id: String,
    pub display_name: String,
    /// `None` until the first successful fetch. An empty map is a valid
    /// "no related artists" result and is not the same thing.
    pub similarity: Option<SimilaritySnapshot>,
}

impl CatalogArtist {
    pub fn new(catalog_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            catalog_id: catalog_id.into(),
            display_name: display_name.into(),
            similarity: None,
        }
    }

    pub fn with_similarity(mut self, map: SimilarityMap, cached_at: DateTime<Utc>) -> Self {
        self.similarity = Some(SimilaritySnapshot::new(map, cached_at));
        self
    }

    /// Whether the cached similarity data must be fetched again
    pub fn needs_refresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match &self.similarity {
            None => true,
            Some(snapshot) => snapshot.is_expired(now, ttl),
        }
    }

    pub fn similarity_map(&self) -> Option<&SimilarityMap> {
        self.similarity.as_ref().map(|s| &s.map)
    }

    pub fn cached_at(&self) -> Option<DateTime<Utc>> {
        self.similarity.as_ref().map(|s| s.cached_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_fetched_needs_refresh() {
        let artist = CatalogArtist::new("123", "Test Artist");
        assert!(artist.needs_refresh(Utc::now(), Duration::days(30)));
        assert_eq!(artist.similarity_map(), None);
        assert_eq!(artist.cached_at(), None);
    }

    #[test]
    fn test_empty_map_is_still_fresh() {
        let artist = CatalogArtist::new("123", "Test Artist").with_similarity(HashMap::new(), Utc::now());
        assert!(!artist.needs_refresh(Utc::now(), Duration::days(30)));
        assert_eq!(artist.similarity_map(), Some(&HashMap::new()));
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        let ttl = Duration::days(30);

        let just_inside = CatalogArtist::new("123", "a")
            .with_similarity(HashMap::new(), now - ttl + Duration::hours(1));
        assert!(!just_inside.needs_refresh(now, ttl));

        let just_outside = CatalogArtist::new("123", "a")
            .with_similarity(HashMap::new(), now - ttl - Duration::hours(1));
        assert!(just_outside.needs_refresh(now, ttl));
    }
}
