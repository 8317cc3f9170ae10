use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgPool};

use crate::{
    error::AppResult,
    models::{CatalogArtist, SimilarityMap, SimilaritySnapshot},
};

/// Storage for catalog artist records and their cached similarity data
///
/// `store_similarity` replaces map and timestamp in one write so readers
/// never observe a mix of two fetches.
#[async_trait::async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn get(&self, catalog_id: &str) -> AppResult<Option<CatalogArtist>>;

    /// Atomically replace the cached similarity snapshot
    ///
    /// Returns `false` when no record with `catalog_id` exists.
    async fn store_similarity(
        &self,
        catalog_id: &str,
        snapshot: &SimilaritySnapshot,
    ) -> AppResult<bool>;
}

#[derive(Debug, sqlx::FromRow)]
struct CatalogArtistRow {
    catalog_id: String,
    display_name: String,
    similarity_map: Option<Json<SimilarityMap>>,
    cached_at: Option<DateTime<Utc>>,
}

impl From<CatalogArtistRow> for CatalogArtist {
    fn from(row: CatalogArtistRow) -> Self {
        let similarity = match (row.similarity_map, row.cached_at) {
            (Some(Json(map)), Some(cached_at)) => Some(SimilaritySnapshot::new(map, cached_at)),
            (None, None) => None,
            _ => {
                tracing::warn!(
                    catalog_id = %row.catalog_id,
                    "Similarity map and timestamp out of sync, treating as never fetched"
                );
                None
            }
        };

        CatalogArtist {
            catalog_id: row.catalog_id,
            display_name: row.display_name,
            similarity,
        }
    }
}

/// Postgres-backed catalog repository
#[derive(Clone)]
pub struct PgCatalogRepository {
    pool: PgPool,
}

impl PgCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CatalogRepository for PgCatalogRepository {
    async fn get(&self, catalog_id: &str) -> AppResult<Option<CatalogArtist>> {
        let row = sqlx::query_as::<_, CatalogArtistRow>(
            r#"
            SELECT catalog_id, display_name, similarity_map, cached_at
            FROM catalog_artists
            WHERE catalog_id = $1
            "#,
        )
        .bind(catalog_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(CatalogArtist::from))
    }

    async fn store_similarity(
        &self,
        catalog_id: &str,
        snapshot: &SimilaritySnapshot,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE catalog_artists
            SET similarity_map = $2, cached_at = $3
            WHERE catalog_id = $1
            "#,
        )
        .bind(catalog_id)
        .bind(Json(&snapshot.map))
        .bind(snapshot.cached_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
