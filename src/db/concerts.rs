use chrono::NaiveDate;
use sqlx::PgPool;
use std::collections::{BTreeSet, HashMap};

use crate::{
    error::AppResult,
    models::{Concert, ConcertTag, LocalArtist, Venue, VenueStatus},
};

/// Read access to scheduled concerts
#[async_trait::async_trait]
pub trait ConcertSource: Send + Sync {
    /// Concerts dated within `[start, end]`, each with its full bill
    ///
    /// Implementations may already drop concerts that are not publicly
    /// visible; callers re-check visibility either way.
    async fn concerts_between(&self, start: NaiveDate, end: NaiveDate) -> AppResult<Vec<Concert>>;
}

#[derive(Debug, sqlx::FromRow)]
struct ConcertRow {
    concert_id: i64,
    date: NaiveDate,
    tags: Vec<String>,
    cancelled: bool,
    venue_id: i64,
    venue_name: String,
    is_verified: bool,
    declined_listing: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct BillRow {
    concert_id: i64,
    artist_id: i64,
    name: String,
    is_placeholder: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct AnalogRow {
    artist_id: i64,
    catalog_id: String,
}

/// Parses stored tag codes, skipping any the engine no longer knows
pub(crate) fn parse_tags(concert_or_subscriber: i64, codes: &[String]) -> BTreeSet<ConcertTag> {
    codes
        .iter()
        .filter_map(|code| match code.parse::<ConcertTag>() {
            Ok(tag) => Some(tag),
            Err(e) => {
                tracing::warn!(id = concert_or_subscriber, error = %e, "Skipping stored tag");
                None
            }
        })
        .collect()
}

/// Postgres-backed concert source
///
/// Visibility is applied in SQL: cancelled concerts, unverified or declined
/// venues and bills with placeholder performers never leave the database.
#[derive(Clone)]
pub struct PgConcertSource {
    pool: PgPool,
}

impl PgConcertSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_bills(&self, concert_ids: &[i64]) -> AppResult<HashMap<i64, Vec<LocalArtist>>> {
        let bill_rows = sqlx::query_as::<_, BillRow>(
            r#"
            SELECT b.concert_id, a.artist_id, a.name, a.is_placeholder
            FROM concert_bill b
            JOIN local_artists a ON a.artist_id = b.artist_id
            WHERE b.concert_id = ANY($1)
            ORDER BY b.concert_id, b.set_order
            "#,
        )
        .bind(concert_ids)
        .fetch_all(&self.pool)
        .await?;

        let artist_ids: Vec<i64> = bill_rows.iter().map(|r| r.artist_id).collect();
        let analog_rows = sqlx::query_as::<_, AnalogRow>(
            r#"
            SELECT artist_id, catalog_id
            FROM local_artist_analogs
            WHERE artist_id = ANY($1)
            "#,
        )
        .bind(&artist_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut analogs: HashMap<i64, BTreeSet<String>> = HashMap::new();
        for row in analog_rows {
            analogs.entry(row.artist_id).or_default().insert(row.catalog_id);
        }

        let mut bills: HashMap<i64, Vec<LocalArtist>> = HashMap::new();
        for row in bill_rows {
            bills.entry(row.concert_id).or_default().push(LocalArtist {
                artist_id: row.artist_id,
                name: row.name,
                chosen_analogs: analogs.get(&row.artist_id).cloned().unwrap_or_default(),
                is_placeholder: row.is_placeholder,
            });
        }

        Ok(bills)
    }
}

#[async_trait::async_trait]
impl ConcertSource for PgConcertSource {
    async fn concerts_between(&self, start: NaiveDate, end: NaiveDate) -> AppResult<Vec<Concert>> {
        let rows = sqlx::query_as::<_, ConcertRow>(
            r#"
            SELECT c.concert_id, c.date, c.tags, c.cancelled,
                   v.venue_id, v.name AS venue_name, v.is_verified, v.declined_listing
            FROM concerts c
            JOIN venues v ON v.venue_id = c.venue_id
            WHERE c.date BETWEEN $1 AND $2
              AND NOT c.cancelled
              AND v.is_verified
              AND NOT v.declined_listing
              AND NOT EXISTS (
                  SELECT 1 FROM concert_bill b
                  JOIN local_artists a ON a.artist_id = b.artist_id
                  WHERE b.concert_id = c.concert_id AND a.is_placeholder
              )
            ORDER BY c.date, c.concert_id
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        let concert_ids: Vec<i64> = rows.iter().map(|r| r.concert_id).collect();
        let mut bills = self.load_bills(&concert_ids).await?;

        let concerts = rows
            .into_iter()
            .map(|row| Concert {
                concert_id: row.concert_id,
                date: row.date,
                tags: parse_tags(row.concert_id, &row.tags),
                cancelled: row.cancelled,
                venue: Venue {
                    venue_id: row.venue_id,
                    name: row.venue_name,
                    status: VenueStatus::from_flags(row.is_verified, row.declined_listing),
                },
                bill: bills.remove(&row.concert_id).unwrap_or_default(),
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            start = %start,
            end = %end,
            concerts = concerts.len(),
            "Loaded concerts"
        );

        Ok(concerts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tags_skips_unknown_codes() {
        let codes = vec!["OG".to_string(), "ZZ".to_string(), "DJ".to_string()];
        let tags = parse_tags(1, &codes);
        assert_eq!(tags, BTreeSet::from([ConcertTag::Originals, ConcertTag::Dj]));
    }
}
