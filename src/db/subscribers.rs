use sqlx::PgPool;
use std::collections::{BTreeSet, HashMap};

use crate::{db::concerts::parse_tags, error::AppResult, models::Subscriber};

/// Source of digest recipients
#[async_trait::async_trait]
pub trait SubscriberSource: Send + Sync {
    /// Subscribers who opted into the weekly digest and verified their address
    async fn digest_subscribers(&self) -> AppResult<Vec<Subscriber>>;
}

#[derive(Debug, sqlx::FromRow)]
struct SubscriberRow {
    subscriber_id: i64,
    contact_address: String,
    preferred_tags: Vec<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct ReferenceRow {
    subscriber_id: i64,
    catalog_id: String,
}

/// Postgres-backed subscriber source
#[derive(Clone)]
pub struct PgSubscriberSource {
    pool: PgPool,
}

impl PgSubscriberSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SubscriberSource for PgSubscriberSource {
    async fn digest_subscribers(&self) -> AppResult<Vec<Subscriber>> {
        let rows = sqlx::query_as::<_, SubscriberRow>(
            r#"
            SELECT subscriber_id, contact_address, preferred_tags
            FROM subscribers
            WHERE weekly_digest AND address_verified
            ORDER BY subscriber_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<i64> = rows.iter().map(|r| r.subscriber_id).collect();
        let reference_rows = sqlx::query_as::<_, ReferenceRow>(
            r#"
            SELECT subscriber_id, catalog_id
            FROM subscriber_references
            WHERE subscriber_id = ANY($1)
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut references: HashMap<i64, BTreeSet<String>> = HashMap::new();
        for row in reference_rows {
            references.entry(row.subscriber_id).or_default().insert(row.catalog_id);
        }

        Ok(rows
            .into_iter()
            .map(|row| Subscriber {
                subscriber_id: row.subscriber_id,
                contact_address: row.contact_address,
                reference_artists: references.remove(&row.subscriber_id).unwrap_or_default(),
                preferred_tags: parse_tags(row.subscriber_id, &row.preferred_tags),
            })
            .collect())
    }
}
