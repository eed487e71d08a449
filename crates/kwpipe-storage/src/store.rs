//! Keyword store: upsert of keyword rows keyed by (product, keyword, match type).

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use kwpipe_core::{MatchType, PersistedKeywordRow};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Destination for finished keyword rows.
///
/// `upsert_keywords` writes one batch; rows whose key already exists have every numeric and
/// source column overwritten. A batch either commits as a whole or fails as a whole.
#[async_trait]
pub trait KeywordStore: Send + Sync {
    async fn upsert_keywords(&self, rows: &[PersistedKeywordRow]) -> Result<usize, StoreError>;
}

/// Process-local store used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryKeywordStore {
    rows: Mutex<BTreeMap<(String, String, MatchType), PersistedKeywordRow>>,
}

impl MemoryKeywordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn rows(&self) -> Vec<PersistedKeywordRow> {
        self.rows
            .lock()
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn rows_for_product(&self, product_id: &str) -> Vec<PersistedKeywordRow> {
        self.rows()
            .into_iter()
            .filter(|row| row.product_id == product_id)
            .collect()
    }
}

#[async_trait]
impl KeywordStore for MemoryKeywordStore {
    async fn upsert_keywords(&self, rows: &[PersistedKeywordRow]) -> Result<usize, StoreError> {
        let mut map = self
            .rows
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))?;
        for row in rows {
            map.insert(row.unique_key(), row.clone());
        }
        Ok(rows.len())
    }
}

#[derive(Debug, Clone)]
pub struct PgKeywordStore {
    pool: PgPool,
}

impl PgKeywordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl KeywordStore for PgKeywordStore {
    async fn upsert_keywords(&self, rows: &[PersistedKeywordRow]) -> Result<usize, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO product_keywords (product_id, keyword, match_type, suggested_bid, \
             bid_range_start, bid_range_end, estimated_clicks, estimated_orders, source, \
             is_primary, created_at) ",
        );
        builder.push_values(rows, |mut b, row| {
            b.push_bind(&row.product_id)
                .push_bind(&row.keyword)
                .push_bind(row.match_type.as_str())
                .push_bind(row.suggested_bid)
                .push_bind(row.bid_range_start)
                .push_bind(row.bid_range_end)
                .push_bind(saturating_i64(row.estimated_clicks))
                .push_bind(saturating_i64(row.estimated_orders))
                .push_bind(&row.source)
                .push_bind(row.is_primary)
                .push_bind(row.created_at);
        });
        builder.push(
            r#"
            ON CONFLICT (product_id, keyword, match_type)
            DO UPDATE SET
                suggested_bid = EXCLUDED.suggested_bid,
                bid_range_start = EXCLUDED.bid_range_start,
                bid_range_end = EXCLUDED.bid_range_end,
                estimated_clicks = EXCLUDED.estimated_clicks,
                estimated_orders = EXCLUDED.estimated_orders,
                source = EXCLUDED.source,
                is_primary = EXCLUDED.is_primary
            "#,
        );

        builder.build().execute(&self.pool).await?;
        Ok(rows.len())
    }
}
