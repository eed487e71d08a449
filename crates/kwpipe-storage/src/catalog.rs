//! Read-only product catalog lookup by ASIN.

use std::collections::HashMap;

use async_trait::async_trait;
use kwpipe_core::CatalogProduct;
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use crate::store::StoreError;

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// `Ok(None)` when the catalog has no row for `asin`.
    async fn find_product(&self, asin: &str) -> Result<Option<CatalogProduct>, StoreError>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryCatalog {
    products: HashMap<String, CatalogProduct>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_product(mut self, product: CatalogProduct) -> Self {
        self.products.insert(product.asin.clone(), product);
        self
    }
}

#[async_trait]
impl ProductCatalog for MemoryCatalog {
    async fn find_product(&self, asin: &str) -> Result<Option<CatalogProduct>, StoreError> {
        Ok(self.products.get(asin).cloned())
    }
}

#[derive(Debug, Clone)]
pub struct PgProductCatalog {
    pool: PgPool,
}

impl PgProductCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductCatalog for PgProductCatalog {
    async fn find_product(&self, asin: &str) -> Result<Option<CatalogProduct>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, title, brand, category, bullet_points
              FROM products
             WHERE id = $1
            "#,
        )
        .bind(asin)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let bullet_points: Option<Json<Vec<String>>> = row.try_get("bullet_points")?;
        Ok(Some(CatalogProduct {
            asin: row.try_get("id")?,
            title: row.try_get("title")?,
            brand: row.try_get("brand")?,
            category: row.try_get("category")?,
            bullet_points: bullet_points.map(|Json(points)| points).unwrap_or_default(),
        }))
    }
}
