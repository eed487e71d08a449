use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use kwpipe_adapters::{AccessToken, AdsApi, AdsApiConfig, AdsClient};
use kwpipe_core::{CandidateKeyword, KeywordSource};
use kwpipe_storage::{
    KeywordStore, MemoryCatalog, MemoryKeywordStore, PgKeywordStore, PgProductCatalog,
    ProductCatalog,
};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::dedup::dedup_keywords;
use crate::enrichment::enrich_keywords;
use crate::error::PipelineError;
use crate::expansion::{expand_match_types, expand_templates};
use crate::fallback::generate_fallback;
use crate::persistence::{persist_keywords, PersistOutcome};
use crate::report::{CollectionReport, ReportedKeyword, RunSummary};
use crate::sources::{fetch_recommendations, fetch_suggested};

/// Result of processing one ASIN.
#[derive(Debug, Clone, Default)]
pub struct ProductOutcome {
    pub keywords: Vec<CandidateKeyword>,
    pub used_fallback: bool,
    pub persisted: PersistOutcome,
}

/// Collects, expands, enriches, and persists keywords for a list of ASINs.
pub struct KeywordPipeline {
    api: Arc<dyn AdsApi>,
    store: Arc<dyn KeywordStore>,
    catalog: Arc<dyn ProductCatalog>,
    config: PipelineConfig,
}

impl KeywordPipeline {
    pub fn new(
        api: Arc<dyn AdsApi>,
        store: Arc<dyn KeywordStore>,
        catalog: Arc<dyn ProductCatalog>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            api,
            store,
            catalog,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs every ASIN in order, one at a time.
    ///
    /// Only the token exchange can fail the run. Anything that goes wrong for a single product
    /// lands that ASIN in `failedAsins` and the run moves on.
    pub async fn run(&self, asins: &[String]) -> Result<CollectionReport, PipelineError> {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();

        let token = self.api.access_token().await.map_err(PipelineError::Auth)?;
        info!(%run_id, products = asins.len(), "keyword collection started");

        let mut keywords = Vec::new();
        let mut processed = Vec::new();
        let mut failed = Vec::new();
        let mut persisted = 0usize;

        for (index, asin) in asins.iter().enumerate() {
            if index > 0 && !self.config.product_pause.is_zero() {
                tokio::time::sleep(self.config.product_pause).await;
            }

            let span = info_span!("collect_keywords", %run_id, asin = %asin);
            match self.process_product(&token, asin).instrument(span).await {
                Ok(outcome) if !outcome.keywords.is_empty() => {
                    info!(
                        asin = %asin,
                        keywords = outcome.keywords.len(),
                        persisted = outcome.persisted.persisted,
                        fallback = outcome.used_fallback,
                        "product processed"
                    );
                    persisted += outcome.persisted.persisted;
                    processed.push(asin.clone());
                    keywords.extend(outcome.keywords.into_iter().map(|keyword| ReportedKeyword {
                        asin: asin.clone(),
                        keyword,
                    }));
                }
                Ok(_) => {
                    warn!(asin = %asin, "no keywords from sources or catalog fallback");
                    failed.push(asin.clone());
                }
                Err(err) => {
                    warn!(asin = %asin, error = %err, "product failed");
                    failed.push(asin.clone());
                }
            }
        }

        let summary = RunSummary::from_run(
            &keywords,
            processed,
            failed,
            persisted,
            self.config.quality_target_per_product,
        );
        info!(
            %run_id,
            keywords = summary.total_keywords,
            processed = summary.asins_processed,
            failed = summary.asins_failed,
            "keyword collection finished"
        );

        Ok(CollectionReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            success: true,
            message: summary.message(),
            keywords,
            summary,
        })
    }

    /// Source fetch, expansion, first dedup, bid enrichment, templates, and the final dedup
    /// for one ASIN.
    ///
    /// Template keywords are derived from enriched seeds and are never sent for bids
    /// themselves.
    pub async fn collect_comprehensive(
        &self,
        token: &AccessToken,
        asin: &str,
    ) -> Vec<CandidateKeyword> {
        let api = self.api.as_ref();
        let config = &self.config;

        let suggested = fetch_suggested(api, token, asin, config).await;
        let recommendations = fetch_recommendations(api, token, asin, &suggested, config).await;

        let base = &suggested[..suggested.len().min(config.expansion_base_cap)];
        let expanded = expand_match_types(base);
        let mut merged = dedup_keywords(
            suggested.iter().cloned().chain(recommendations).chain(expanded),
            None,
        );

        enrich_keywords(api, token, asin, &mut merged, config).await;

        let seeds = merged
            .iter()
            .filter(|kw| kw.source == KeywordSource::Suggested)
            .take(config.template_seed_cap)
            .cloned()
            .collect::<Vec<_>>();
        let templates = expand_templates(&seeds);
        dedup_keywords(merged.into_iter().chain(templates), Some(config.max_keyword_len))
    }

    pub async fn process_product(
        &self,
        token: &AccessToken,
        asin: &str,
    ) -> Result<ProductOutcome, PipelineError> {
        let mut keywords = self.collect_comprehensive(token, asin).await;
        let mut used_fallback = false;

        if keywords.is_empty() {
            used_fallback = true;
            let product = self.catalog.find_product(asin).await.map_err(|error| {
                PipelineError::ProductProcessing {
                    asin: asin.to_string(),
                    error,
                }
            })?;
            keywords = product
                .map(|p| generate_fallback(&p, self.config.max_keyword_len))
                .unwrap_or_default();
            info!(count = keywords.len(), "catalog fallback keywords generated");
        }

        if keywords.is_empty() {
            return Ok(ProductOutcome {
                used_fallback,
                ..Default::default()
            });
        }

        let persisted = persist_keywords(
            self.store.as_ref(),
            asin,
            &keywords,
            self.config.persist_batch_size,
            Utc::now(),
        )
        .await;
        Ok(ProductOutcome {
            keywords,
            used_fallback,
            persisted,
        })
    }
}

/// Builds a pipeline from the environment.
///
/// Missing advertising credentials are a [`PipelineError::Config`]. With `DATABASE_URL` set
/// (and `dry_run` off) keywords go to Postgres; otherwise they stay in memory.
pub async fn pipeline_from_env(dry_run: bool) -> Result<KeywordPipeline, PipelineError> {
    let ads_config = AdsApiConfig::from_env().map_err(PipelineError::Config)?;
    let config = PipelineConfig::from_env()?;
    let api = AdsClient::new(ads_config)?;

    let database_url = std::env::var("DATABASE_URL")
        .ok()
        .filter(|url| !url.trim().is_empty());
    let (store, catalog): (Arc<dyn KeywordStore>, Arc<dyn ProductCatalog>) =
        match database_url {
            Some(url) if !dry_run => {
                let store = PgKeywordStore::connect(url.trim())
                    .await
                    .context("connecting keyword store")?;
                let catalog = PgProductCatalog::new(store.pool().clone());
                (Arc::new(store), Arc::new(catalog))
            }
            _ => {
                warn!(dry_run, "keywords are kept in memory only");
                (
                    Arc::new(MemoryKeywordStore::new()),
                    Arc::new(MemoryCatalog::new()),
                )
            }
        };

    Ok(KeywordPipeline::new(Arc::new(api), store, catalog, config))
}
