use chrono::{DateTime, Utc};
use kwpipe_core::{CandidateKeyword, PersistedKeywordRow};
use kwpipe_storage::KeywordStore;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::PipelineError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistOutcome {
    pub attempted: usize,
    pub persisted: usize,
    pub failed_batches: usize,
}

/// Upserts `keywords` for one product in independent batches.
///
/// A failed batch is logged and its rows count as not persisted; later batches still run.
pub async fn persist_keywords(
    store: &dyn KeywordStore,
    product_id: &str,
    keywords: &[CandidateKeyword],
    batch_size: usize,
    created_at: DateTime<Utc>,
) -> PersistOutcome {
    let rows = keywords
        .iter()
        .map(|kw| PersistedKeywordRow::from_candidate(product_id, kw, created_at))
        .collect::<Vec<_>>();

    let mut outcome = PersistOutcome {
        attempted: rows.len(),
        ..Default::default()
    };
    for (index, batch) in rows.chunks(batch_size.max(1)).enumerate() {
        match store.upsert_keywords(batch).await {
            Ok(written) => {
                debug!(asin = product_id, batch = index, written, "keyword batch upserted");
                outcome.persisted += written;
            }
            Err(error) => {
                let err = PipelineError::PersistenceBatch {
                    asin: product_id.to_string(),
                    batch: index,
                    error,
                };
                warn!(asin = product_id, batch = index, rows = batch.len(), error = %err, "keyword batch not persisted");
                outcome.failed_batches += 1;
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kwpipe_core::{KeywordSource, MatchType};
    use kwpipe_storage::{MemoryKeywordStore, StoreError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn keywords(n: usize) -> Vec<CandidateKeyword> {
        (0..n)
            .map(|i| {
                CandidateKeyword::new(format!("keyword {i}"), MatchType::Broad, 100, KeywordSource::Suggested)
            })
            .collect()
    }

    /// Fails every second batch.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryKeywordStore,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl KeywordStore for FlakyStore {
        async fn upsert_keywords(&self, rows: &[PersistedKeywordRow]) -> Result<usize, StoreError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 1 {
                return Err(StoreError::Unavailable("connection reset".into()));
            }
            self.inner.upsert_keywords(rows).await
        }
    }

    #[tokio::test]
    async fn failed_batch_does_not_stop_later_batches() {
        let store = FlakyStore::default();
        let outcome = persist_keywords(&store, "B000TEST01", &keywords(7), 3, Utc::now()).await;

        assert_eq!(
            outcome,
            PersistOutcome {
                attempted: 7,
                persisted: 4,
                failed_batches: 1
            }
        );
        assert_eq!(store.inner.len(), 4);
    }

    #[tokio::test]
    async fn rerun_overwrites_instead_of_duplicating() {
        let store = MemoryKeywordStore::new();
        let mut kws = keywords(5);
        persist_keywords(&store, "B000TEST01", &kws, 2, Utc::now()).await;

        kws[0].suggested_bid_cents = 250;
        kws[0].enrichment_source = Some(MatchType::Exact);
        let outcome = persist_keywords(&store, "B000TEST01", &kws, 2, Utc::now()).await;

        assert_eq!(outcome.persisted, 5);
        let rows = store.rows_for_product("B000TEST01");
        assert_eq!(rows.len(), 5);
        let first = rows.iter().find(|r| r.keyword == "keyword 0").expect("row");
        assert_eq!(first.suggested_bid, 250);
        assert_eq!(first.source, "suggested_enriched_exact");
    }
}
