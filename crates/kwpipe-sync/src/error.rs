use kwpipe_adapters::AdsError;
use kwpipe_storage::StoreError;
use thiserror::Error;

/// Failure taxonomy of a collection run.
///
/// `Config` and `Setup` come out of [`crate::pipeline_from_env`], `Auth` out of
/// [`crate::KeywordPipeline::run`]. The rest are logged where they happen and the run continues
/// with degraded results.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("advertising credentials check failed: {0}")]
    Config(#[source] AdsError),
    #[error("token exchange failed: {0}")]
    Auth(#[source] AdsError),
    #[error("{fetcher} fetch failed for {asin}: {error}")]
    SourceFetch {
        fetcher: &'static str,
        asin: String,
        #[source]
        error: AdsError,
    },
    #[error("owned ASIN lookup failed, falling back to {fallback_asin}: {error}")]
    OwnedAsinResolution {
        fallback_asin: String,
        #[source]
        error: AdsError,
    },
    #[error("bid batch {batch} for {asin} failed: {error}")]
    BidBatch {
        asin: String,
        batch: usize,
        #[source]
        error: AdsError,
    },
    #[error("persisting batch {batch} for {asin} failed: {error}")]
    PersistenceBatch {
        asin: String,
        batch: usize,
        #[source]
        error: StoreError,
    },
    #[error("processing {asin} failed: {error}")]
    ProductProcessing {
        asin: String,
        #[source]
        error: StoreError,
    },
    #[error(transparent)]
    Setup(#[from] anyhow::Error),
}

impl PipelineError {
    /// Whether the error ends the whole run rather than one product, batch, or fetcher.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::Config(_) | PipelineError::Auth(_) | PipelineError::Setup(_)
        )
    }
}
