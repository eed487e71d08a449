//! The two optional source fetchers. Either may fail; a failure is logged and yields no
//! candidates.

use kwpipe_adapters::normalize::{recommendation_candidates, suggested_candidates};
use kwpipe_adapters::{AccessToken, AdsApi, AdsError, RecommendationRequest};
use kwpipe_core::CandidateKeyword;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::PipelineError;

fn degrade(fetcher: &'static str, asin: &str, error: AdsError) -> Vec<CandidateKeyword> {
    let err = PipelineError::SourceFetch {
        fetcher,
        asin: asin.to_string(),
        error,
    };
    warn!(asin, fetcher, status = ?source_status(&err), error = %err, "source fetch degraded to empty");
    Vec::new()
}

fn source_status(err: &PipelineError) -> Option<u16> {
    match err {
        PipelineError::SourceFetch {
            error: AdsError::Fetch(fetch),
            ..
        } => fetch.status(),
        _ => None,
    }
}

/// Suggested keywords for `asin`, the first `primary_cutoff` of them marked primary.
pub async fn fetch_suggested(
    api: &dyn AdsApi,
    token: &AccessToken,
    asin: &str,
    config: &PipelineConfig,
) -> Vec<CandidateKeyword> {
    let body = match api.suggested_keywords(token, asin, config.suggested_cap).await {
        Ok(body) => body,
        Err(err) => return degrade("suggested", asin, err),
    };
    let candidates = match suggested_candidates(&body) {
        Ok(candidates) => candidates,
        Err(err) => return degrade("suggested", asin, err),
    };

    let out = candidates
        .into_iter()
        .take(config.suggested_cap)
        .enumerate()
        .map(|(i, kw)| kw.primary(i < config.primary_cutoff))
        .collect::<Vec<_>>();
    info!(asin, count = out.len(), "suggested keywords fetched");
    out
}

/// Recommendations for `asin`, seeded with the leading suggested texts.
pub async fn fetch_recommendations(
    api: &dyn AdsApi,
    token: &AccessToken,
    asin: &str,
    suggested: &[CandidateKeyword],
    config: &PipelineConfig,
) -> Vec<CandidateKeyword> {
    let seeds = suggested
        .iter()
        .take(config.recommendation_seed_count)
        .map(|kw| kw.text.clone())
        .collect();
    let request = RecommendationRequest::new(asin, seeds, config.recommendations_cap);

    let body = match api.keyword_recommendations(token, &request).await {
        Ok(body) => body,
        Err(err) => return degrade("recommendations", asin, err),
    };
    match recommendation_candidates(&body) {
        Ok(candidates) => {
            let out = candidates
                .into_iter()
                .take(config.recommendations_cap)
                .collect::<Vec<_>>();
            info!(asin, count = out.len(), "keyword recommendations fetched");
            out
        }
        Err(err) => degrade("recommendations", asin, err),
    }
}
