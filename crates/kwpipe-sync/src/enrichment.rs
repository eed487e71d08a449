//! Bid enrichment: batch bid-recommendation requests folded into an [`EnrichmentMap`], then
//! applied to candidates in EXACT > BROAD > PHRASE order.

use std::collections::HashSet;

use kwpipe_adapters::normalize::owned_asins;
use kwpipe_adapters::{parse_bid_recommendations, AccessToken, AdsApi, BidRecommendationRequest};
use kwpipe_core::{dollars_to_cents, CandidateKeyword, EnrichmentMap};
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::PipelineError;

/// Lowercased keyword texts in first-seen order.
pub fn unique_texts(candidates: &[CandidateKeyword]) -> Vec<String> {
    let mut seen = HashSet::new();
    candidates
        .iter()
        .map(|kw| kw.text.to_lowercase())
        .filter(|text| seen.insert(text.clone()))
        .collect()
}

/// First ASIN of the advertiser's product ads, or `asin` itself.
pub async fn resolve_owned_asin(api: &dyn AdsApi, token: &AccessToken, asin: &str) -> String {
    match api.product_ads(token).await {
        Ok(body) => match owned_asins(&body).into_iter().next() {
            Some(owned) => {
                debug!(asin, owned = %owned, "using owned ASIN for bid context");
                owned
            }
            None => asin.to_string(),
        },
        Err(error) => {
            let err = PipelineError::OwnedAsinResolution {
                fallback_asin: asin.to_string(),
                error,
            };
            warn!(asin, error = %err, "owned ASIN lookup failed");
            asin.to_string()
        }
    }
}

/// Requests bids for `texts` in batches and folds every observation into one map.
///
/// A failed batch is logged and contributes nothing. Batches run one after another with
/// `bid_batch_pause` between them.
pub async fn collect_bid_data(
    api: &dyn AdsApi,
    token: &AccessToken,
    asin: &str,
    owned_asin: &str,
    texts: &[String],
    config: &PipelineConfig,
) -> EnrichmentMap {
    let mut map = EnrichmentMap::new();

    for (index, batch) in texts.chunks(config.bid_batch_size.max(1)).enumerate() {
        if index > 0 && !config.bid_batch_pause.is_zero() {
            tokio::time::sleep(config.bid_batch_pause).await;
        }
        let request = BidRecommendationRequest::for_keywords(owned_asin, batch);
        map = match api.bid_recommendations(token, &request).await {
            Ok(body) => parse_bid_recommendations(&body)
                .into_iter()
                .fold(map, |acc, obs| {
                    acc.with_observation(&obs.keyword, obs.match_type, obs.impact)
                }),
            Err(error) => {
                let err = PipelineError::BidBatch {
                    asin: asin.to_string(),
                    batch: index,
                    error,
                };
                warn!(asin, batch = index, keywords = batch.len(), error = %err, "bid batch skipped");
                map
            }
        };
    }
    map
}

/// Overwrites bid data on every candidate the map covers; returns how many were enriched.
pub fn apply_enrichment(candidates: &mut [CandidateKeyword], map: &EnrichmentMap) -> usize {
    let mut enriched = 0;
    for kw in candidates.iter_mut() {
        let Some((match_type, impact)) = map.get(&kw.text).and_then(|r| r.preferred()) else {
            continue;
        };
        if let Some(median) = impact.range_median {
            kw.suggested_bid_cents = dollars_to_cents(median);
        }
        kw.bid_range_low_cents = impact.range_low.map(dollars_to_cents);
        kw.bid_range_high_cents = impact.range_high.map(dollars_to_cents);
        kw.estimated_clicks = impact.estimated_high_clicks;
        kw.estimated_orders = impact.estimated_high_orders;
        kw.enrichment_source = Some(match_type);
        enriched += 1;
    }
    enriched
}

/// Full enrichment stage for one product. A candidate set with no texts is left untouched
/// without any API call.
pub async fn enrich_keywords(
    api: &dyn AdsApi,
    token: &AccessToken,
    asin: &str,
    candidates: &mut [CandidateKeyword],
    config: &PipelineConfig,
) -> usize {
    let texts = unique_texts(candidates);
    if texts.is_empty() {
        return 0;
    }
    let owned_asin = resolve_owned_asin(api, token, asin).await;
    let map = collect_bid_data(api, token, asin, &owned_asin, &texts, config).await;
    let enriched = apply_enrichment(candidates, &map);
    info!(
        asin,
        unique_texts = texts.len(),
        records = map.len(),
        enriched,
        "bid enrichment finished"
    );
    enriched
}
