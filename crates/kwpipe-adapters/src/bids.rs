//! Parsing of bid-recommendation responses into per-(keyword, match type) observations.

use kwpipe_core::{BidImpact, MatchType};
use serde_json::Value as JsonValue;
use tracing::warn;

/// The endpoint reports impact metrics and bid values as low/medium/high tiers.
pub const TIER_COUNT: usize = 3;
const HIGH_TIER: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct BidObservation {
    /// Lowercased keyword text.
    pub keyword: String,
    pub match_type: MatchType,
    pub impact: BidImpact,
}

fn present_number(value: Option<&JsonValue>) -> Option<f64> {
    value
        .and_then(JsonValue::as_f64)
        .filter(|v| v.is_finite() && *v != 0.0)
}

/// Upper bound of the high tier, or 0 when the tier list is absent or not three tiers long.
fn high_tier_upper(values: Option<&JsonValue>, metric: &'static str) -> u64 {
    let Some(tiers) = values.and_then(JsonValue::as_array) else {
        return 0;
    };
    if tiers.is_empty() {
        return 0;
    }
    if tiers.len() != TIER_COUNT {
        warn!(metric, tiers = tiers.len(), "impact metric tier count mismatch; ignoring estimate");
        return 0;
    }
    present_number(tiers[HIGH_TIER].get("upper"))
        .filter(|v| *v > 0.0)
        .map(|v| v.round() as u64)
        .unwrap_or(0)
}

fn bid_range(bid_values: &[JsonValue]) -> (Option<f64>, Option<f64>, Option<f64>) {
    let tier = |i: usize| present_number(bid_values[i].get("suggestedBid"));
    (tier(0), tier(1), tier(2))
}

/// Flattens `bidRecommendations[].bidRecommendationsForTargetingExpressions[]`.
///
/// Expressions with an unknown targeting type, no keyword value, or a bid list that is not
/// exactly three tiers are skipped.
pub fn parse_bid_recommendations(body: &JsonValue) -> Vec<BidObservation> {
    let Some(recommendations) = body.get("bidRecommendations").and_then(JsonValue::as_array)
    else {
        return Vec::new();
    };

    let mut observations = Vec::new();
    for rec in recommendations {
        let Some(expressions) = rec
            .get("bidRecommendationsForTargetingExpressions")
            .and_then(JsonValue::as_array)
        else {
            continue;
        };

        let clicks = high_tier_upper(rec.pointer("/impactMetrics/clicks/values"), "clicks");
        let orders = high_tier_upper(rec.pointer("/impactMetrics/orders/values"), "orders");

        for expr in expressions {
            let Some(match_type) = expr
                .pointer("/targetingExpression/type")
                .and_then(JsonValue::as_str)
                .and_then(MatchType::from_targeting_expression_type)
            else {
                continue;
            };
            let Some(keyword) = expr
                .pointer("/targetingExpression/value")
                .and_then(JsonValue::as_str)
                .map(|v| v.trim().to_lowercase())
                .filter(|v| !v.is_empty())
            else {
                continue;
            };
            let bid_values = expr
                .get("bidValues")
                .and_then(JsonValue::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            if bid_values.len() != TIER_COUNT {
                warn!(
                    keyword = %keyword,
                    match_type = %match_type,
                    tiers = bid_values.len(),
                    "bid value tier count mismatch; skipping expression"
                );
                continue;
            }

            let (range_low, range_median, range_high) = bid_range(bid_values);
            observations.push(BidObservation {
                keyword,
                match_type,
                impact: BidImpact {
                    range_low,
                    range_median,
                    range_high,
                    estimated_high_clicks: clicks,
                    estimated_high_orders: orders,
                },
            });
        }
    }
    observations
}
