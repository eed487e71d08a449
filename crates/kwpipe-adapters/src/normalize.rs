//! Shapes the heterogeneous source responses into [`CandidateKeyword`]s.
//!
//! The suggestion and recommendation endpoints name the same concepts differently and omit
//! fields freely. Each "try A, else B, else default" chain lives here, once per concept. A zero
//! or missing number counts as absent everywhere in these chains.

use kwpipe_core::{dollars_to_cents, CandidateKeyword, KeywordSource, MatchType, DEFAULT_BID_CENTS};
use serde_json::Value as JsonValue;

use crate::AdsError;

const SUGGESTED_TEXT_FIELDS: &[&str] = &["keywordText", "keyword"];
const RECOMMENDATION_TEXT_FIELDS: &[&str] = &["keyword", "keywordText"];

fn present_number(value: Option<&JsonValue>) -> Option<f64> {
    value
        .and_then(JsonValue::as_f64)
        .filter(|v| v.is_finite() && *v != 0.0)
}

/// First field holding a string that is non-empty once trimmed.
pub fn keyword_text(item: &JsonValue, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| {
        item.get(*field)
            .and_then(JsonValue::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

pub fn match_type_or_broad(item: &JsonValue) -> MatchType {
    item.get("matchType")
        .and_then(JsonValue::as_str)
        .and_then(MatchType::parse)
        .unwrap_or(MatchType::Broad)
}

/// `suggestedBid.rangeMedian`, then `bid.suggested`, then a flat numeric `suggestedBid`,
/// then the placeholder bid.
pub fn bid_cents(item: &JsonValue) -> i64 {
    present_number(item.pointer("/suggestedBid/rangeMedian"))
        .or_else(|| present_number(item.pointer("/bid/suggested")))
        .or_else(|| present_number(item.get("suggestedBid")))
        .map(dollars_to_cents)
        .unwrap_or(DEFAULT_BID_CENTS)
}

pub fn bid_range_cents(item: &JsonValue) -> (Option<i64>, Option<i64>) {
    (
        present_number(item.pointer("/suggestedBid/rangeStart")).map(dollars_to_cents),
        present_number(item.pointer("/suggestedBid/rangeEnd")).map(dollars_to_cents),
    )
}

fn count(item: &JsonValue, fields: &[&str]) -> u64 {
    fields
        .iter()
        .find_map(|field| present_number(item.get(*field)))
        .filter(|v| *v > 0.0)
        .map(|v| v.round() as u64)
        .unwrap_or(0)
}

fn normalize_item(
    item: &JsonValue,
    text_fields: &[&str],
    source: KeywordSource,
) -> Option<CandidateKeyword> {
    let text = keyword_text(item, text_fields)?;
    let (low, high) = bid_range_cents(item);
    let mut candidate = CandidateKeyword::new(text, match_type_or_broad(item), bid_cents(item), source);
    candidate.bid_range_low_cents = low;
    candidate.bid_range_high_cents = high;
    Some(candidate)
}

pub fn normalize_suggested(item: &JsonValue) -> Option<CandidateKeyword> {
    normalize_item(item, SUGGESTED_TEXT_FIELDS, KeywordSource::Suggested)
}

pub fn normalize_recommendation(item: &JsonValue) -> Option<CandidateKeyword> {
    let mut candidate =
        normalize_item(item, RECOMMENDATION_TEXT_FIELDS, KeywordSource::Recommendations)?;
    candidate.estimated_clicks = count(item, &["clicks", "estimatedClicks"]);
    candidate.estimated_orders = count(item, &["orders", "estimatedOrders"]);
    Some(candidate)
}

/// The suggestion endpoint answers with a bare array; anything else is a shape error.
pub fn suggested_candidates(body: &JsonValue) -> Result<Vec<CandidateKeyword>, AdsError> {
    let items = body.as_array().ok_or_else(|| AdsError::UnexpectedShape {
        endpoint: "suggested_keywords",
        detail: format!("expected array, got {}", json_kind(body)),
    })?;
    Ok(items.iter().filter_map(normalize_suggested).collect())
}

/// Reads `recommendations`; an absent key means no recommendations.
pub fn recommendation_candidates(body: &JsonValue) -> Result<Vec<CandidateKeyword>, AdsError> {
    match body.get("recommendations") {
        None | Some(JsonValue::Null) => Ok(Vec::new()),
        Some(JsonValue::Array(items)) => {
            Ok(items.iter().filter_map(normalize_recommendation).collect())
        }
        Some(other) => Err(AdsError::UnexpectedShape {
            endpoint: "keyword_recommendations",
            detail: format!("expected recommendations array, got {}", json_kind(other)),
        }),
    }
}

/// ASINs of the advertiser's own product ads, in response order.
pub fn owned_asins(body: &JsonValue) -> Vec<String> {
    body.get("productAds")
        .and_then(JsonValue::as_array)
        .map(|ads| {
            ads.iter()
                .filter_map(|ad| ad.get("asin").and_then(JsonValue::as_str))
                .map(str::trim)
                .filter(|asin| !asin.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
