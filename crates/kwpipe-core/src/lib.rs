//! Core keyword model shared by the collection pipeline, its adapters, and storage.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "kwpipe-core";

/// Placeholder bid assigned before any real bid data is known.
pub const DEFAULT_BID_CENTS: i64 = 100;

/// Advertising keyword-matching mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchType {
    Exact,
    Phrase,
    Broad,
}

impl MatchType {
    pub const ALL: [MatchType; 3] = [MatchType::Exact, MatchType::Phrase, MatchType::Broad];

    /// Priority used when choosing which match type's bid data fills a keyword.
    pub const ENRICHMENT_PRIORITY: [MatchType; 3] =
        [MatchType::Exact, MatchType::Broad, MatchType::Phrase];

    pub fn as_str(self) -> &'static str {
        match self {
            MatchType::Exact => "EXACT",
            MatchType::Phrase => "PHRASE",
            MatchType::Broad => "BROAD",
        }
    }

    /// Case-insensitive parse of the wire name (`EXACT`, `phrase`, ...).
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        MatchType::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(value))
    }

    /// Targeting expression type used by the bid-recommendation endpoint.
    pub fn targeting_expression_type(self) -> &'static str {
        match self {
            MatchType::Exact => "KEYWORD_EXACT_MATCH",
            MatchType::Phrase => "KEYWORD_PHRASE_MATCH",
            MatchType::Broad => "KEYWORD_BROAD_MATCH",
        }
    }

    pub fn from_targeting_expression_type(value: &str) -> Option<Self> {
        MatchType::ALL
            .into_iter()
            .find(|m| m.targeting_expression_type() == value)
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a candidate keyword came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordSource {
    Suggested,
    Recommendations,
    MatchTypeExpansion,
    ProductIntent,
    ProductPhrase,
    FallbackBrand,
    FallbackCategory,
    FallbackTitle,
    FallbackPhrase,
    FallbackBrandCategory,
}

impl KeywordSource {
    pub fn as_str(self) -> &'static str {
        match self {
            KeywordSource::Suggested => "suggested",
            KeywordSource::Recommendations => "recommendations",
            KeywordSource::MatchTypeExpansion => "match_type_expansion",
            KeywordSource::ProductIntent => "product_intent",
            KeywordSource::ProductPhrase => "product_phrase",
            KeywordSource::FallbackBrand => "fallback_brand",
            KeywordSource::FallbackCategory => "fallback_category",
            KeywordSource::FallbackTitle => "fallback_title",
            KeywordSource::FallbackPhrase => "fallback_phrase",
            KeywordSource::FallbackBrandCategory => "fallback_brand_category",
        }
    }

    pub fn is_fallback(self) -> bool {
        matches!(
            self,
            KeywordSource::FallbackBrand
                | KeywordSource::FallbackCategory
                | KeywordSource::FallbackTitle
                | KeywordSource::FallbackPhrase
                | KeywordSource::FallbackBrandCategory
        )
    }
}

impl fmt::Display for KeywordSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A keyword plus its provenance, produced by any stage before persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateKeyword {
    pub text: String,
    pub match_type: MatchType,
    pub suggested_bid_cents: i64,
    pub bid_range_low_cents: Option<i64>,
    pub bid_range_high_cents: Option<i64>,
    pub estimated_clicks: u64,
    pub estimated_orders: u64,
    pub source: KeywordSource,
    pub is_primary: bool,
    pub enrichment_source: Option<MatchType>,
}

impl CandidateKeyword {
    pub fn new(
        text: impl Into<String>,
        match_type: MatchType,
        suggested_bid_cents: i64,
        source: KeywordSource,
    ) -> Self {
        Self {
            text: text.into(),
            match_type,
            suggested_bid_cents,
            bid_range_low_cents: None,
            bid_range_high_cents: None,
            estimated_clicks: 0,
            estimated_orders: 0,
            source,
            is_primary: false,
            enrichment_source: None,
        }
    }

    pub fn primary(mut self, is_primary: bool) -> Self {
        self.is_primary = is_primary;
        self
    }

    /// Case-insensitive identity used by every dedup pass.
    pub fn dedup_key(&self) -> (String, MatchType) {
        (self.text.to_lowercase(), self.match_type)
    }

    /// Source tag as written to the keyword store.
    pub fn storage_source(&self) -> String {
        match self.enrichment_source {
            Some(m) => format!(
                "{}_enriched_{}",
                self.source.as_str(),
                m.as_str().to_ascii_lowercase()
            ),
            None => self.source.as_str().to_string(),
        }
    }
}

/// Bid and impact estimates for one (keyword, match type) pair, amounts in dollars.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidImpact {
    pub range_low: Option<f64>,
    pub range_median: Option<f64>,
    pub range_high: Option<f64>,
    pub estimated_high_clicks: u64,
    pub estimated_high_orders: u64,
}

/// Per-keyword bid data keyed by match type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EnrichmentRecord {
    #[serde(rename = "EXACT")]
    pub exact: Option<BidImpact>,
    #[serde(rename = "BROAD")]
    pub broad: Option<BidImpact>,
    #[serde(rename = "PHRASE")]
    pub phrase: Option<BidImpact>,
}

impl EnrichmentRecord {
    pub fn get(&self, match_type: MatchType) -> Option<&BidImpact> {
        match match_type {
            MatchType::Exact => self.exact.as_ref(),
            MatchType::Broad => self.broad.as_ref(),
            MatchType::Phrase => self.phrase.as_ref(),
        }
    }

    pub fn set(&mut self, match_type: MatchType, impact: BidImpact) {
        let slot = match match_type {
            MatchType::Exact => &mut self.exact,
            MatchType::Broad => &mut self.broad,
            MatchType::Phrase => &mut self.phrase,
        };
        *slot = Some(impact);
    }

    /// First available entry in EXACT > BROAD > PHRASE order.
    pub fn preferred(&self) -> Option<(MatchType, &BidImpact)> {
        MatchType::ENRICHMENT_PRIORITY
            .into_iter()
            .find_map(|m| self.get(m).map(|impact| (m, impact)))
    }
}

/// Bid data for one product run, keyed by lowercased keyword text.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnrichmentMap {
    records: HashMap<String, EnrichmentRecord>,
}

impl EnrichmentMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one observation into the map and hands the map back.
    pub fn with_observation(
        mut self,
        keyword: &str,
        match_type: MatchType,
        impact: BidImpact,
    ) -> Self {
        self.records
            .entry(keyword.to_lowercase())
            .or_default()
            .set(match_type, impact);
        self
    }

    pub fn get(&self, keyword: &str) -> Option<&EnrichmentRecord> {
        self.records.get(&keyword.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Storage representation of one keyword for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedKeywordRow {
    pub product_id: String,
    pub keyword: String,
    pub match_type: MatchType,
    pub suggested_bid: i64,
    pub bid_range_start: Option<i64>,
    pub bid_range_end: Option<i64>,
    pub estimated_clicks: u64,
    pub estimated_orders: u64,
    pub source: String,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}

impl PersistedKeywordRow {
    pub fn from_candidate(
        product_id: &str,
        candidate: &CandidateKeyword,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            product_id: product_id.to_string(),
            keyword: candidate.text.clone(),
            match_type: candidate.match_type,
            suggested_bid: candidate.suggested_bid_cents,
            bid_range_start: candidate.bid_range_low_cents,
            bid_range_end: candidate.bid_range_high_cents,
            estimated_clicks: candidate.estimated_clicks,
            estimated_orders: candidate.estimated_orders,
            source: candidate.storage_source(),
            is_primary: candidate.is_primary,
            created_at,
        }
    }

    /// Uniqueness key enforced by the keyword store.
    pub fn unique_key(&self) -> (String, String, MatchType) {
        (self.product_id.clone(), self.keyword.clone(), self.match_type)
    }
}

/// Product attributes known to the local catalog.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogProduct {
    pub asin: String,
    pub title: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub bullet_points: Vec<String>,
}

/// Dollar amount to whole cents, rounding half away from zero.
pub fn dollars_to_cents(dollars: f64) -> i64 {
    (dollars * 100.0).round() as i64
}

/// Scales a bid by a fractional factor, rounded to whole cents.
pub fn scale_bid(bid_cents: i64, factor: f64) -> i64 {
    (bid_cents as f64 * factor).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn impact(median: f64) -> BidImpact {
        BidImpact {
            range_median: Some(median),
            ..Default::default()
        }
    }

    #[test]
    fn match_type_parses_wire_and_targeting_names() {
        assert_eq!(MatchType::parse("exact"), Some(MatchType::Exact));
        assert_eq!(MatchType::parse(" BROAD "), Some(MatchType::Broad));
        assert_eq!(MatchType::parse("negative"), None);
        assert_eq!(
            MatchType::from_targeting_expression_type("KEYWORD_PHRASE_MATCH"),
            Some(MatchType::Phrase)
        );
        assert_eq!(MatchType::from_targeting_expression_type("ASIN_SAME_AS"), None);
    }

    #[test]
    fn preferred_entry_follows_exact_broad_phrase() {
        let record = EnrichmentRecord {
            exact: None,
            broad: Some(impact(1.1)),
            phrase: Some(impact(0.8)),
        };
        assert_eq!(record.preferred().map(|(m, _)| m), Some(MatchType::Broad));

        let record = EnrichmentRecord {
            exact: Some(impact(1.5)),
            broad: Some(impact(1.1)),
            phrase: None,
        };
        assert_eq!(record.preferred().map(|(m, _)| m), Some(MatchType::Exact));
        assert_eq!(EnrichmentRecord::default().preferred(), None);
    }

    #[test]
    fn enrichment_map_keys_are_case_insensitive() {
        let map = EnrichmentMap::new()
            .with_observation("Sleep Mask", MatchType::Exact, impact(1.5))
            .with_observation("sleep mask", MatchType::Phrase, impact(0.8));
        assert_eq!(map.len(), 1);
        let record = map.get("SLEEP MASK").expect("record");
        assert!(record.exact.is_some());
        assert!(record.phrase.is_some());
        assert!(record.broad.is_none());
    }

    #[test]
    fn storage_source_marks_enriched_rows() {
        let mut kw = CandidateKeyword::new("sleep mask", MatchType::Broad, 100, KeywordSource::Suggested);
        assert_eq!(kw.storage_source(), "suggested");
        kw.enrichment_source = Some(MatchType::Exact);
        assert_eq!(kw.storage_source(), "suggested_enriched_exact");
    }

    #[test]
    fn candidate_serializes_with_wire_names() {
        let kw = CandidateKeyword::new("sleep mask", MatchType::Phrase, 90, KeywordSource::MatchTypeExpansion);
        let value = serde_json::to_value(&kw).expect("json");
        assert_eq!(value["matchType"], "PHRASE");
        assert_eq!(value["source"], "match_type_expansion");
        assert_eq!(value["suggestedBidCents"], 90);
        assert!(value["enrichmentSource"].is_null());
    }

    #[test]
    fn cents_helpers_round_to_whole_cents() {
        assert_eq!(dollars_to_cents(1.5), 150);
        assert_eq!(dollars_to_cents(0.37), 37);
        assert_eq!(scale_bid(100, 0.9), 90);
        assert_eq!(scale_bid(120, 0.7), 84);
    }
}
