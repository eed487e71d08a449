//! Advertising API contracts, the reqwest-backed client, and response normalizers.

use std::fmt;

use async_trait::async_trait;
use kwpipe_core::MatchType;
use kwpipe_storage::FetchError;
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

pub mod bids;
pub mod client;
pub mod normalize;

pub use bids::{parse_bid_recommendations, BidObservation};
pub use client::AdsClient;

pub const CRATE_NAME: &str = "kwpipe-adapters";

pub const DEFAULT_API_BASE_URL: &str = "https://advertising-api.amazon.com";
pub const DEFAULT_TOKEN_URL: &str = "https://api.amazon.com/auth/o2/token";

#[derive(Debug, Error)]
pub enum AdsError {
    #[error("token exchange rejected with status {status}: {body}")]
    Auth { status: u16, body: String },
    #[error("advertising credentials not configured: missing {0}")]
    MissingCredentials(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("decoding response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("unexpected response shape from {endpoint}: {detail}")]
    UnexpectedShape {
        endpoint: &'static str,
        detail: String,
    },
}

/// Short-lived bearer token, shared read-only for the rest of a run.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessToken(<{} chars>)", self.0.len())
    }
}

#[derive(Clone)]
pub struct AdsApiConfig {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub profile_id: String,
    pub api_base_url: String,
    pub token_url: String,
    pub user_agent: String,
    pub http_timeout_secs: u64,
}

impl fmt::Debug for AdsApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdsApiConfig")
            .field("client_id", &self.client_id)
            .field("profile_id", &self.profile_id)
            .field("api_base_url", &self.api_base_url)
            .field("token_url", &self.token_url)
            .field("user_agent", &self.user_agent)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .finish_non_exhaustive()
    }
}

impl AdsApiConfig {
    pub fn from_env() -> Result<Self, AdsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup; blank values count as missing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AdsError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let missing = ["ADS_API_CLIENT_ID", "ADS_API_CLIENT_SECRET", "ADS_API_REFRESH_TOKEN"]
            .into_iter()
            .filter(|key| get(*key).is_none())
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(AdsError::MissingCredentials(missing.join(", ")));
        }

        Ok(Self {
            client_id: get("ADS_API_CLIENT_ID").unwrap_or_default(),
            client_secret: get("ADS_API_CLIENT_SECRET").unwrap_or_default(),
            refresh_token: get("ADS_API_REFRESH_TOKEN").unwrap_or_default(),
            profile_id: get("ADS_API_PROFILE_ID").unwrap_or_default(),
            api_base_url: get("ADS_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            token_url: get("ADS_API_TOKEN_URL").unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
            user_agent: get("KWPIPE_USER_AGENT").unwrap_or_else(|| "kwpipe/0.1".to_string()),
            http_timeout_secs: get("KWPIPE_HTTP_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        })
    }
}

/// Body of the keyword-recommendations request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationRequest {
    pub asins: Vec<String>,
    pub target_keywords: Vec<String>,
    pub max_recommendations: usize,
    pub strategy: &'static str,
    pub locale: &'static str,
    pub sort_dimension: &'static str,
    pub bidding_strategy: &'static str,
    pub match_types: Vec<MatchType>,
}

impl RecommendationRequest {
    pub fn new(asin: &str, target_keywords: Vec<String>, max_recommendations: usize) -> Self {
        Self {
            asins: vec![asin.to_string()],
            target_keywords,
            max_recommendations,
            strategy: "MULTI_STRATEGY",
            locale: "en_US",
            sort_dimension: "CONVERSIONS",
            bidding_strategy: "AUTO_FOR_SALES",
            match_types: MatchType::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetingExpression {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub value: String,
}

impl TargetingExpression {
    pub fn keyword(match_type: MatchType, value: &str) -> Self {
        Self {
            kind: match_type.targeting_expression_type(),
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bidding {
    pub strategy: &'static str,
    pub adjustments: Option<JsonValue>,
}

/// Body of the bid-recommendation request for one keyword batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BidRecommendationRequest {
    pub recommendation_type: &'static str,
    pub asins: Vec<String>,
    pub targeting_expressions: Vec<TargetingExpression>,
    pub bidding: Bidding,
}

impl BidRecommendationRequest {
    /// One EXACT, PHRASE, and BROAD expression per keyword, in that order.
    pub fn for_keywords(owned_asin: &str, keywords: &[String]) -> Self {
        let targeting_expressions = keywords
            .iter()
            .flat_map(|kw| {
                MatchType::ALL
                    .into_iter()
                    .map(move |m| TargetingExpression::keyword(m, kw))
            })
            .collect();
        Self {
            recommendation_type: "BIDS_FOR_NEW_AD_GROUP",
            asins: vec![owned_asin.to_string()],
            targeting_expressions,
            bidding: Bidding {
                strategy: "AUTO_FOR_SALES",
                adjustments: None,
            },
        }
    }
}

/// The advertising API calls the pipeline depends on.
///
/// Every method except [`AdsApi::access_token`] returns the raw JSON body; shaping it into
/// keyword records is the job of [`normalize`] and [`bids`], so alternative transports only
/// have to speak the wire format.
#[async_trait]
pub trait AdsApi: Send + Sync {
    async fn access_token(&self) -> Result<AccessToken, AdsError>;

    async fn suggested_keywords(
        &self,
        token: &AccessToken,
        asin: &str,
        max_suggestions: usize,
    ) -> Result<JsonValue, AdsError>;

    async fn keyword_recommendations(
        &self,
        token: &AccessToken,
        request: &RecommendationRequest,
    ) -> Result<JsonValue, AdsError>;

    async fn product_ads(&self, token: &AccessToken) -> Result<JsonValue, AdsError>;

    async fn bid_recommendations(
        &self,
        token: &AccessToken,
        request: &BidRecommendationRequest,
    ) -> Result<JsonValue, AdsError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn config_reports_every_missing_credential() {
        let env: HashMap<&str, &str> = HashMap::from([("ADS_API_CLIENT_ID", "amzn1.client")]);
        let err = AdsApiConfig::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("ADS_API_CLIENT_SECRET"));
        assert!(message.contains("ADS_API_REFRESH_TOKEN"));
        assert!(!message.contains("ADS_API_CLIENT_ID"));
    }

    #[test]
    fn config_defaults_endpoints_and_hides_secrets() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("ADS_API_CLIENT_ID", "amzn1.client"),
            ("ADS_API_CLIENT_SECRET", "s3cret"),
            ("ADS_API_REFRESH_TOKEN", "Atzr|refresh"),
            ("ADS_API_PROFILE_ID", "1234567890"),
        ]);
        let config = AdsApiConfig::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.token_url, DEFAULT_TOKEN_URL);
        let debug = format!("{config:?}");
        assert!(!debug.contains("s3cret"));
        assert!(!debug.contains("Atzr|refresh"));
        assert!(!format!("{:?}", AccessToken::new("Atza|bearer")).contains("bearer"));
    }

    #[test]
    fn bid_request_carries_three_expressions_per_keyword() {
        let request = BidRecommendationRequest::for_keywords(
            "B0OWNED001",
            &["sleep mask".to_string(), "eye cover".to_string()],
        );
        assert_eq!(request.targeting_expressions.len(), 6);
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["recommendationType"], "BIDS_FOR_NEW_AD_GROUP");
        assert_eq!(body["asins"][0], "B0OWNED001");
        assert_eq!(body["targetingExpressions"][0]["type"], "KEYWORD_EXACT_MATCH");
        assert_eq!(body["targetingExpressions"][1]["type"], "KEYWORD_PHRASE_MATCH");
        assert_eq!(body["targetingExpressions"][2]["type"], "KEYWORD_BROAD_MATCH");
        assert_eq!(body["targetingExpressions"][3]["value"], "eye cover");
        assert!(body["bidding"]["adjustments"].is_null());
    }

    #[test]
    fn recommendation_request_uses_fixed_strategy() {
        let request = RecommendationRequest::new("B000TEST01", vec!["sleep mask".into()], 2000);
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["maxRecommendations"], 2000);
        assert_eq!(body["strategy"], "MULTI_STRATEGY");
        assert_eq!(body["sortDimension"], "CONVERSIONS");
        assert_eq!(body["matchTypes"], serde_json::json!(["EXACT", "PHRASE", "BROAD"]));
        assert_eq!(body["targetKeywords"][0], "sleep mask");
    }
}
