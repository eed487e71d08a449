//! Canned advertising API used by the pipeline tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use kwpipe_adapters::{
    AccessToken, AdsApi, AdsError, BidRecommendationRequest, RecommendationRequest,
};
use kwpipe_storage::FetchError;
use serde_json::{json, Value as JsonValue};

/// `Err(status)` entries answer with that HTTP status.
type Canned = Result<JsonValue, u16>;

fn http_error(endpoint: &str, status: u16) -> AdsError {
    AdsError::Fetch(FetchError::HttpStatus {
        status,
        url: format!("https://ads.test{endpoint}"),
        body: "{\"code\":\"SERVER_ERROR\"}".to_string(),
    })
}

fn answer(endpoint: &str, canned: &Canned) -> Result<JsonValue, AdsError> {
    canned.clone().map_err(|status| http_error(endpoint, status))
}

pub const DEFAULT_BID_VALUES: [f64; 3] = [0.5, 1.0, 1.5];

/// Every targeting expression gets `bids` and tiers of 1/5/10 clicks, 0/1/2 orders.
pub fn bid_response(request: &BidRecommendationRequest, bids: [f64; 3]) -> JsonValue {
    let expressions = request
        .targeting_expressions
        .iter()
        .map(|expr| {
            json!({
                "targetingExpression": {"type": expr.kind, "value": expr.value},
                "bidValues": bids.map(|bid| json!({"suggestedBid": bid}))
            })
        })
        .collect::<Vec<_>>();
    json!({"bidRecommendations": [{
        "theme": "CONVERSION_OPPORTUNITIES",
        "impactMetrics": {
            "clicks": {"values": [{"lower": 0, "upper": 1}, {"lower": 2, "upper": 5}, {"lower": 6, "upper": 10}]},
            "orders": {"values": [{"lower": 0, "upper": 0}, {"lower": 0, "upper": 1}, {"lower": 1, "upper": 2}]}
        },
        "bidRecommendationsForTargetingExpressions": expressions
    }]})
}

pub struct MockAdsApi {
    token: Result<String, u16>,
    suggested: Canned,
    recommendations: Canned,
    product_ads: Canned,
    failing_bid_batches: HashSet<usize>,
    bid_values: [f64; 3],
    bid_requests: Mutex<Vec<BidRecommendationRequest>>,
    recommendation_requests: Mutex<Vec<RecommendationRequest>>,
    product_ads_calls: AtomicUsize,
}

impl Default for MockAdsApi {
    fn default() -> Self {
        Self {
            token: Ok("Atza|test-token".to_string()),
            suggested: Ok(json!([])),
            recommendations: Ok(json!({"recommendations": []})),
            product_ads: Ok(json!({"productAds": []})),
            failing_bid_batches: HashSet::new(),
            bid_values: DEFAULT_BID_VALUES,
            bid_requests: Mutex::new(Vec::new()),
            recommendation_requests: Mutex::new(Vec::new()),
            product_ads_calls: AtomicUsize::new(0),
        }
    }
}

impl MockAdsApi {
    pub fn with_token_status(mut self, status: u16) -> Self {
        self.token = Err(status);
        self
    }

    pub fn with_suggested(mut self, canned: Canned) -> Self {
        self.suggested = canned;
        self
    }

    pub fn with_recommendations(mut self, canned: Canned) -> Self {
        self.recommendations = canned;
        self
    }

    pub fn with_product_ads(mut self, canned: Canned) -> Self {
        self.product_ads = canned;
        self
    }

    /// Zero-based bid batch indices, counted across the mock's lifetime, that answer 500.
    pub fn failing_bid_batches(mut self, batches: impl IntoIterator<Item = usize>) -> Self {
        self.failing_bid_batches = batches.into_iter().collect();
        self
    }

    /// Low, median and high suggested bid, in dollars, for every expression.
    pub fn with_bid_values(mut self, bids: [f64; 3]) -> Self {
        self.bid_values = bids;
        self
    }

    /// Lowercased keyword values sent to the bid endpoint, first-seen order.
    pub fn bid_texts(&self) -> Vec<String> {
        let mut texts: Vec<String> = Vec::new();
        for request in self.bid_requests() {
            for expr in request.targeting_expressions {
                let value = expr.value.to_lowercase();
                if !texts.contains(&value) {
                    texts.push(value);
                }
            }
        }
        texts
    }

    pub fn bid_requests(&self) -> Vec<BidRecommendationRequest> {
        self.bid_requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn recommendation_requests(&self) -> Vec<RecommendationRequest> {
        self.recommendation_requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn product_ads_calls(&self) -> usize {
        self.product_ads_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AdsApi for MockAdsApi {
    async fn access_token(&self) -> Result<AccessToken, AdsError> {
        match &self.token {
            Ok(token) => Ok(AccessToken::new(token.clone())),
            Err(status) => Err(AdsError::Auth {
                status: *status,
                body: "{\"error\":\"invalid_grant\"}".to_string(),
            }),
        }
    }

    async fn suggested_keywords(
        &self,
        _token: &AccessToken,
        _asin: &str,
        _max_suggestions: usize,
    ) -> Result<JsonValue, AdsError> {
        answer("/v2/asins/suggested/keywords", &self.suggested)
    }

    async fn keyword_recommendations(
        &self,
        _token: &AccessToken,
        request: &RecommendationRequest,
    ) -> Result<JsonValue, AdsError> {
        if let Ok(mut seen) = self.recommendation_requests.lock() {
            seen.push(request.clone());
        }
        answer("/v2/sp/keywords/recommendations", &self.recommendations)
    }

    async fn product_ads(&self, _token: &AccessToken) -> Result<JsonValue, AdsError> {
        self.product_ads_calls.fetch_add(1, Ordering::SeqCst);
        answer("/sp/productAds/list", &self.product_ads)
    }

    async fn bid_recommendations(
        &self,
        _token: &AccessToken,
        request: &BidRecommendationRequest,
    ) -> Result<JsonValue, AdsError> {
        let index = {
            let mut seen = self
                .bid_requests
                .lock()
                .map_err(|_| http_error("/sp/targets/bid/recommendations", 500))?;
            seen.push(request.clone());
            seen.len() - 1
        };
        if self.failing_bid_batches.contains(&index) {
            return Err(http_error("/sp/targets/bid/recommendations", 500));
        }
        Ok(bid_response(request, self.bid_values))
    }
}
