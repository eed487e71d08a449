use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use kwpipe_storage::{BackoffPolicy, FetchError, HttpClientConfig, HttpFetcher};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use crate::{
    AccessToken, AdsApi, AdsApiConfig, AdsError, BidRecommendationRequest, RecommendationRequest,
};

const PRODUCT_ADS_MEDIA_TYPE: &str = "application/vnd.spproductAd.v3+json";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// reqwest-backed advertising API client.
#[derive(Debug)]
pub struct AdsClient {
    config: AdsApiConfig,
    http: HttpFetcher,
}

impl AdsClient {
    pub fn new(config: AdsApiConfig) -> anyhow::Result<Self> {
        Self::with_backoff(config, BackoffPolicy::default())
    }

    pub fn with_backoff(config: AdsApiConfig, backoff: BackoffPolicy) -> anyhow::Result<Self> {
        let http = HttpFetcher::new(HttpClientConfig {
            timeout: Duration::from_secs(config.http_timeout_secs),
            user_agent: Some(config.user_agent.clone()),
            backoff,
            ..Default::default()
        })
        .context("building advertising API http client")?;
        Ok(Self { config, http })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url.trim_end_matches('/'), path)
    }

    fn authorized(
        &self,
        builder: reqwest::RequestBuilder,
        token: &AccessToken,
    ) -> reqwest::RequestBuilder {
        builder
            .bearer_auth(token.secret())
            .header("Amazon-Advertising-API-ClientId", &self.config.client_id)
            .header("Amazon-Advertising-API-Scope", &self.config.profile_id)
    }

    async fn post_json(
        &self,
        endpoint: &'static str,
        path: &str,
        token: &AccessToken,
        body: &JsonValue,
    ) -> Result<JsonValue, AdsError> {
        let url = self.url(path);
        let response = self
            .http
            .send(endpoint, |client| {
                self.authorized(client.post(&url), token)
                    .header(ACCEPT, "application/json")
                    .json(body)
            })
            .await?;
        debug!(endpoint, bytes = response.body.len(), "advertising API response");
        Ok(response.json()?)
    }
}

#[async_trait]
impl AdsApi for AdsClient {
    async fn access_token(&self) -> Result<AccessToken, AdsError> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", self.config.refresh_token.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];
        let response = self
            .http
            .send("token", |client| client.post(&self.config.token_url).form(&form))
            .await
            .map_err(|err| match err {
                FetchError::HttpStatus { status, body, .. } => AdsError::Auth { status, body },
                other => AdsError::Fetch(other),
            })?;

        let token: TokenResponse = response.json()?;
        token
            .access_token
            .filter(|t| !t.is_empty())
            .map(AccessToken::new)
            .ok_or(AdsError::UnexpectedShape {
                endpoint: "token",
                detail: "no access_token in response".into(),
            })
    }

    async fn suggested_keywords(
        &self,
        token: &AccessToken,
        asin: &str,
        max_suggestions: usize,
    ) -> Result<JsonValue, AdsError> {
        let body = json!({ "asins": [asin], "maxNumSuggestions": max_suggestions });
        self.post_json("suggested_keywords", "/v2/asins/suggested/keywords", token, &body)
            .await
    }

    async fn keyword_recommendations(
        &self,
        token: &AccessToken,
        request: &RecommendationRequest,
    ) -> Result<JsonValue, AdsError> {
        let body = serde_json::to_value(request)?;
        self.post_json(
            "keyword_recommendations",
            "/v2/sp/keywords/recommendations",
            token,
            &body,
        )
        .await
    }

    async fn product_ads(&self, token: &AccessToken) -> Result<JsonValue, AdsError> {
        let url = self.url("/sp/productAds/list");
        let body = json!({
            "maxResults": 50,
            "stateFilter": { "include": ["ENABLED", "PAUSED"] },
        });
        let response = self
            .http
            .send("product_ads", |client| {
                self.authorized(client.post(&url), token)
                    .header(CONTENT_TYPE, PRODUCT_ADS_MEDIA_TYPE)
                    .header(ACCEPT, PRODUCT_ADS_MEDIA_TYPE)
                    .body(body.to_string())
            })
            .await?;
        Ok(response.json()?)
    }

    async fn bid_recommendations(
        &self,
        token: &AccessToken,
        request: &BidRecommendationRequest,
    ) -> Result<JsonValue, AdsError> {
        let body = serde_json::to_value(request)?;
        self.post_json(
            "bid_recommendations",
            "/sp/targets/bid/recommendations",
            token,
            &body,
        )
        .await
    }
}
