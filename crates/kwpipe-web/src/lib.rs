//! Axum handler exposing the keyword collection pipeline.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use kwpipe_sync::{pipeline_from_env, CollectionReport, KeywordPipeline, PipelineError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub const CRATE_NAME: &str = "kwpipe-web";

#[derive(Clone)]
pub struct AppState {
    /// `Err` holds the reason the pipeline could not be configured.
    pipeline: Result<Arc<KeywordPipeline>, String>,
}

impl AppState {
    pub fn new(pipeline: Arc<KeywordPipeline>) -> Self {
        Self {
            pipeline: Ok(pipeline),
        }
    }

    pub fn without_credentials(reason: impl Into<String>) -> Self {
        Self {
            pipeline: Err(reason.into()),
        }
    }

    /// Missing credentials still start the server; collection requests then report them.
    pub async fn from_env() -> anyhow::Result<Self> {
        match pipeline_from_env(false).await {
            Ok(pipeline) => Ok(Self::new(Arc::new(pipeline))),
            Err(err @ PipelineError::Config(_)) => {
                warn!(error = %err, "advertising credentials missing; collection disabled");
                Ok(Self::without_credentials(err.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct KeywordsRequest {
    #[serde(default)]
    pub asins: Vec<String>,
    pub marketplace: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct KeywordsResponse {
    asins: Vec<String>,
    marketplace: String,
    #[serde(flatten)]
    report: CollectionReport,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/keywords", post(keywords_handler))
        .route("/health", get(health_handler))
        .with_state(Arc::new(state))
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    let port: u16 = std::env::var("KWPIPE_WEB_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);
    let state = AppState::from_env().await?;
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "keyword API listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

fn failure(status: StatusCode, error: impl Into<String>) -> Response {
    (status, Json(json!({"success": false, "error": error.into()}))).into_response()
}

async fn keywords_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<KeywordsRequest>,
) -> Response {
    let asins = request
        .asins
        .iter()
        .map(|asin| asin.trim().to_string())
        .filter(|asin| !asin.is_empty())
        .collect::<Vec<_>>();
    if asins.is_empty() {
        return failure(StatusCode::BAD_REQUEST, "asins must be a non-empty array");
    }

    let pipeline = match &state.pipeline {
        Ok(pipeline) => pipeline.clone(),
        Err(reason) => return failure(StatusCode::OK, reason.clone()),
    };

    match pipeline.run(&asins).await {
        Ok(report) => Json(KeywordsResponse {
            asins,
            marketplace: request.marketplace.unwrap_or_else(|| "US".to_string()),
            report,
        })
        .into_response(),
        Err(err @ PipelineError::Auth(_)) => {
            warn!(error = %err, "token exchange failed");
            failure(StatusCode::BAD_GATEWAY, err.to_string())
        }
        Err(err) => {
            warn!(error = %err, "keyword collection failed");
            failure(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}
