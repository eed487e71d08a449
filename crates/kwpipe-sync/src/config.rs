use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Batching caps, pauses, and thresholds for one pipeline instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub suggested_cap: usize,
    pub recommendations_cap: usize,
    pub recommendation_seed_count: usize,
    pub primary_cutoff: usize,
    pub expansion_base_cap: usize,
    pub template_seed_cap: usize,
    pub max_keyword_len: usize,
    /// Keywords per bid request; three targeting expressions are sent per keyword.
    pub bid_batch_size: usize,
    pub persist_batch_size: usize,
    pub bid_batch_pause: Duration,
    pub product_pause: Duration,
    pub quality_target_per_product: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            suggested_cap: 1000,
            recommendations_cap: 2000,
            recommendation_seed_count: 50,
            primary_cutoff: 50,
            expansion_base_cap: 200,
            template_seed_cap: 100,
            max_keyword_len: 80,
            bid_batch_size: 33,
            persist_batch_size: 100,
            bid_batch_pause: Duration::from_millis(500),
            product_pause: Duration::from_millis(1000),
            quality_target_per_product: 30,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PipelineOverrides {
    suggested_cap: Option<usize>,
    recommendations_cap: Option<usize>,
    recommendation_seed_count: Option<usize>,
    primary_cutoff: Option<usize>,
    expansion_base_cap: Option<usize>,
    template_seed_cap: Option<usize>,
    max_keyword_len: Option<usize>,
    bid_batch_size: Option<usize>,
    persist_batch_size: Option<usize>,
    bid_batch_pause_ms: Option<u64>,
    product_pause_ms: Option<u64>,
    quality_target_per_product: Option<usize>,
}

impl PipelineConfig {
    /// Defaults, then the YAML file named by `KWPIPE_PIPELINE_CONFIG` when set.
    pub fn from_env() -> Result<Self> {
        match std::env::var("KWPIPE_PIPELINE_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::from_yaml_file(path.trim()),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let overrides: PipelineOverrides = if text.trim().is_empty() {
            PipelineOverrides::default()
        } else {
            serde_yaml::from_str(text).context("decoding pipeline overrides")?
        };
        Ok(Self::default().with_overrides(overrides))
    }

    fn with_overrides(self, o: PipelineOverrides) -> Self {
        Self {
            suggested_cap: o.suggested_cap.unwrap_or(self.suggested_cap),
            recommendations_cap: o.recommendations_cap.unwrap_or(self.recommendations_cap),
            recommendation_seed_count: o
                .recommendation_seed_count
                .unwrap_or(self.recommendation_seed_count),
            primary_cutoff: o.primary_cutoff.unwrap_or(self.primary_cutoff),
            expansion_base_cap: o.expansion_base_cap.unwrap_or(self.expansion_base_cap),
            template_seed_cap: o.template_seed_cap.unwrap_or(self.template_seed_cap),
            max_keyword_len: o.max_keyword_len.unwrap_or(self.max_keyword_len),
            bid_batch_size: o.bid_batch_size.unwrap_or(self.bid_batch_size).max(1),
            persist_batch_size: o.persist_batch_size.unwrap_or(self.persist_batch_size).max(1),
            bid_batch_pause: o
                .bid_batch_pause_ms
                .map(Duration::from_millis)
                .unwrap_or(self.bid_batch_pause),
            product_pause: o
                .product_pause_ms
                .map(Duration::from_millis)
                .unwrap_or(self.product_pause),
            quality_target_per_product: o
                .quality_target_per_product
                .unwrap_or(self.quality_target_per_product)
                .max(1),
        }
    }
}
