//! Run-level aggregates and the on-disk report for a collection run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use kwpipe_core::CandidateKeyword;
use serde::Serialize;
use tokio::fs;
use uuid::Uuid;

/// A finished keyword tagged with the product it was collected for.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportedKeyword {
    pub asin: String,
    #[serde(flatten)]
    pub keyword: CandidateKeyword,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total_keywords: usize,
    pub asins_processed: usize,
    pub asins_failed: usize,
    pub processed_asins: Vec<String>,
    pub failed_asins: Vec<String>,
    pub keywords_persisted: usize,
    pub primary_keywords: usize,
    pub longtail_keywords: usize,
    pub by_source: BTreeMap<String, usize>,
    pub by_match_type: BTreeMap<String, usize>,
    pub by_enrichment_source: BTreeMap<String, usize>,
    pub total_enriched: usize,
    /// Enriched share of all keywords, 0..=1.
    pub enrichment_rate: f64,
    pub average_bid_cents: f64,
    pub total_estimated_clicks: u64,
    pub total_estimated_orders: u64,
    pub estimated_conversion_rate: f64,
    pub average_keywords_per_asin: f64,
    /// Average keywords per requested ASIN against the target, capped at 100.
    pub keyword_quality_score: u32,
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if numerator == 0.0 || denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

impl RunSummary {
    pub fn from_run(
        keywords: &[ReportedKeyword],
        processed_asins: Vec<String>,
        failed_asins: Vec<String>,
        keywords_persisted: usize,
        quality_target_per_product: usize,
    ) -> Self {
        let total = keywords.len();
        let requested = processed_asins.len() + failed_asins.len();

        let mut by_source: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_match_type: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_enrichment_source: BTreeMap<String, usize> = BTreeMap::new();
        let mut primary = 0;
        let mut bid_sum = 0i64;
        let mut clicks = 0u64;
        let mut orders = 0u64;
        for ReportedKeyword { keyword: kw, .. } in keywords {
            *by_source.entry(kw.source.as_str().to_string()).or_default() += 1;
            *by_match_type.entry(kw.match_type.as_str().to_string()).or_default() += 1;
            if let Some(m) = kw.enrichment_source {
                *by_enrichment_source.entry(m.as_str().to_string()).or_default() += 1;
            }
            if kw.is_primary {
                primary += 1;
            }
            bid_sum += kw.suggested_bid_cents;
            clicks += kw.estimated_clicks;
            orders += kw.estimated_orders;
        }
        let total_enriched: usize = by_enrichment_source.values().sum();

        let average_keywords_per_asin = ratio(total as f64, requested as f64);
        let quality = (average_keywords_per_asin / quality_target_per_product.max(1) as f64 * 100.0)
            .round()
            .min(100.0) as u32;

        Self {
            total_keywords: total,
            asins_processed: processed_asins.len(),
            asins_failed: failed_asins.len(),
            processed_asins,
            failed_asins,
            keywords_persisted,
            primary_keywords: primary,
            longtail_keywords: total - primary,
            by_source,
            by_match_type,
            by_enrichment_source,
            total_enriched,
            enrichment_rate: ratio(total_enriched as f64, total as f64),
            average_bid_cents: ratio(bid_sum as f64, total as f64),
            total_estimated_clicks: clicks,
            total_estimated_orders: orders,
            estimated_conversion_rate: ratio(orders as f64, clicks as f64),
            average_keywords_per_asin,
            keyword_quality_score: quality,
        }
    }

    pub fn message(&self) -> String {
        format!(
            "Processed {}/{} ASINs: {} keywords collected, {} enriched with bid data",
            self.asins_processed,
            self.asins_processed + self.asins_failed,
            self.total_keywords,
            self.total_enriched
        )
    }
}

/// What a run hands back to its caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub success: bool,
    pub message: String,
    pub keywords: Vec<ReportedKeyword>,
    pub summary: RunSummary,
}

/// Writes `keywords_summary.json` and `brief.md` under `<reports_root>/<run_id>/`.
pub async fn write_run_report(reports_root: &Path, report: &CollectionReport) -> Result<PathBuf> {
    let dir = reports_root.join(report.run_id.to_string());
    fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("creating {}", dir.display()))?;

    let json = serde_json::to_vec_pretty(report).context("serializing run report")?;
    fs::write(dir.join("keywords_summary.json"), json)
        .await
        .context("writing keywords_summary.json")?;

    let s = &report.summary;
    let counts = |map: &BTreeMap<String, usize>| {
        if map.is_empty() {
            return "- none".to_string();
        }
        map.iter()
            .map(|(k, v)| format!("- {k}: {v}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let brief = format!(
        "# Keyword Collection Brief\n\n- Run ID: `{}`\n- Started: {}\n- Finished: {}\n- ASINs processed: {}\n- ASINs failed: {}\n- Keywords: {} ({} primary, {} long-tail)\n- Persisted: {}\n- Enrichment rate: {:.1}%\n- Quality score: {}\n\n## By Source\n{}\n\n## By Match Type\n{}\n\n## By Enrichment Source\n{}\n",
        report.run_id,
        report.started_at,
        report.finished_at,
        s.asins_processed,
        s.asins_failed,
        s.total_keywords,
        s.primary_keywords,
        s.longtail_keywords,
        s.keywords_persisted,
        s.enrichment_rate * 100.0,
        s.keyword_quality_score,
        counts(&s.by_source),
        counts(&s.by_match_type),
        counts(&s.by_enrichment_source),
    );
    fs::write(dir.join("brief.md"), brief)
        .await
        .context("writing brief.md")?;

    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kwpipe_core::{KeywordSource, MatchType};

    fn reported(asin: &str, text: &str, mt: MatchType, primary: bool) -> ReportedKeyword {
        ReportedKeyword {
            asin: asin.into(),
            keyword: CandidateKeyword::new(text, mt, 100, KeywordSource::Suggested).primary(primary),
        }
    }

    fn sample() -> Vec<ReportedKeyword> {
        let mut enriched = reported("B000TEST01", "sleep mask", MatchType::Exact, true);
        enriched.keyword.enrichment_source = Some(MatchType::Exact);
        enriched.keyword.suggested_bid_cents = 200;
        enriched.keyword.estimated_clicks = 20;
        enriched.keyword.estimated_orders = 5;
        vec![
            enriched,
            reported("B000TEST01", "eye mask", MatchType::Broad, false),
            reported("B000TEST01", "eye mask", MatchType::Phrase, false),
        ]
    }

    #[test]
    fn summary_aggregates_counts_and_rates() {
        let summary = RunSummary::from_run(
            &sample(),
            vec!["B000TEST01".into()],
            vec!["B000TEST02".into()],
            3,
            30,
        );
        assert_eq!(summary.total_keywords, 3);
        assert_eq!(summary.asins_processed, 1);
        assert_eq!(summary.asins_failed, 1);
        assert_eq!(summary.primary_keywords, 1);
        assert_eq!(summary.longtail_keywords, 2);
        assert_eq!(summary.by_match_type.get("EXACT"), Some(&1));
        assert_eq!(summary.by_source.get("suggested"), Some(&3));
        assert_eq!(summary.by_enrichment_source.get("EXACT"), Some(&1));
        assert_eq!(summary.total_enriched, 1);
        assert!((summary.enrichment_rate - 1.0 / 3.0).abs() < 1e-9);
        assert!((summary.average_bid_cents - 400.0 / 3.0).abs() < 1e-9);
        assert!((summary.estimated_conversion_rate - 0.25).abs() < 1e-9);
        assert!((summary.average_keywords_per_asin - 1.5).abs() < 1e-9);
        assert_eq!(summary.keyword_quality_score, 5);
    }

    #[test]
    fn quality_score_caps_at_one_hundred() {
        let keywords = (0..40)
            .map(|i| reported("B000TEST01", &format!("kw {i}"), MatchType::Broad, false))
            .collect::<Vec<_>>();
        let summary = RunSummary::from_run(&keywords, vec!["B000TEST01".into()], Vec::new(), 40, 30);
        assert_eq!(summary.keyword_quality_score, 100);
        assert_eq!(summary.estimated_conversion_rate, 0.0);

        let empty = RunSummary::from_run(&[], Vec::new(), Vec::new(), 0, 30);
        assert_eq!(empty.keyword_quality_score, 0);
        assert_eq!(empty.enrichment_rate, 0.0);
    }

    #[tokio::test]
    async fn report_files_land_under_the_run_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let keywords = sample();
        let summary = RunSummary::from_run(&keywords, vec!["B000TEST01".into()], Vec::new(), 3, 30);
        let report = CollectionReport {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            success: true,
            message: summary.message(),
            keywords,
            summary,
        };

        let dir = write_run_report(tmp.path(), &report).await.unwrap();
        assert_eq!(dir, tmp.path().join(report.run_id.to_string()));

        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(dir.join("keywords_summary.json")).unwrap()).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["keywords"][0]["asin"], "B000TEST01");
        assert_eq!(json["keywords"][0]["matchType"], "EXACT");
        assert_eq!(json["summary"]["totalKeywords"], 3);
        assert_eq!(json["summary"]["failedAsins"], serde_json::json!([]));

        let brief = std::fs::read_to_string(dir.join("brief.md")).unwrap();
        assert!(brief.contains("# Keyword Collection Brief"));
        assert!(brief.contains("- suggested: 3"));
    }
}
