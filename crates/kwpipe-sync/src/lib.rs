//! Keyword collection pipeline: per-ASIN source fetch, expansion, dedup, bid enrichment,
//! catalog fallback, batched persistence, and run reporting.

pub mod config;
pub mod dedup;
pub mod enrichment;
pub mod error;
pub mod expansion;
pub mod fallback;
pub mod persistence;
pub mod pipeline;
pub mod report;
pub mod sources;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::PipelineConfig;
pub use error::PipelineError;
pub use pipeline::{pipeline_from_env, KeywordPipeline, ProductOutcome};
pub use report::{write_run_report, CollectionReport, ReportedKeyword, RunSummary};

pub const CRATE_NAME: &str = "kwpipe-sync";
