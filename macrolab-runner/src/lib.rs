//! MacroLab Runner: configuration, pipeline stages, plots and reports.
//!
//! This crate builds on `macrolab-core` to provide:
//! - TOML configuration with the default indicator set
//! - Indicator collection with cache/download/synthetic fallback
//! - The exploration, testing and modeling stages with SVG plots
//! - Markdown, JSON, CSV and Parquet report artifacts
//! - `run_pipeline()` wiring it all together

pub mod collect;
pub mod config;
pub mod eda;
pub mod modeling;
pub mod pipeline;
pub mod plots;
pub mod report;
pub mod stat_tests;

pub use collect::{collect_all, CollectError, CollectOptions, CollectedData, Providers};
pub use config::{AnalysisConfig, ConfigError, IndicatorSpec, PathsConfig, SarimaConfig, SourceSpec};
pub use eda::{run_eda, EdaSummary};
pub use modeling::{run_modeling, sarima_forecast, ModelingReport, SarimaSummary};
pub use pipeline::{download_all, run_pipeline, DownloadSummary, PipelineError, RunOptions, RunSummary};
pub use report::{AnalysisSummary, ReportPaths, SCHEMA_VERSION};
pub use stat_tests::{run_stats, StatsReport};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<AnalysisConfig>();
        assert_sync::<AnalysisConfig>();
        assert_send::<CollectOptions>();
        assert_sync::<CollectOptions>();
    }

    #[test]
    fn stage_outputs_are_send_sync() {
        assert_send::<CollectedData>();
        assert_sync::<CollectedData>();
        assert_send::<StatsReport>();
        assert_sync::<StatsReport>();
        assert_send::<ModelingReport>();
        assert_sync::<ModelingReport>();
        assert_send::<EdaSummary>();
        assert_sync::<EdaSummary>();
    }

    #[test]
    fn run_summary_is_send_sync() {
        assert_send::<RunSummary>();
        assert_sync::<RunSummary>();
        assert_send::<AnalysisSummary>();
        assert_sync::<AnalysisSummary>();
    }
}
