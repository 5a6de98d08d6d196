//! End-to-end pipeline: collect → prepare → explore → test → model →
//! score → report.
//!
//! Two entry points:
//! - `run_pipeline()`: the full analysis, used by `macrolab run`
//! - `download_all()`: collection only, filling the raw cache

use chrono::NaiveDate;
use macrolab_core::data::{CollectProgress, SeriesCache};
use macrolab_core::{evaluate_signals, prepare_dataset, SignalLabel};
use std::path::PathBuf;
use thiserror::Error;

use crate::collect::{collect_all, CollectError, CollectOptions, Providers};
use crate::config::{AnalysisConfig, ConfigError};
use crate::eda::run_eda;
use crate::modeling::run_modeling;
use crate::report::{write_reports, ReportInputs, ReportPaths};
use crate::stat_tests::{run_stats, write_summaries};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("collection failed: {0}")]
    Collect(#[from] CollectError),

    #[error("no usable data after preparation ({rows} rows, {cols} columns)")]
    EmptyDataset { rows: usize, cols: usize },

    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write report: {0}")]
    Export(String),
}

/// Per-run switches from the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub offline: bool,
    pub synthetic: bool,
    pub force: bool,
}

/// What a completed run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub indicators: Vec<String>,
    pub failed_indicators: Vec<(String, String)>,
    pub n_rows: usize,
    pub dataset_hash: String,
    pub has_synthetic: bool,
    pub adf_tested: usize,
    pub granger_pairs: usize,
    pub sarima_fitted: usize,
    pub ml_fitted: usize,
    pub model_failures: usize,
    pub structural: Vec<String>,
    pub plots: usize,
    pub report: ReportPaths,
}

#[derive(Debug, Clone)]
pub struct DownloadSummary {
    pub loaded: Vec<String>,
    pub failures: Vec<(String, String)>,
}

/// Create the output and data trees.
pub fn ensure_dirs(config: &AnalysisConfig) -> Result<(), PipelineError> {
    let paths = &config.paths;
    for dir in [
        paths.output_dir.clone(),
        paths.plots_dir(),
        paths.report_dir(),
        paths.raw_dir(),
        paths.processed_dir(),
    ] {
        std::fs::create_dir_all(&dir).map_err(|source| PipelineError::CreateDir { path: dir.clone(), source })?;
    }
    Ok(())
}

fn collect_options(config: &AnalysisConfig, opts: RunOptions) -> CollectOptions {
    CollectOptions {
        start: config.start_date,
        end: config.end_date,
        offline: opts.offline,
        synthetic: opts.synthetic,
        force: opts.force,
    }
}

/// Run the whole analysis and write every artifact.
///
/// Only configuration errors, missing data, and an unwritable output tree
/// abort the run. Failures inside a stage are logged and that part of the
/// output is omitted.
pub fn run_pipeline(
    config: &AnalysisConfig,
    opts: RunOptions,
    providers: Providers<'_>,
    progress: Option<&dyn CollectProgress>,
) -> Result<RunSummary, PipelineError> {
    config.validate()?;
    ensure_dirs(config)?;
    let paths = &config.paths;

    tracing::info!(indicators = config.indicators.len(), "collecting");
    let cache = SeriesCache::new(paths.raw_dir());
    let collected = collect_all(
        &config.indicators,
        &cache,
        providers,
        &paths.raw_dir(),
        progress,
        &collect_options(config, opts),
    )?;

    tracing::info!(columns = collected.dataset.n_cols(), "preparing");
    let dataset = prepare_dataset(&collected.dataset, Some(config.start_date), Some(config.end_date));
    if dataset.n_rows() == 0 || dataset.n_cols() == 0 {
        return Err(PipelineError::EmptyDataset {
            rows: dataset.n_rows(),
            cols: dataset.n_cols(),
        });
    }
    let dropped: Vec<&str> = collected
        .dataset
        .columns
        .iter()
        .map(|c| c.trim())
        .filter(|c| dataset.column(c).is_none())
        .collect();
    if !dropped.is_empty() {
        tracing::warn!(?dropped, "columns dropped during preparation");
    }
    let dataset_hash = dataset.content_hash();

    tracing::info!(rows = dataset.n_rows(), "exploring");
    let eda = run_eda(&dataset, &paths.plots_dir());

    tracing::info!("testing");
    let stats = run_stats(&dataset, config.granger_max_lag);
    if let Err(e) = write_summaries(&stats, &paths.output_dir) {
        tracing::warn!(error = %e, "failed to write test summaries");
    }

    tracing::info!("modeling");
    let modeling = run_modeling(&dataset, config, &paths.plots_dir());

    tracing::info!(window = config.signal_window, "scoring");
    let signals = evaluate_signals(&dataset, config.signal_window);

    tracing::info!("reporting");
    let inputs = ReportInputs {
        dataset: &dataset,
        dataset_hash: &dataset_hash,
        sources: &collected.sources,
        has_synthetic: collected.has_synthetic,
        correlation: &eda.correlation,
        stats: &stats,
        modeling: &modeling,
        signals: &signals,
    };
    let report = write_reports(&inputs, paths).map_err(|e| PipelineError::Export(format!("{e:#}")))?;

    Ok(RunSummary {
        start_date: dataset.first_date(),
        end_date: dataset.last_date(),
        indicators: dataset.columns.clone(),
        failed_indicators: collected.failures,
        n_rows: dataset.n_rows(),
        dataset_hash,
        has_synthetic: collected.has_synthetic,
        adf_tested: stats.adf.iter().filter(|a| a.result.is_some()).count(),
        granger_pairs: stats.granger.len(),
        sarima_fitted: modeling.sarima.len(),
        ml_fitted: modeling.ml.len(),
        model_failures: modeling.failures.len(),
        structural: signals
            .iter()
            .filter(|(_, c)| c.label == SignalLabel::Structural)
            .map(|(n, _)| n.clone())
            .collect(),
        plots: eda.plots.len() + modeling.plots.len(),
        report,
    })
}

/// Fetch every remote indicator into the raw cache.
pub fn download_all(
    config: &AnalysisConfig,
    force: bool,
    providers: Providers<'_>,
    progress: Option<&dyn CollectProgress>,
) -> Result<DownloadSummary, PipelineError> {
    config.validate()?;
    let raw_dir = config.paths.raw_dir();
    std::fs::create_dir_all(&raw_dir).map_err(|source| PipelineError::CreateDir {
        path: raw_dir.clone(),
        source,
    })?;

    let cache = SeriesCache::new(&raw_dir);
    let opts = RunOptions {
        force,
        ..RunOptions::default()
    };
    let collected = collect_all(
        &config.indicators,
        &cache,
        providers,
        &raw_dir,
        progress,
        &collect_options(config, opts),
    )?;

    Ok(DownloadSummary {
        loaded: collected.sources.into_keys().collect(),
        failures: collected.failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IndicatorSpec, PathsConfig};

    fn config(root: &std::path::Path) -> AnalysisConfig {
        AnalysisConfig {
            start_date: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2020, 12, 31).unwrap(),
            paths: PathsConfig {
                output_dir: root.join("outputs"),
                data_dir: root.join("data"),
            },
            indicators: vec![IndicatorSpec::yahoo("A", "AAA"), IndicatorSpec::yahoo("B", "BBB")],
            ..AnalysisConfig::default()
        }
    }

    #[test]
    fn offline_without_cache_or_synthetic_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let opts = RunOptions {
            offline: true,
            ..RunOptions::default()
        };
        let err = run_pipeline(&config(dir.path()), opts, Providers::default(), None).unwrap_err();
        assert!(matches!(err, PipelineError::Collect(CollectError::NoData { attempted: 2 })));
        // directories exist even though the run failed
        assert!(dir.path().join("outputs/plots").is_dir());
        assert!(dir.path().join("data/processed").is_dir());
    }

    #[test]
    fn invalid_config_is_rejected_before_any_io() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.indicators.clear();
        let err = run_pipeline(&cfg, RunOptions::default(), Providers::default(), None).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
        assert!(!dir.path().join("outputs").exists());
    }

    #[test]
    fn download_without_providers_reports_failures() {
        let dir = tempfile::tempdir().unwrap();
        let err = download_all(&config(dir.path()), false, Providers::default(), None).unwrap_err();
        assert!(matches!(err, PipelineError::Collect(CollectError::NoData { .. })));
    }
}
