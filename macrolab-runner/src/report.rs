//! Reporting and export: Markdown narrative, JSON summary, CSV and Parquet.
//!
//! - `report/report_summary.md`: time range, indicators, executive narrative
//!   and technical summary
//! - `report/analysis_summary.json`: machine-readable results, versioned
//! - `forecasts.csv`, `ml_predictions.csv` in the output directory
//! - `processed/dataset.csv` and `processed/dataset.parquet`
//!
//! Persisted JSON carries a `schema_version`; newer versions are rejected on
//! load.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use macrolab_core::classify::SignalLabel;
use macrolab_core::data::DataSource;
use macrolab_core::models::MlForecast;
use macrolab_core::stats::{CorrelationMatrix, GrangerResult};
use macrolab_core::{Classification, Dataset};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::PathsConfig;
use crate::modeling::{ModelFailure, ModelingReport, SarimaSummary};
use crate::stat_tests::{AdfEntry, StatsReport};

/// Current schema version for `analysis_summary.json`.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Everything the report draws on, borrowed from the pipeline stages.
pub struct ReportInputs<'a> {
    pub dataset: &'a Dataset,
    pub dataset_hash: &'a str,
    pub sources: &'a BTreeMap<String, DataSource>,
    pub has_synthetic: bool,
    pub correlation: &'a CorrelationMatrix,
    pub stats: &'a StatsReport,
    pub modeling: &'a ModelingReport,
    pub signals: &'a [(String, Classification)],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlScore {
    pub target: String,
    pub model: String,
    /// `None` when the test-window error is not finite.
    pub mse: Option<f64>,
    pub n_train: usize,
    pub n_test: usize,
}

impl From<&MlForecast> for MlScore {
    fn from(fc: &MlForecast) -> Self {
        Self {
            target: fc.target.clone(),
            model: fc.model.clone(),
            mse: fc.mse.is_finite().then_some(fc.mse),
            n_train: fc.n_train,
            n_test: fc.predicted.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEntry {
    pub column: String,
    pub score: Option<f64>,
    pub label: SignalLabel,
}

/// Contents of `analysis_summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub indicators: Vec<String>,
    pub n_rows: usize,
    pub dataset_hash: String,
    pub has_synthetic: bool,
    pub sources: BTreeMap<String, DataSource>,
    pub adf: Vec<AdfEntry>,
    pub granger: Vec<GrangerResult>,
    pub sarima: Vec<SarimaSummary>,
    pub ml: Vec<MlScore>,
    pub classifications: Vec<SignalEntry>,
    pub failures: Vec<ModelFailure>,
}

impl AnalysisSummary {
    pub fn from_inputs(inputs: &ReportInputs<'_>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            start_date: inputs.dataset.first_date(),
            end_date: inputs.dataset.last_date(),
            indicators: inputs.dataset.columns.clone(),
            n_rows: inputs.dataset.n_rows(),
            dataset_hash: inputs.dataset_hash.to_string(),
            has_synthetic: inputs.has_synthetic,
            sources: inputs.sources.clone(),
            adf: inputs.stats.adf.clone(),
            granger: inputs.stats.granger.clone(),
            sarima: inputs.modeling.sarima.clone(),
            ml: inputs.modeling.ml.iter().map(MlScore::from).collect(),
            classifications: inputs
                .signals
                .iter()
                .map(|(column, c)| SignalEntry {
                    column: column.clone(),
                    score: c.score,
                    label: c.label,
                })
                .collect(),
            failures: inputs.modeling.failures.clone(),
        }
    }
}

// ─── JSON ───────────────────────────────────────────────────────────

pub fn export_summary_json(summary: &AnalysisSummary) -> Result<String> {
    serde_json::to_string_pretty(summary).context("failed to serialize analysis summary to JSON")
}

/// Parse a summary, rejecting schema versions newer than this build.
pub fn import_summary_json(json: &str) -> Result<AnalysisSummary> {
    let summary: AnalysisSummary =
        serde_json::from_str(json).context("failed to deserialize analysis summary from JSON")?;
    if summary.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            summary.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(summary)
}

// ─── Markdown ───────────────────────────────────────────────────────

fn fmt_opt(v: Option<f64>, precision: usize) -> String {
    match v {
        Some(x) if x.is_finite() => format!("{x:.precision$}"),
        _ => "n/a".to_string(),
    }
}

/// Correlated pairs sorted from most positive to most negative.
fn ranked_pairs(corr: &CorrelationMatrix) -> Vec<(String, String, f64)> {
    let mut pairs = corr.pairs();
    pairs.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
    pairs
}

/// The executive narrative section.
pub fn macro_narrative(inputs: &ReportInputs<'_>) -> String {
    let mut md = String::new();
    md.push_str("## Executive Macroeconomic Narrative\n\n");
    md.push_str(
        "This analysis assesses macroeconomic conditions and their interaction with financial \
         markets over the selected period, drawing on historical trends, correlation structure, \
         statistical tests and forward-looking forecasts.\n",
    );

    md.push_str("\n### Key Market-Macro Relationships\n\n");
    let pairs = ranked_pairs(inputs.correlation);
    md.push_str("**Most positively correlated pairs:**\n");
    for (a, b, v) in pairs.iter().take(3) {
        md.push_str(&format!("- {a} and {b}: correlation {v:.2}\n"));
    }
    md.push_str("\n**Most negatively correlated pairs:**\n");
    for (a, b, v) in pairs.iter().skip(pairs.len().saturating_sub(3)) {
        md.push_str(&format!("- {a} and {b}: correlation {v:.2}\n"));
    }

    md.push_str("\n### Forecasted Macro Trends\n\n");
    let trends: Vec<String> = inputs
        .modeling
        .sarima
        .iter()
        .filter_map(|s| {
            s.direction()
                .map(|dir| format!("- {} appears {dir} over the forecast horizon.\n", s.column))
        })
        .collect();
    if trends.is_empty() {
        md.push_str("- No significant trend shifts detected in the forecasting window.\n");
    } else {
        trends.iter().for_each(|t| md.push_str(t));
    }

    md.push_str("\n### Structural vs Short-Term Signals\n\n");
    md.push_str(
        "Indicators classified as *structural* show persistent, fundamentals-driven movement; \
         *temporary* signals reflect short-term fluctuation or market noise.\n",
    );
    let with_label = |label: SignalLabel| -> Vec<&str> {
        inputs
            .signals
            .iter()
            .filter(|(_, c)| c.label == label)
            .map(|(n, _)| n.as_str())
            .collect()
    };

    md.push_str("\n**Structural indicators:**\n");
    match with_label(SignalLabel::Structural).as_slice() {
        [] => md.push_str("- None identified as structurally dominant.\n"),
        names => names.iter().for_each(|n| md.push_str(&format!("- {n}\n"))),
    }
    md.push_str("\n**Short-term or volatile indicators:**\n");
    match with_label(SignalLabel::TemporaryHype).as_slice() {
        [] => md.push_str("- No indicators flagged as short-term or noise dominated.\n"),
        names => names.iter().for_each(|n| md.push_str(&format!("- {n}\n"))),
    }

    md.push_str("\n---\n");
    md
}

/// The full `report_summary.md`.
pub fn render_markdown(inputs: &ReportInputs<'_>) -> String {
    let ds = inputs.dataset;
    let mut md = String::from("# Macroeconomic Analysis Report\n\n");
    if let (Some(first), Some(last)) = (ds.first_date(), ds.last_date()) {
        md.push_str(&format!("**Time range:** {first} to {last}\n\n"));
    }
    md.push_str(&format!("**Indicators analyzed:** {}\n\n", ds.columns.join(", ")));
    if inputs.has_synthetic {
        let synthetic: Vec<&str> = inputs
            .sources
            .iter()
            .filter(|(_, s)| **s == DataSource::Synthetic)
            .map(|(n, _)| n.as_str())
            .collect();
        md.push_str(&format!(
            "> **Synthetic data** was used for: {}. Results are for development only.\n\n",
            synthetic.join(", ")
        ));
    }
    md.push_str(&format!("Dataset hash: `{}`\n\n---\n\n", inputs.dataset_hash));

    md.push_str(&macro_narrative(inputs));

    md.push_str("\n## Technical Summary\n");

    md.push_str("\n### Stationarity Tests (ADF)\n\n");
    for entry in &inputs.stats.adf {
        let r = entry.result.as_ref();
        md.push_str(&format!(
            "- {}: ADF={}, p={}\n",
            entry.column,
            fmt_opt(r.map(|r| r.statistic), 4),
            fmt_opt(r.map(|r| r.pvalue), 4)
        ));
    }

    md.push_str("\n### Granger Causality (min p over lags)\n\n");
    let mut significant: Vec<&GrangerResult> = inputs
        .stats
        .granger
        .iter()
        .filter(|g| g.pvalue.is_some_and(|p| p < 0.05))
        .collect();
    significant.sort_by(|a, b| a.pvalue.partial_cmp(&b.pvalue).unwrap_or(std::cmp::Ordering::Equal));
    if significant.is_empty() {
        md.push_str("- No pair significant at 5%.\n");
    }
    for g in significant.iter().take(10) {
        md.push_str(&format!("- {}: p={}\n", g.label(), fmt_opt(g.pvalue, 4)));
    }

    md.push_str("\n### Correlation Matrix\n\n(See `plots/correlation_matrix.svg`.)\n");

    md.push_str("\n### SARIMA Forecast Diagnostics\n\n");
    for s in &inputs.modeling.sarima {
        md.push_str(&format!("- {}: {} AIC={}\n", s.column, s.order, fmt_opt(s.aic, 2)));
    }

    md.push_str("\n### Machine Learning Baseline\n\n");
    for fc in &inputs.modeling.ml {
        md.push_str(&format!("- {}: MSE={} ({})\n", fc.target, fmt_opt(Some(fc.mse), 4), fc.model));
    }

    if !inputs.modeling.failures.is_empty() {
        md.push_str("\n### Model Failures\n\n");
        for f in &inputs.modeling.failures {
            md.push_str(&format!("- {} ({}): {}\n", f.column, f.model, f.error));
        }
    }

    md.push_str("\n### Structural vs Temporary Indicator Classification\n\n");
    for (name, c) in inputs.signals {
        md.push_str(&format!("- {name}: {} (score {})\n", c.label, fmt_opt(c.score, 4)));
    }

    md
}

// ─── CSV / Parquet ──────────────────────────────────────────────────

/// Columns: indicator, date, mean, lower, upper
pub fn export_forecasts_csv(sarima: &[SarimaSummary]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["indicator", "date", "mean", "lower", "upper"])?;
    for s in sarima {
        for p in &s.forecast {
            wtr.write_record([
                &s.column,
                &p.date.to_string(),
                &format!("{:.6}", p.mean),
                &format!("{:.6}", p.lower),
                &format!("{:.6}", p.upper),
            ])?;
        }
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Columns: indicator, model, date, actual, predicted
pub fn export_ml_predictions_csv(ml: &[MlForecast]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["indicator", "model", "date", "actual", "predicted"])?;
    for fc in ml {
        for ((date, actual), predicted) in fc.dates.iter().zip(&fc.actual).zip(&fc.predicted) {
            wtr.write_record([
                &fc.target,
                &fc.model,
                &date.to_string(),
                &format!("{actual:.6}"),
                &format!("{predicted:.6}"),
            ])?;
        }
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// The prepared table: a `date` column then one column per indicator.
pub fn export_dataset_csv(dataset: &Dataset) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header = vec!["date".to_string()];
    header.extend(dataset.columns.iter().cloned());
    wtr.write_record(&header)?;

    for (row, date) in dataset.dates.iter().enumerate() {
        let mut record = vec![date.to_string()];
        record.extend(dataset.values.iter().map(|col| {
            let v = col[row];
            if v.is_nan() {
                String::new()
            } else {
                v.to_string()
            }
        }));
        wtr.write_record(&record)?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Write the prepared table as Parquet, via a temp file and rename.
pub fn write_dataset_parquet(dataset: &Dataset, path: &Path) -> Result<()> {
    let epoch = NaiveDate::default();
    let days: Vec<i32> = dataset
        .dates
        .iter()
        .map(|d| (*d - epoch).num_days() as i32)
        .collect();

    let mut columns = vec![Column::new("date".into(), days).cast(&DataType::Date)?];
    for (name, values) in dataset.iter_columns() {
        columns.push(Column::new(name.into(), values.to_vec()));
    }
    let mut df = DataFrame::new(columns)?;

    let tmp = path.with_extension("parquet.tmp");
    let file = std::fs::File::create(&tmp).with_context(|| format!("failed to create {}", tmp.display()))?;
    ParquetWriter::new(file).finish(&mut df)?;
    std::fs::rename(&tmp, path).with_context(|| format!("failed to move {} into place", tmp.display()))?;
    Ok(())
}

// ─── Artifact bundle ────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub markdown: PathBuf,
    pub json: PathBuf,
    pub forecasts_csv: PathBuf,
    pub ml_predictions_csv: PathBuf,
    pub dataset_csv: PathBuf,
    pub dataset_parquet: PathBuf,
}

/// Write every report artifact. Directories must already exist.
pub fn write_reports(inputs: &ReportInputs<'_>, paths: &PathsConfig) -> Result<ReportPaths> {
    let out = ReportPaths {
        markdown: paths.report_dir().join("report_summary.md"),
        json: paths.report_dir().join("analysis_summary.json"),
        forecasts_csv: paths.output_dir.join("forecasts.csv"),
        ml_predictions_csv: paths.output_dir.join("ml_predictions.csv"),
        dataset_csv: paths.processed_dir().join("dataset.csv"),
        dataset_parquet: paths.processed_dir().join("dataset.parquet"),
    };

    std::fs::write(&out.markdown, render_markdown(inputs))
        .with_context(|| format!("failed to write {}", out.markdown.display()))?;
    std::fs::write(&out.json, export_summary_json(&AnalysisSummary::from_inputs(inputs))?)
        .with_context(|| format!("failed to write {}", out.json.display()))?;
    std::fs::write(&out.forecasts_csv, export_forecasts_csv(&inputs.modeling.sarima)?)?;
    std::fs::write(&out.ml_predictions_csv, export_ml_predictions_csv(&inputs.modeling.ml)?)?;
    std::fs::write(&out.dataset_csv, export_dataset_csv(inputs.dataset)?)?;
    write_dataset_parquet(inputs.dataset, &out.dataset_parquet)?;

    tracing::info!(report = %out.markdown.display(), "report written");
    Ok(out)
}
