//! Exploration stage: overview chart, correlation heatmap, decompositions.

use macrolab_core::stats::decompose::DEFAULT_PERIOD;
use macrolab_core::stats::{correlation_matrix, seasonal_decompose, CorrelationMatrix};
use macrolab_core::Dataset;
use std::path::{Path, PathBuf};

use crate::plots::{correlation_heatmap, decomposition_plot, file_stem, overview_plot};

#[derive(Debug, Clone)]
pub struct EdaSummary {
    pub correlation: CorrelationMatrix,
    /// Columns whose seasonal decomposition succeeded.
    pub decomposed: Vec<String>,
    /// Columns that could not be decomposed, with the reason.
    pub skipped: Vec<(String, String)>,
    pub plots: Vec<PathBuf>,
}

/// Run the exploration stage. Plot failures are logged and skipped.
pub fn run_eda(dataset: &Dataset, plots_dir: &Path) -> EdaSummary {
    let mut plots = Vec::new();

    let overview = plots_dir.join("time_series_overview.svg");
    match overview_plot(dataset, &overview) {
        Ok(()) => plots.push(overview),
        Err(e) => tracing::warn!(error = %e, "overview plot failed"),
    }

    let correlation = correlation_matrix(dataset.iter_columns());
    let heatmap = plots_dir.join("correlation_matrix.svg");
    match correlation_heatmap(&correlation, &heatmap) {
        Ok(()) => plots.push(heatmap),
        Err(e) => tracing::warn!(error = %e, "correlation heatmap failed"),
    }

    let mut decomposed = Vec::new();
    let mut skipped = Vec::new();
    for (name, values) in dataset.iter_columns() {
        let dec = match seasonal_decompose(values, DEFAULT_PERIOD) {
            Ok(dec) => dec,
            Err(e) => {
                tracing::warn!(column = name, error = %e, "decomposition failed");
                skipped.push((name.to_string(), e.to_string()));
                continue;
            }
        };
        let path = plots_dir.join(format!("decompose_{}.svg", file_stem(name)));
        match decomposition_plot(name, &dataset.dates, &dec, &path) {
            Ok(()) => plots.push(path),
            Err(e) => tracing::warn!(column = name, error = %e, "decomposition plot failed"),
        }
        decomposed.push(name.to_string());
    }

    tracing::info!(plots = plots.len(), decomposed = decomposed.len(), "exploration done");
    EdaSummary {
        correlation,
        decomposed,
        skipped,
        plots,
    }
}
