//! Modeling stage: SARIMA forecasts and the ML lag baseline per column.
//!
//! A column that fails one model is logged and left out of that model's
//! results only.

use chrono::NaiveDate;
use macrolab_core::data::resample::add_month_ends;
use macrolab_core::models::{ml_lag_forecast, test_split_len, MlForecast, ModelError, Sarima};
use macrolab_core::Dataset;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::AnalysisConfig;
use crate::plots::{file_stem, ml_plot, sarima_plot, ForecastChart};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SarimaSummary {
    pub column: String,
    pub order: String,
    /// `None` when the fit produced no finite value.
    pub aic: Option<f64>,
    pub log_likelihood: Option<f64>,
    pub converged: bool,
    pub last_date: NaiveDate,
    pub last_observed: f64,
    pub forecast: Vec<ForecastPoint>,
}

impl SarimaSummary {
    /// `rising` or `declining`: final forecast against the last observation.
    /// `None` for forecasts shorter than two steps.
    pub fn direction(&self) -> Option<&'static str> {
        if self.forecast.len() < 2 {
            return None;
        }
        let last = self.forecast.last()?.mean;
        Some(if last > self.last_observed { "rising" } else { "declining" })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFailure {
    pub column: String,
    pub model: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelingReport {
    pub sarima: Vec<SarimaSummary>,
    pub ml: Vec<MlForecast>,
    pub failures: Vec<ModelFailure>,
    #[serde(skip)]
    pub plots: Vec<PathBuf>,
}

/// Fit SARIMA and forecast `periods` month-ends past the last date.
pub fn sarima_forecast(
    dataset: &Dataset,
    column: &str,
    config: &AnalysisConfig,
) -> Result<SarimaSummary, ModelError> {
    let values = dataset
        .column(column)
        .ok_or_else(|| ModelError::UnknownColumn(column.to_string()))?;
    let last_date = dataset.last_date().ok_or(ModelError::InsufficientData { needed: 1, got: 0 })?;
    let last_observed = values
        .iter()
        .rev()
        .copied()
        .find(|v| !v.is_nan())
        .ok_or(ModelError::InsufficientData { needed: 1, got: 0 })?;

    let mut model = Sarima::new(config.sarima.to_order())?
        .with_enforce_stationarity(config.sarima.enforce_stationarity)
        .with_enforce_invertibility(config.sarima.enforce_invertibility);
    model.fit(values)?;
    let fc = model.forecast(config.forecast_periods)?;

    let forecast = (0..fc.len())
        .map(|h| ForecastPoint {
            date: add_month_ends(last_date, h as u32 + 1),
            mean: fc.mean[h],
            lower: fc.lower[h],
            upper: fc.upper[h],
        })
        .collect();

    Ok(SarimaSummary {
        column: column.to_string(),
        order: model.order().to_string(),
        aic: model.aic().filter(|v| v.is_finite()),
        log_likelihood: model.log_likelihood().filter(|v| v.is_finite()),
        converged: model.converged().unwrap_or(false),
        last_date,
        last_observed,
        forecast,
    })
}

/// Run both models over every column, writing one plot per fitted model.
pub fn run_modeling(dataset: &Dataset, config: &AnalysisConfig, plots_dir: &Path) -> ModelingReport {
    let mut report = ModelingReport::default();
    let ml_periods = test_split_len(dataset.n_rows(), config.forecast_periods);

    for (name, values) in dataset.iter_columns() {
        match sarima_forecast(dataset, name, config) {
            Ok(summary) => {
                tracing::info!(column = name, aic = ?summary.aic, "SARIMA fitted");
                let path = plots_dir.join(format!("sarima_{}.svg", file_stem(name)));
                if let Err(e) = plot_sarima(dataset, values, &summary, &path) {
                    tracing::warn!(column = name, error = %e, "SARIMA plot failed");
                } else {
                    report.plots.push(path);
                }
                report.sarima.push(summary);
            }
            Err(e) => {
                tracing::warn!(column = name, error = %e, "SARIMA failed");
                report.failures.push(ModelFailure {
                    column: name.to_string(),
                    model: "sarima".into(),
                    error: e.to_string(),
                });
            }
        }

        match ml_lag_forecast(dataset, name, ml_periods, config.lags, config.ml_model) {
            Ok(fc) => {
                tracing::info!(column = name, mse = fc.mse, model = %fc.model, "ML baseline fitted");
                let path = plots_dir.join(format!("ml_{}.svg", file_stem(name)));
                if let Err(e) = ml_plot(&fc, &path) {
                    tracing::warn!(column = name, error = %e, "ML plot failed");
                } else {
                    report.plots.push(path);
                }
                report.ml.push(fc);
            }
            Err(e) => {
                tracing::warn!(column = name, error = %e, "ML baseline failed");
                report.failures.push(ModelFailure {
                    column: name.to_string(),
                    model: config.ml_model.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    report
}

fn plot_sarima(dataset: &Dataset, history: &[f64], summary: &SarimaSummary, path: &Path) -> anyhow::Result<()> {
    let dates: Vec<NaiveDate> = summary.forecast.iter().map(|p| p.date).collect();
    let mean: Vec<f64> = summary.forecast.iter().map(|p| p.mean).collect();
    let lower: Vec<f64> = summary.forecast.iter().map(|p| p.lower).collect();
    let upper: Vec<f64> = summary.forecast.iter().map(|p| p.upper).collect();
    sarima_plot(
        &ForecastChart {
            name: &summary.column,
            history_dates: &dataset.dates,
            history,
            forecast_dates: &dates,
            mean: &mean,
            lower: &lower,
            upper: &upper,
        },
        path,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use macrolab_core::models::MlModelKind;

    fn dataset(n: u32) -> Dataset {
        let start = NaiveDate::from_ymd_opt(2016, 1, 31).unwrap();
        let dates = (0..n).map(|i| add_month_ends(start, i)).collect();
        let trend: Vec<f64> = (0..n).map(|i| 10.0 + 2.0 * f64::from(i)).collect();
        let wave: Vec<f64> = (0..n).map(|i| (f64::from(i) * 0.7).sin() * 3.0 + 20.0).collect();
        Dataset::from_columns(dates, vec!["TREND".into(), "WAVE".into()], vec![trend, wave]).unwrap()
    }

    fn config() -> AnalysisConfig {
        AnalysisConfig {
            ml_model: MlModelKind::LinearRegression,
            ..AnalysisConfig::default()
        }
    }

    #[test]
    fn forecast_dates_follow_last_month_end() {
        let ds = dataset(48);
        let summary = sarima_forecast(&ds, "TREND", &config()).unwrap();

        assert_eq!(summary.forecast.len(), 12);
        assert_eq!(summary.last_date, NaiveDate::from_ymd_opt(2019, 12, 31).unwrap());
        assert_eq!(summary.forecast[0].date, NaiveDate::from_ymd_opt(2020, 1, 31).unwrap());
        assert_eq!(summary.forecast[1].date, NaiveDate::from_ymd_opt(2020, 2, 29).unwrap());
        assert_eq!(summary.direction(), Some("rising"));
        assert_eq!(summary.order, "(1,1,1)(1,1,1,12)");
    }

    #[test]
    fn runs_both_models_and_plots() {
        let dir = tempfile::tempdir().unwrap();
        let report = run_modeling(&dataset(48), &config(), dir.path());

        assert_eq!(report.sarima.len(), 2);
        assert_eq!(report.ml.len(), 2);
        assert!(report.failures.is_empty(), "{:?}", report.failures);
        assert_eq!(report.ml[0].predicted.len(), 8);
        assert!(dir.path().join("sarima_TREND.svg").exists());
        assert!(dir.path().join("ml_WAVE.svg").exists());
    }

    #[test]
    fn short_dataset_records_failures() {
        let dir = tempfile::tempdir().unwrap();
        let report = run_modeling(&dataset(20), &config(), dir.path());

        assert!(report.sarima.is_empty());
        assert_eq!(report.failures.iter().filter(|f| f.model == "sarima").count(), 2);
        // 20 rows: 14 complete after 6 lags, 3 held out
        assert_eq!(report.ml.len(), 2);
        assert_eq!(report.ml[0].n_train, 11);
    }
}
