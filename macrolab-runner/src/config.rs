//! TOML analysis configuration.
//!
//! Every field has a default, so an empty file (or no file at all) gives the
//! stock setup: nine Yahoo Finance proxies, 2013-01-01 to 2024-12-31, a
//! 12-month horizon, six lags and the random-forest baseline.

use chrono::NaiveDate;
use macrolab_core::classify::DEFAULT_WINDOW;
use macrolab_core::data::fred::DEFAULT_API_KEY_VAR;
use macrolab_core::models::{MlModelKind, SarimaOrder};
use macrolab_core::stats::granger::DEFAULT_MAX_LAG;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Where an indicator's data comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceSpec {
    /// Yahoo Finance chart API, month-end last close.
    Yahoo { ticker: String },
    /// FRED observations, month-end last value.
    Fred { series_id: String },
    /// A file under the raw data directory, month-end mean.
    Csv { filename: String },
}

impl SourceSpec {
    /// Provider key: ticker, series id or file name.
    pub fn key(&self) -> &str {
        match self {
            SourceSpec::Yahoo { ticker } => ticker,
            SourceSpec::Fred { series_id } => series_id,
            SourceSpec::Csv { filename } => filename,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorSpec {
    pub name: String,
    pub source: SourceSpec,
}

impl IndicatorSpec {
    pub fn yahoo(name: &str, ticker: &str) -> Self {
        Self {
            name: name.to_string(),
            source: SourceSpec::Yahoo {
                ticker: ticker.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SarimaConfig {
    pub order: [usize; 3],
    pub seasonal_order: [usize; 4],
    pub enforce_stationarity: bool,
    pub enforce_invertibility: bool,
}

impl Default for SarimaConfig {
    fn default() -> Self {
        Self {
            order: [1, 1, 1],
            seasonal_order: [1, 1, 1, 12],
            enforce_stationarity: false,
            enforce_invertibility: false,
        }
    }
}

impl SarimaConfig {
    pub fn to_order(&self) -> SarimaOrder {
        SarimaOrder::new(self.order, self.seasonal_order)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Plots, summaries and the report.
    pub output_dir: PathBuf,
    /// Holds `raw/` (inputs and cache) and `processed/`.
    pub data_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("outputs"),
            data_dir: PathBuf::from("data"),
        }
    }
}

impl PathsConfig {
    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.data_dir.join("processed")
    }

    pub fn plots_dir(&self) -> PathBuf {
        self.output_dir.join("plots")
    }

    pub fn report_dir(&self) -> PathBuf {
        self.output_dir.join("report")
    }
}

/// Full configuration for one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Months forecast beyond the last observation.
    pub forecast_periods: usize,
    /// Lags per column in the ML feature matrix.
    pub lags: usize,
    pub ml_model: MlModelKind,
    pub granger_max_lag: usize,
    /// Trailing window of the structural/hype heuristic.
    pub signal_window: usize,
    /// Environment variable holding the FRED API key.
    pub fred_api_key_env: String,
    pub sarima: SarimaConfig,
    pub paths: PathsConfig,
    pub indicators: Vec<IndicatorSpec>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2013, 1, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap_or_default(),
            forecast_periods: 12,
            lags: 6,
            ml_model: MlModelKind::RandomForest,
            granger_max_lag: DEFAULT_MAX_LAG,
            signal_window: DEFAULT_WINDOW,
            fred_api_key_env: DEFAULT_API_KEY_VAR.to_string(),
            sarima: SarimaConfig::default(),
            paths: PathsConfig::default(),
            indicators: default_indicators(),
        }
    }
}

/// Market indices and macro proxies, all from Yahoo Finance.
pub fn default_indicators() -> Vec<IndicatorSpec> {
    vec![
        IndicatorSpec::yahoo("SP500", "^GSPC"),
        IndicatorSpec::yahoo("NASDAQ100", "^NDX"),
        IndicatorSpec::yahoo("DOWJONES", "^DJI"),
        IndicatorSpec::yahoo("INFLATION_TIP", "TIP"),
        IndicatorSpec::yahoo("USD_INDEX", "DX-Y.NYB"),
        IndicatorSpec::yahoo("10YR_YIELD", "^TNX"),
        IndicatorSpec::yahoo("VIX", "^VIX"),
        IndicatorSpec::yahoo("CRUDE_OIL", "CL=F"),
        IndicatorSpec::yahoo("GOLD", "GC=F"),
    ]
}

impl AnalysisConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.start_date >= self.end_date {
            return Err(ConfigError::Invalid(format!(
                "start_date {} must be before end_date {}",
                self.start_date, self.end_date
            )));
        }
        if self.forecast_periods == 0 {
            return Err(ConfigError::Invalid("forecast_periods must be at least 1".into()));
        }
        if self.lags == 0 {
            return Err(ConfigError::Invalid("lags must be at least 1".into()));
        }
        if self.granger_max_lag == 0 {
            return Err(ConfigError::Invalid("granger_max_lag must be at least 1".into()));
        }
        if self.signal_window == 0 {
            return Err(ConfigError::Invalid("signal_window must be at least 1".into()));
        }
        if self.indicators.is_empty() {
            return Err(ConfigError::Invalid("no indicators configured".into()));
        }

        let mut seen = HashSet::new();
        for ind in &self.indicators {
            if ind.name.trim().is_empty() {
                return Err(ConfigError::Invalid("indicator with empty name".into()));
            }
            if !seen.insert(ind.name.trim()) {
                return Err(ConfigError::Invalid(format!("duplicate indicator '{}'", ind.name)));
            }
            if ind.source.key().trim().is_empty() {
                return Err(ConfigError::Invalid(format!("indicator '{}' has an empty source key", ind.name)));
            }
        }

        let order = self.sarima.to_order();
        if order.seasonal_d > 1 || order.d > 2 {
            return Err(ConfigError::Invalid(format!("unsupported SARIMA order {order}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_stock_setup() {
        let config = AnalysisConfig::default();
        assert_eq!(config.indicators.len(), 9);
        assert_eq!(config.indicators[0], IndicatorSpec::yahoo("SP500", "^GSPC"));
        assert_eq!(config.forecast_periods, 12);
        assert_eq!(config.lags, 6);
        assert_eq!(config.ml_model, MlModelKind::RandomForest);
        assert_eq!(config.sarima.to_order(), SarimaOrder::default());
        assert!(!config.sarima.enforce_stationarity);
        assert_eq!(config.fred_api_key_env, "FRED_API_KEY");
        config.validate().unwrap();
    }

    #[test]
    fn empty_toml_gives_defaults() {
        assert_eq!(AnalysisConfig::from_toml("").unwrap(), AnalysisConfig::default());
    }

    #[test]
    fn toml_roundtrip() {
        let config = AnalysisConfig::default();
        let text = config.to_toml().unwrap();
        assert!(text.contains("ticker = \"^GSPC\""));
        assert_eq!(AnalysisConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn parses_mixed_sources() {
        let text = r#"
            start_date = "2015-01-01"
            end_date = "2020-12-31"
            ml_model = "lr"

            [sarima]
            order = [2, 1, 0]

            [[indicators]]
            name = "CPI"
            source = { type = "fred", series_id = "CPIAUCSL" }

            [[indicators]]
            name = "HOUSING"
            source = { type = "csv", filename = "housing.csv" }
        "#;
        let config = AnalysisConfig::from_toml(text).unwrap();
        assert_eq!(config.ml_model, MlModelKind::LinearRegression);
        assert_eq!(config.sarima.order, [2, 1, 0]);
        assert_eq!(config.sarima.seasonal_order, [1, 1, 1, 12]);
        assert_eq!(
            config.indicators[0].source,
            SourceSpec::Fred {
                series_id: "CPIAUCSL".into()
            }
        );
        assert_eq!(config.indicators[1].source.key(), "housing.csv");
    }

    #[test]
    fn rejects_bad_values() {
        let bad = [
            "start_date = \"2020-01-01\"\nend_date = \"2019-01-01\"",
            "forecast_periods = 0",
            "lags = 0",
            "indicators = []",
            "[sarima]\nseasonal_order = [1, 2, 1, 12]",
        ];
        for text in bad {
            assert!(
                matches!(AnalysisConfig::from_toml(text), Err(ConfigError::Invalid(_))),
                "accepted: {text}"
            );
        }
    }

    #[test]
    fn rejects_duplicate_names() {
        let mut config = AnalysisConfig::default();
        config.indicators.push(IndicatorSpec::yahoo("VIX", "^VIX"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_names_equal_after_trimming() {
        let config = AnalysisConfig {
            indicators: vec![IndicatorSpec::yahoo("VIX", "^VIX"), IndicatorSpec::yahoo(" VIX ", "^VIX3M")],
            ..AnalysisConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = AnalysisConfig::from_file(Path::new("/nonexistent/macrolab.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
