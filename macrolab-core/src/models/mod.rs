//! Forecasting models: SARIMA and the lag-feature ML baseline.
//!
//! The ML baseline is model-agnostic: anything implementing [`Regressor`]
//! can be trained on the lag matrix. Two implementations ship:
//! [`RandomForest`] (bagged CART regression trees) and
//! [`LinearRegression`] (OLS with intercept).

pub mod features;
pub mod forest;
pub mod linear;
pub mod optimize;
pub mod sarima;
pub mod tree;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use features::{build_lag_features, ml_lag_forecast, test_split_len, LagFeatures, MlForecast};
pub use forest::{ForestParams, RandomForest};
pub use linear::LinearRegression;
pub use sarima::{Sarima, SarimaForecast, SarimaOrder};
pub use tree::RegressionTree;

/// Errors from model fitting and prediction.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("not enough data: need more than {needed} rows, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("invalid model parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("model has not been fitted")]
    NotFitted,

    #[error("feature width mismatch: fitted on {expected}, got {got}")]
    FeatureMismatch { expected: usize, got: usize },

    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("fit failed: {0}")]
    FitFailed(String),
}

/// A supervised regressor over dense feature rows.
pub trait Regressor: Send + Sync {
    /// Short name used in logs and reports.
    fn name(&self) -> &str;

    /// Fit on `x` (one row per sample) against targets `y`.
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), ModelError>;

    /// Predict one value per row of `x`.
    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ModelError>;
}

/// Which regressor the ML baseline uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MlModelKind {
    /// Random forest, 200 trees, seed 42.
    #[default]
    #[serde(rename = "rf")]
    RandomForest,
    /// Ordinary least squares.
    #[serde(rename = "lr")]
    LinearRegression,
}

impl MlModelKind {
    /// A fresh, unfitted regressor of this kind.
    pub fn build(self) -> Box<dyn Regressor> {
        match self {
            MlModelKind::RandomForest => Box::new(RandomForest::new(ForestParams::default())),
            MlModelKind::LinearRegression => Box::new(LinearRegression::new()),
        }
    }
}

impl fmt::Display for MlModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlModelKind::RandomForest => write!(f, "rf"),
            MlModelKind::LinearRegression => write!(f, "lr"),
        }
    }
}

/// Validate that `x` and `y` line up and every row has `width` features.
pub(crate) fn check_training_data(x: &[Vec<f64>], y: &[f64]) -> Result<usize, ModelError> {
    if x.is_empty() {
        return Err(ModelError::InsufficientData { needed: 0, got: 0 });
    }
    if x.len() != y.len() {
        return Err(ModelError::InvalidParameter {
            name: "y".into(),
            reason: format!("{} targets for {} rows", y.len(), x.len()),
        });
    }
    let width = x[0].len();
    if let Some(bad) = x.iter().find(|row| row.len() != width) {
        return Err(ModelError::FeatureMismatch {
            expected: width,
            got: bad.len(),
        });
    }
    Ok(width)
}

/// Mean squared error between two equal-length slices.
pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() || actual.len() != predicted.len() {
        return f64::NAN;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / actual.len() as f64
}
