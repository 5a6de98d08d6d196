//! Lag-feature matrix and the ML baseline forecast.
//!
//! Features are lags `1..=lags` of every column (the target's own lags
//! included). Rows with any missing feature or target are dropped; the last
//! `periods` remaining rows are held out as the test window.

use super::{mean_squared_error, MlModelKind, ModelError};
use crate::dataset::Dataset;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Lagged copies of every column, aligned with the dataset's rows.
#[derive(Debug, Clone, PartialEq)]
pub struct LagFeatures {
    /// `{column}_lag_{k}`, grouped by column then lag.
    pub names: Vec<String>,
    /// One row per dataset row; NaN where the lag reaches before the start.
    pub rows: Vec<Vec<f64>>,
}

pub fn build_lag_features(dataset: &Dataset, lags: usize) -> LagFeatures {
    let names = dataset
        .columns
        .iter()
        .flat_map(|c| (1..=lags).map(move |k| format!("{c}_lag_{k}")))
        .collect();

    let rows = (0..dataset.n_rows())
        .map(|t| {
            dataset
                .values
                .iter()
                .flat_map(|col| (1..=lags).map(move |k| if t >= k { col[t - k] } else { f64::NAN }))
                .collect()
        })
        .collect();

    LagFeatures { names, rows }
}

/// Test-window length: `min(periods, max(3, rows / 6))`.
pub fn test_split_len(n_rows: usize, periods: usize) -> usize {
    periods.min((n_rows / 6).max(3))
}

/// Hold-out predictions of the ML baseline for one target column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlForecast {
    pub target: String,
    pub model: String,
    pub dates: Vec<NaiveDate>,
    pub actual: Vec<f64>,
    pub predicted: Vec<f64>,
    pub mse: f64,
    pub n_train: usize,
}

/// Train on all but the last `periods` complete rows and predict those.
///
/// Fails when there are no more than `periods` complete rows.
pub fn ml_lag_forecast(
    dataset: &Dataset,
    target: &str,
    periods: usize,
    lags: usize,
    kind: MlModelKind,
) -> Result<MlForecast, ModelError> {
    let y = dataset
        .column(target)
        .ok_or_else(|| ModelError::UnknownColumn(target.to_string()))?;
    if periods == 0 {
        return Err(ModelError::InvalidParameter {
            name: "periods".into(),
            reason: "test window must be at least one row".into(),
        });
    }

    let features = build_lag_features(dataset, lags);
    let complete: Vec<usize> = (0..dataset.n_rows())
        .filter(|&t| !y[t].is_nan() && features.rows[t].iter().all(|v| !v.is_nan()))
        .collect();

    if complete.len() <= periods {
        return Err(ModelError::InsufficientData {
            needed: periods,
            got: complete.len(),
        });
    }

    let (train, test) = complete.split_at(complete.len() - periods);
    let x_train: Vec<Vec<f64>> = train.iter().map(|&t| features.rows[t].clone()).collect();
    let y_train: Vec<f64> = train.iter().map(|&t| y[t]).collect();
    let x_test: Vec<Vec<f64>> = test.iter().map(|&t| features.rows[t].clone()).collect();
    let actual: Vec<f64> = test.iter().map(|&t| y[t]).collect();

    let mut model = kind.build();
    model.fit(&x_train, &y_train)?;
    let predicted = model.predict(&x_test)?;
    let mse = mean_squared_error(&actual, &predicted);

    tracing::debug!(
        column = target,
        model = model.name(),
        train = train.len(),
        test = test.len(),
        mse,
        "ml baseline fitted"
    );

    Ok(MlForecast {
        target: target.to_string(),
        model: model.name().to_string(),
        dates: test.iter().map(|&t| dataset.dates[t]).collect(),
        actual,
        predicted,
        mse,
        n_train: train.len(),
    })
}
