//! Granger causality via nested OLS regressions.
//!
//! For each lag `L` in `1..=maxlag`:
//! - restricted:   `y_t ~ 1 + y_{t-1..t-L}`
//! - unrestricted: `y_t ~ 1 + y_{t-1..t-L} + x_{t-1..t-L}`
//!
//! Each lag is fitted on its own sample (the first `L` rows are dropped).
//! The headline p-value of a pair is the minimum SSR chi-square p-value
//! over all lags.

use super::linalg::{design_matrix, ols};
use super::StatsError;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor};

pub const DEFAULT_MAX_LAG: usize = 4;

/// Test statistics for one lag order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrangerLag {
    pub lag: usize,
    pub ssr_chi2: f64,
    pub chi2_pvalue: f64,
    pub ssr_f: f64,
    pub f_pvalue: f64,
}

/// Result for an ordered pair: does `cause` help predict `effect`?
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrangerResult {
    pub cause: String,
    pub effect: String,
    /// Minimum chi-square p-value over lags; `None` when the test failed.
    pub pvalue: Option<f64>,
    pub lags: Vec<GrangerLag>,
}

impl GrangerResult {
    /// Pair label in `cause -> effect` form.
    pub fn label(&self) -> String {
        format!("{} -> {}", self.cause, self.effect)
    }
}

/// Test whether `x` Granger-causes `y` for lags `1..=maxlag`.
///
/// Rows where either series is NaN are dropped first. Needs more than
/// `3 * maxlag + 1` complete rows.
pub fn granger_causality(y: &[f64], x: &[f64], maxlag: usize) -> Result<Vec<GrangerLag>, StatsError> {
    if maxlag == 0 {
        return Err(StatsError::InvalidParameter("maxlag must be at least 1".into()));
    }
    let (y, x): (Vec<f64>, Vec<f64>) = y
        .iter()
        .zip(x)
        .filter(|(a, b)| !a.is_nan() && !b.is_nan())
        .map(|(a, b)| (*a, *b))
        .unzip();

    let needed = 3 * maxlag + 2;
    if y.len() < needed {
        return Err(StatsError::InsufficientData { needed, got: y.len() });
    }

    (1..=maxlag).map(|lag| test_lag(&y, &x, lag)).collect()
}

fn test_lag(y: &[f64], x: &[f64], lag: usize) -> Result<GrangerLag, StatsError> {
    let n = y.len() - lag;
    let target = DVector::from_iterator(n, y[lag..].iter().copied());

    let own: Vec<Vec<f64>> = (lag..y.len())
        .map(|t| (1..=lag).map(|i| y[t - i]).collect())
        .collect();
    let joint: Vec<Vec<f64>> = own
        .iter()
        .zip(lag..y.len())
        .map(|(row, t)| {
            let mut r = row.clone();
            r.extend((1..=lag).map(|i| x[t - i]));
            r
        })
        .collect();

    let restricted = ols(&design_matrix(&own, true), &target)?;
    let unrestricted = ols(&design_matrix(&joint, true), &target)?;

    let ssr_r = restricted.ssr;
    let ssr_u = unrestricted.ssr;
    if ssr_u <= f64::EPSILON {
        return Err(StatsError::Singular(format!("perfect fit at lag {lag}")));
    }

    let df_resid = (n - unrestricted.k) as f64;
    let ssr_chi2 = n as f64 * (ssr_r - ssr_u) / ssr_u;
    let ssr_f = ((ssr_r - ssr_u) / lag as f64) / (ssr_u / df_resid);

    let chi2 = ChiSquared::new(lag as f64).map_err(|e| StatsError::InvalidParameter(e.to_string()))?;
    let f = FisherSnedecor::new(lag as f64, df_resid)
        .map_err(|e| StatsError::InvalidParameter(e.to_string()))?;

    Ok(GrangerLag {
        lag,
        ssr_chi2,
        chi2_pvalue: (1.0 - chi2.cdf(ssr_chi2.max(0.0))).clamp(0.0, 1.0),
        ssr_f,
        f_pvalue: (1.0 - f.cdf(ssr_f.max(0.0))).clamp(0.0, 1.0),
    })
}

/// Run the test for every ordered pair of distinct columns.
///
/// Failing pairs are kept with `pvalue: None` and logged at debug level.
pub fn granger_all_pairs<'a>(
    columns: impl IntoIterator<Item = (&'a str, &'a [f64])>,
    maxlag: usize,
) -> Vec<GrangerResult> {
    let columns: Vec<(&str, &[f64])> = columns.into_iter().collect();
    let mut results = Vec::new();

    for (effect, y) in &columns {
        for (cause, x) in &columns {
            if cause == effect {
                continue;
            }
            let (pvalue, lags) = match granger_causality(y, x, maxlag) {
                Ok(lags) => {
                    let p = lags.iter().map(|l| l.chi2_pvalue).fold(f64::INFINITY, f64::min);
                    (p.is_finite().then_some(p), lags)
                }
                Err(e) => {
                    tracing::debug!(cause = *cause, effect = *effect, error = %e, "granger test failed");
                    (None, Vec::new())
                }
            };
            results.push(GrangerResult {
                cause: cause.to_string(),
                effect: effect.to_string(),
                pvalue,
                lags,
            });
        }
    }

    results
}
