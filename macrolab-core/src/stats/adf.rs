//! Augmented Dickey-Fuller unit-root test (constant, no trend).
//!
//! Regression: `Δy_t = α + γ y_{t-1} + Σ_{i=1..p} β_i Δy_{t-i} + ε_t`.
//! The lag order `p` is chosen by AIC over `0..=maxlag` with every candidate
//! fitted on the same sample, then the chosen model is refitted on the
//! longest available sample. The statistic is the t-value of `γ`.
//!
//! p-values use MacKinnon's (1994) response-surface approximation, critical
//! values MacKinnon's (2010) finite-sample polynomials.

use super::linalg::{design_matrix, ols, OlsFit};
use super::StatsError;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

/// Below this many observations no test is run.
pub const MIN_OBSERVATIONS: usize = 10;

// MacKinnon (1994), constant-only regression, one variable.
const TAU_MAX: f64 = 2.74;
const TAU_MIN: f64 = -18.83;
const TAU_STAR: f64 = -1.61;
const SMALL_P: [f64; 3] = [2.1659, 1.4412, 0.038269];
const LARGE_P: [f64; 4] = [1.7339, 0.93202, -0.12745, -0.010368];

// MacKinnon (2010), constant-only regression: c0 + c1/T + c2/T^2 + c3/T^3.
const CRIT_1: [f64; 4] = [-3.43035, -6.5393, -16.786, -79.433];
const CRIT_5: [f64; 4] = [-2.86154, -2.8903, -4.234, -40.040];
const CRIT_10: [f64; 4] = [-2.56677, -1.5384, -2.809, 0.0];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriticalValues {
    #[serde(rename = "1%")]
    pub one_pct: f64,
    #[serde(rename = "5%")]
    pub five_pct: f64,
    #[serde(rename = "10%")]
    pub ten_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdfResult {
    pub statistic: f64,
    pub pvalue: f64,
    pub used_lag: usize,
    /// Observations in the final regression.
    pub nobs: usize,
    pub critical_values: CriticalValues,
    /// Best AIC found during lag selection.
    pub ic_best: f64,
}

impl AdfResult {
    /// Unit root rejected at the given significance level.
    pub fn is_stationary(&self, alpha: f64) -> bool {
        self.pvalue < alpha
    }
}

/// Default maximum lag: `ceil(12 * (n/100)^(1/4))`, capped at `n/2 - 2`.
pub fn default_max_lag(n: usize) -> usize {
    let schwert = (12.0 * (n as f64 / 100.0).powf(0.25)).ceil() as usize;
    schwert.min((n / 2).saturating_sub(2))
}

/// Run the ADF test on `series`, ignoring NaN entries.
pub fn adf_test(series: &[f64]) -> Result<AdfResult, StatsError> {
    let x: Vec<f64> = series.iter().copied().filter(|v| !v.is_nan()).collect();
    if x.len() < MIN_OBSERVATIONS {
        return Err(StatsError::InsufficientData {
            needed: MIN_OBSERVATIONS,
            got: x.len(),
        });
    }

    let maxlag = default_max_lag(x.len());
    let dx: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();

    // Lag search on the common sample trimmed by maxlag
    let mut best: Option<(usize, f64)> = None;
    for lag in 0..=maxlag {
        let fit = fit_adf_regression(&x, &dx, maxlag, lag)?;
        let aic = fit.aic();
        if best.is_none_or(|(_, b)| aic < b) {
            best = Some((lag, aic));
        }
    }
    let (used_lag, ic_best) =
        best.ok_or_else(|| StatsError::InvalidParameter("no candidate lag".into()))?;

    let fit = fit_adf_regression(&x, &dx, used_lag, used_lag)?;
    let statistic = fit
        .t_value(1)
        .ok_or_else(|| StatsError::Singular("degenerate ADF regression".into()))?;

    Ok(AdfResult {
        statistic,
        pvalue: mackinnon_pvalue(statistic),
        used_lag,
        nobs: fit.nobs,
        critical_values: critical_values(fit.nobs),
        ic_best,
    })
}

/// Fit the ADF regression with `lag` difference terms, dropping the first
/// `trim` differences so that candidates share one sample.
///
/// Columns: constant, level `y_{t-1}`, then `Δy_{t-1} .. Δy_{t-lag}`.
fn fit_adf_regression(x: &[f64], dx: &[f64], trim: usize, lag: usize) -> Result<OlsFit, StatsError> {
    let rows: Vec<Vec<f64>> = (trim..dx.len())
        .map(|t| {
            let mut row = Vec::with_capacity(lag + 1);
            row.push(x[t]);
            row.extend((1..=lag).map(|i| dx[t - i]));
            row
        })
        .collect();
    let y = DVector::from_iterator(dx.len() - trim, dx[trim..].iter().copied());
    ols(&design_matrix(&rows, true), &y)
}

/// Approximate p-value for the constant-only ADF statistic.
pub fn mackinnon_pvalue(stat: f64) -> f64 {
    if stat > TAU_MAX {
        return 1.0;
    }
    if stat < TAU_MIN {
        return 0.0;
    }
    let z = if stat <= TAU_STAR {
        polyval(&SMALL_P, stat)
    } else {
        polyval(&LARGE_P, stat)
    };
    std_normal_cdf(z)
}

/// Finite-sample critical values for `nobs` observations.
pub fn critical_values(nobs: usize) -> CriticalValues {
    let inv = 1.0 / nobs as f64;
    CriticalValues {
        one_pct: polyval(&CRIT_1, inv),
        five_pct: polyval(&CRIT_5, inv),
        ten_pct: polyval(&CRIT_10, inv),
    }
}

/// `c[0] + c[1] x + c[2] x^2 + ...`
fn polyval(coefs: &[f64], x: f64) -> f64 {
    coefs.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

pub(crate) fn std_normal_cdf(z: f64) -> f64 {
    match Normal::new(0.0, 1.0) {
        Ok(n) => n.cdf(z),
        Err(_) => f64::NAN,
    }
}
