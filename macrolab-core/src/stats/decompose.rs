//! Additive seasonal decomposition by moving averages.
//!
//! trend: centred moving average of length `period` (a 2 x period MA for
//! even periods), with the undefined ends extrapolated linearly from the
//! nearest `period - 1` trend points. seasonal: per-phase means of the
//! detrended series, centred to sum to zero, tiled over the sample.
//! resid: what is left.

use super::StatsError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PERIOD: usize = 12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decomposition {
    pub period: usize,
    pub observed: Vec<f64>,
    pub trend: Vec<f64>,
    pub seasonal: Vec<f64>,
    pub resid: Vec<f64>,
}

/// Decompose `series` as `observed = trend + seasonal + resid`.
///
/// Needs at least two full cycles and no missing values.
pub fn seasonal_decompose(series: &[f64], period: usize) -> Result<Decomposition, StatsError> {
    if period < 2 {
        return Err(StatsError::InvalidParameter(format!("period must be >= 2, got {period}")));
    }
    if series.iter().any(|v| !v.is_finite()) {
        return Err(StatsError::MissingValues);
    }
    let n = series.len();
    if n < 2 * period {
        return Err(StatsError::InsufficientData {
            needed: 2 * period,
            got: n,
        });
    }

    let mut trend = centred_moving_average(series, period);
    extrapolate_ends(&mut trend, period - 1);

    let detrended: Vec<f64> = series.iter().zip(&trend).map(|(x, t)| x - t).collect();

    let mut phase_means: Vec<f64> = (0..period)
        .map(|phase| {
            let vals: Vec<f64> = detrended.iter().skip(phase).step_by(period).copied().collect();
            vals.iter().sum::<f64>() / vals.len() as f64
        })
        .collect();
    let centre = phase_means.iter().sum::<f64>() / period as f64;
    for m in &mut phase_means {
        *m -= centre;
    }

    let seasonal: Vec<f64> = (0..n).map(|t| phase_means[t % period]).collect();
    let resid: Vec<f64> = detrended.iter().zip(&seasonal).map(|(d, s)| d - s).collect();

    Ok(Decomposition {
        period,
        observed: series.to_vec(),
        trend,
        seasonal,
        resid,
    })
}

/// Centred moving average; NaN where the window does not fit.
fn centred_moving_average(x: &[f64], period: usize) -> Vec<f64> {
    let weights: Vec<f64> = if period % 2 == 0 {
        let mut w = vec![1.0 / period as f64; period + 1];
        w[0] = 0.5 / period as f64;
        w[period] = 0.5 / period as f64;
        w
    } else {
        vec![1.0 / period as f64; period]
    };
    let half = weights.len() / 2;

    (0..x.len())
        .map(|t| {
            if t < half || t + half >= x.len() {
                return f64::NAN;
            }
            weights
                .iter()
                .enumerate()
                .map(|(j, w)| w * x[t + j - half])
                .sum()
        })
        .collect()
}

/// Replace leading and trailing NaN with straight-line fits through the
/// first and last `npoints` defined values.
fn extrapolate_ends(trend: &mut [f64], npoints: usize) {
    let (front, back) = match (
        trend.iter().position(|v| !v.is_nan()),
        trend.iter().rposition(|v| !v.is_nan()),
    ) {
        (Some(f), Some(b)) => (f, b),
        _ => return,
    };
    let npoints = npoints.max(2).min(back - front + 1);

    let (k, c) = line_fit(front, &trend[front..front + npoints]);
    for (t, v) in trend.iter_mut().enumerate().take(front) {
        *v = k * t as f64 + c;
    }

    let start = back + 1 - npoints;
    let (k, c) = line_fit(start, &trend[start..=back]);
    for (t, v) in trend.iter_mut().enumerate().skip(back + 1) {
        *v = k * t as f64 + c;
    }
}

/// Least-squares slope and intercept for `ys` observed at `x0, x0+1, ...`.
fn line_fit(x0: usize, ys: &[f64]) -> (f64, f64) {
    let n = ys.len() as f64;
    let xs: Vec<f64> = (0..ys.len()).map(|i| (x0 + i) as f64).collect();
    let mx = xs.iter().sum::<f64>() / n;
    let my = ys.iter().sum::<f64>() / n;
    let sxy: f64 = xs.iter().zip(ys).map(|(x, y)| (x - mx) * (y - my)).sum();
    let sxx: f64 = xs.iter().map(|x| (x - mx).powi(2)).sum();
    let k = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    (k, my - k * mx)
}
