//! Descriptive statistics and the Pearson correlation matrix.
//!
//! Functions return NaN rather than erroring when a statistic is undefined
//! (too few points, zero variance), so callers can decide how to treat it.

use serde::{Deserialize, Serialize};

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator).
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// First differences; one element shorter than the input.
pub fn diff(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Non-NaN values, in order.
pub fn finite(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| !v.is_nan()).collect()
}

/// Pearson correlation over the positions where both inputs are present.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter(|(a, b)| !a.is_nan() && !b.is_nan())
        .map(|(a, b)| (*a, *b))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }

    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in &pairs {
        sxy += (a - mx) * (b - my);
        sxx += (a - mx).powi(2);
        syy += (b - my).powi(2);
    }
    let denom = (sxx * syy).sqrt();
    if denom == 0.0 {
        return f64::NAN;
    }
    (sxy / denom).clamp(-1.0, 1.0)
}

/// Autocorrelation at `lag`: Pearson correlation of the series with itself
/// shifted by `lag`.
pub fn autocorr(values: &[f64], lag: usize) -> f64 {
    if lag == 0 {
        return pearson(values, values);
    }
    if values.len() <= lag {
        return f64::NAN;
    }
    pearson(&values[lag..], &values[..values.len() - lag])
}

/// Symmetric Pearson correlation matrix over named columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub names: Vec<String>,
    /// Row-major, `names.len()` squared entries.
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.names.iter().position(|n| n == a)?;
        let j = self.names.iter().position(|n| n == b)?;
        Some(self.values[i][j])
    }

    /// Every unordered pair of distinct columns with a defined coefficient.
    pub fn pairs(&self) -> Vec<(String, String, f64)> {
        let mut out = Vec::new();
        for i in 0..self.names.len() {
            for j in (i + 1)..self.names.len() {
                let r = self.values[i][j];
                if !r.is_nan() {
                    out.push((self.names[i].clone(), self.names[j].clone(), r));
                }
            }
        }
        out
    }
}

/// Pairwise-complete Pearson correlation between every pair of columns.
pub fn correlation_matrix<'a>(columns: impl IntoIterator<Item = (&'a str, &'a [f64])>) -> CorrelationMatrix {
    let columns: Vec<(&str, &[f64])> = columns.into_iter().collect();
    let n = columns.len();
    let mut values = vec![vec![f64::NAN; n]; n];
    for i in 0..n {
        for j in i..n {
            let r = pearson(columns[i].1, columns[j].1);
            values[i][j] = r;
            values[j][i] = r;
        }
    }
    CorrelationMatrix {
        names: columns.iter().map(|(name, _)| name.to_string()).collect(),
        values,
    }
}
