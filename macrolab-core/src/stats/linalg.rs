//! Ordinary least squares on top of nalgebra.

use super::StatsError;
use nalgebra::{DMatrix, DVector};

const SVD_EPS: f64 = 1e-12;

/// Result of an OLS fit.
#[derive(Debug, Clone)]
pub struct OlsFit {
    pub params: DVector<f64>,
    pub residuals: DVector<f64>,
    /// Sum of squared residuals.
    pub ssr: f64,
    pub nobs: usize,
    /// Number of regressors (columns of the design matrix).
    pub k: usize,
    /// Standard errors of `params`, `None` when X'X is singular.
    pub std_errors: Option<DVector<f64>>,
}

impl OlsFit {
    /// Gaussian log-likelihood at the ML variance estimate `ssr / n`.
    pub fn log_likelihood(&self) -> f64 {
        let n = self.nobs as f64;
        -n / 2.0 * ((2.0 * std::f64::consts::PI * self.ssr / n).ln() + 1.0)
    }

    /// Akaike information criterion, `-2 llf + 2 k`.
    pub fn aic(&self) -> f64 {
        -2.0 * self.log_likelihood() + 2.0 * self.k as f64
    }

    /// t-statistic of parameter `i`.
    pub fn t_value(&self, i: usize) -> Option<f64> {
        let se = self.std_errors.as_ref()?.get(i).copied()?;
        if se > 0.0 && se.is_finite() {
            Some(self.params[i] / se)
        } else {
            None
        }
    }
}

/// Least-squares fit of `y` on the columns of `x` via SVD.
pub fn ols(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<OlsFit, StatsError> {
    let (n, k) = x.shape();
    if n != y.len() {
        return Err(StatsError::InvalidParameter(format!(
            "design has {n} rows but response has {}",
            y.len()
        )));
    }
    if n <= k {
        return Err(StatsError::InsufficientData { needed: k + 1, got: n });
    }

    let params = x
        .clone()
        .svd(true, true)
        .solve(y, SVD_EPS)
        .map_err(|e| StatsError::Singular(e.to_string()))?;

    let residuals = y - x * &params;
    let ssr = residuals.norm_squared();

    let sigma2 = ssr / (n - k) as f64;
    let std_errors = (x.transpose() * x)
        .try_inverse()
        .map(|inv| DVector::from_iterator(k, (0..k).map(|i| (sigma2 * inv[(i, i)]).max(0.0).sqrt())));

    Ok(OlsFit {
        params,
        residuals,
        ssr,
        nobs: n,
        k,
        std_errors,
    })
}

/// Build a design matrix from row vectors, optionally prepending a constant.
pub fn design_matrix(rows: &[Vec<f64>], add_constant: bool) -> DMatrix<f64> {
    let width = rows.first().map_or(0, Vec::len) + usize::from(add_constant);
    DMatrix::from_fn(rows.len(), width, |r, c| {
        if add_constant {
            if c == 0 {
                1.0
            } else {
                rows[r][c - 1]
            }
        } else {
            rows[r][c]
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_exact_linear_relation() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![f64::from(i)]).collect();
        let y = DVector::from_iterator(10, (0..10).map(|i| 3.0 + 2.0 * f64::from(i)));
        let fit = ols(&design_matrix(&rows, true), &y).unwrap();

        assert!((fit.params[0] - 3.0).abs() < 1e-9);
        assert!((fit.params[1] - 2.0).abs() < 1e-9);
        assert!(fit.ssr < 1e-18);
    }

    #[test]
    fn t_value_is_large_for_strong_slope() {
        let rows: Vec<Vec<f64>> = (0..30).map(|i| vec![f64::from(i)]).collect();
        let noise = [0.1, -0.2, 0.15, -0.05, 0.0, 0.2];
        let y = DVector::from_iterator(
            30,
            (0..30).map(|i| 1.0 + 0.5 * f64::from(i) + noise[i as usize % noise.len()]),
        );
        let fit = ols(&design_matrix(&rows, true), &y).unwrap();
        assert!(fit.t_value(1).unwrap() > 50.0);
        assert!(fit.aic().is_finite());
    }

    #[test]
    fn too_few_rows_is_an_error() {
        let x = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 1.0, 1.0]);
        let y = DVector::from_vec(vec![1.0, 2.0]);
        assert!(matches!(ols(&x, &y), Err(StatsError::InsufficientData { .. })));
    }
}
