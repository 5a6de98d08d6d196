//! Ordinary least squares regressor with intercept.
//!
//! Solved by SVD, which also gives the minimum-norm solution when features
//! are collinear or outnumber rows.

use super::{check_training_data, ModelError, Regressor};
use crate::stats::linalg::design_matrix;
use nalgebra::DVector;

const SVD_EPS: f64 = 1e-10;

#[derive(Debug, Clone, Default)]
pub struct LinearRegression {
    intercept: f64,
    coefficients: Option<Vec<f64>>,
}

impl LinearRegression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn coefficients(&self) -> Option<&[f64]> {
        self.coefficients.as_deref()
    }
}

impl Regressor for LinearRegression {
    fn name(&self) -> &str {
        "linear_regression"
    }

    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), ModelError> {
        check_training_data(x, y)?;

        let design = design_matrix(x, true);
        let target = DVector::from_column_slice(y);
        let beta = design
            .svd(true, true)
            .solve(&target, SVD_EPS)
            .map_err(|e| ModelError::FitFailed(e.to_string()))?;

        if beta.iter().any(|b| !b.is_finite()) {
            return Err(ModelError::FitFailed("non-finite coefficients".into()));
        }

        self.intercept = beta[0];
        self.coefficients = Some(beta.iter().skip(1).copied().collect());
        Ok(())
    }

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        let coefs = self.coefficients.as_ref().ok_or(ModelError::NotFitted)?;
        x.iter()
            .map(|row| {
                if row.len() != coefs.len() {
                    return Err(ModelError::FeatureMismatch {
                        expected: coefs.len(),
                        got: row.len(),
                    });
                }
                Ok(self.intercept + row.iter().zip(coefs).map(|(a, b)| a * b).sum::<f64>())
            })
            .collect()
    }
}
