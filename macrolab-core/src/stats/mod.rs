//! Statistical testing: stationarity, causality, correlation, decomposition.

pub mod adf;
pub mod decompose;
pub mod descriptive;
pub mod granger;
pub mod linalg;

use thiserror::Error;

pub use adf::{adf_test, AdfResult, CriticalValues};
pub use decompose::{seasonal_decompose, Decomposition};
pub use descriptive::{correlation_matrix, CorrelationMatrix};
pub use granger::{granger_all_pairs, granger_causality, GrangerLag, GrangerResult};

/// Errors from statistical routines.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StatsError {
    #[error("insufficient data: need at least {needed} observations, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("series contains missing values")]
    MissingValues,

    #[error("singular design matrix: {0}")]
    Singular(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}
