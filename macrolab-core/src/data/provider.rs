//! Series provider trait and structured error types.
//!
//! The SeriesProvider trait abstracts over data sources (Yahoo Finance, FRED)
//! so the collector can swap implementations and tests can mock them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single dated value from a provider (before resampling).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: f64,
}

impl Observation {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

/// Structured error types for data operations.
///
/// These are designed to be displayable in log lines and CLI output.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("series not found: {series}")]
    SeriesNotFound { series: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("csv error in {file}: {reason}")]
    CsvError { file: String, reason: String },

    #[error("no cached data for indicator '{name}' (run `download` first)")]
    NoCachedData { name: String },

    #[error("data error: {0}")]
    Other(String),
}

/// Where a series came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    YahooFinance,
    Fred,
    CsvImport,
    Cache,
    Synthetic,
}

/// A named series as returned by a provider or loader.
#[derive(Debug, Clone)]
pub struct RawSeries {
    pub name: String,
    pub observations: Vec<Observation>,
    pub source: DataSource,
}

impl RawSeries {
    pub fn new(name: impl Into<String>, observations: Vec<Observation>, source: DataSource) -> Self {
        Self {
            name: name.into(),
            observations,
            source,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }
}

/// Trait for remote series providers (Yahoo Finance, FRED).
///
/// Implementations return raw observations at the provider's native
/// frequency; monthly resampling happens in the collector. The cache sits
/// above this trait.
pub trait SeriesProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch observations for a provider-specific key over a date range.
    fn fetch(&self, key: &str, start: NaiveDate, end: NaiveDate) -> Result<RawSeries, DataError>;

    /// Check if the provider is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool;
}

/// Progress callback for multi-indicator operations.
pub trait CollectProgress {
    /// Called when starting to load an indicator.
    fn on_start(&self, name: &str, index: usize, total: usize);

    /// Called when an indicator finishes, successfully or not.
    fn on_complete(&self, name: &str, index: usize, total: usize, result: &Result<(), DataError>);

    /// Called when the entire batch is done.
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Progress reporter that emits tracing events.
pub struct LogProgress;

impl CollectProgress for LogProgress {
    fn on_start(&self, name: &str, index: usize, total: usize) {
        tracing::info!(indicator = name, "[{}/{}] loading", index + 1, total);
    }

    fn on_complete(&self, name: &str, _index: usize, _total: usize, result: &Result<(), DataError>) {
        match result {
            Ok(()) => tracing::debug!(indicator = name, "loaded"),
            Err(e) => tracing::warn!(indicator = name, error = %e, "failed to load indicator"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        tracing::info!(succeeded, failed, total, "collection complete");
    }
}
