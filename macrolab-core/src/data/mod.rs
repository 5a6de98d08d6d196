//! Data collection: providers, local CSV import, raw cache, resampling.

pub mod cache;
pub mod circuit_breaker;
pub mod fred;
pub mod http;
pub mod local_csv;
pub mod provider;
pub mod resample;
pub mod synthetic;
pub mod yahoo;

pub use cache::{CacheMeta, CacheStatus, CoverageResult, SeriesCache};
pub use circuit_breaker::CircuitBreaker;
pub use fred::FredProvider;
pub use local_csv::load_local_csv;
pub use provider::{
    CollectProgress, DataError, DataSource, LogProgress, Observation, RawSeries, SeriesProvider,
};
pub use resample::{month_end, resample_monthly, Aggregation};
pub use synthetic::generate_synthetic_series;
pub use yahoo::YahooProvider;
