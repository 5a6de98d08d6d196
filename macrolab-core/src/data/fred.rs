//! FRED (Federal Reserve Economic Data) provider.
//!
//! Requires an API key. The key is looked up in an environment variable at
//! construction; without one the provider still builds but every fetch
//! returns `AuthenticationRequired`, so the collector skips FRED indicators
//! with a warning instead of failing the run.

use super::circuit_breaker::CircuitBreaker;
use super::http::{build_client, get_json_with_retry, RetryPolicy};
use super::provider::{DataError, DataSource, Observation, RawSeries, SeriesProvider};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;

/// Default environment variable holding the FRED API key.
pub const DEFAULT_API_KEY_VAR: &str = "FRED_API_KEY";

const OBSERVATIONS_ENDPOINT: &str = "https://api.stlouisfed.org/fred/series/observations";

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    observations: Vec<FredObservation>,
}

#[derive(Debug, Deserialize)]
struct FredObservation {
    date: String,
    value: String,
}

pub struct FredProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    policy: RetryPolicy,
    api_key: Option<String>,
}

impl FredProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>, api_key: Option<String>) -> Result<Self, DataError> {
        Ok(Self {
            client: build_client()?,
            circuit_breaker,
            policy: RetryPolicy::default(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    /// Build a provider whose key comes from the named environment variable.
    pub fn from_env(circuit_breaker: Arc<CircuitBreaker>, var: &str) -> Result<Self, DataError> {
        Self::new(circuit_breaker, std::env::var(var).ok())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn observations_url(
        api_key: &str,
        series_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<reqwest::Url, DataError> {
        let start = start.format("%Y-%m-%d").to_string();
        let end = end.format("%Y-%m-%d").to_string();
        reqwest::Url::parse_with_params(
            OBSERVATIONS_ENDPOINT,
            &[
                ("series_id", series_id),
                ("api_key", api_key),
                ("file_type", "json"),
                ("observation_start", start.as_str()),
                ("observation_end", end.as_str()),
            ],
        )
        .map_err(|e| DataError::Other(format!("bad FRED url for {series_id}: {e}")))
    }

    /// FRED reports missing values as "." which are dropped here.
    fn parse_response(series_id: &str, resp: ObservationsResponse) -> Result<Vec<Observation>, DataError> {
        let mut observations = Vec::with_capacity(resp.observations.len());
        for obs in resp.observations {
            let date = NaiveDate::parse_from_str(&obs.date, "%Y-%m-%d").map_err(|e| {
                DataError::ResponseFormatChanged(format!("bad FRED date '{}': {e}", obs.date))
            })?;
            if let Ok(value) = obs.value.trim().parse::<f64>() {
                if value.is_finite() {
                    observations.push(Observation::new(date, value));
                }
            }
        }

        if observations.is_empty() {
            return Err(DataError::SeriesNotFound {
                series: series_id.to_string(),
            });
        }
        Ok(observations)
    }
}

impl SeriesProvider for FredProvider {
    fn name(&self) -> &str {
        "fred"
    }

    fn fetch(&self, series_id: &str, start: NaiveDate, end: NaiveDate) -> Result<RawSeries, DataError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            DataError::AuthenticationRequired(format!("no FRED API key, skipping {series_id}"))
        })?;
        let url = Self::observations_url(api_key, series_id, start, end)?;
        let resp: ObservationsResponse =
            get_json_with_retry(&self.client, &self.circuit_breaker, self.policy, url.as_str(), series_id)?;
        let observations = Self::parse_response(series_id, resp)?;
        Ok(RawSeries::new(series_id, observations, DataSource::Fred))
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some() && self.circuit_breaker.is_allowed()
    }
}
