//! Yahoo Finance provider.
//!
//! Fetches daily closes from Yahoo's v8 chart API. The adjusted close is
//! used when it is present for every bar; otherwise the whole response uses
//! the raw close (indices, futures and FX tickers such as `^TNX`, `CL=F`,
//! `DX-Y.NYB` often lack adjustments).
//!
//! Yahoo Finance has no official API and is subject to unannounced format
//! changes. The local CSV path is the fallback when Yahoo is unavailable.

use super::circuit_breaker::CircuitBreaker;
use super::http::{build_client, get_json_with_retry, RetryPolicy};
use super::provider::{DataError, DataSource, Observation, RawSeries, SeriesProvider};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

/// Yahoo Finance chart-API provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    policy: RetryPolicy,
}

impl YahooProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        Ok(Self {
            client: build_client()?,
            circuit_breaker,
            policy: RetryPolicy::default(),
        })
    }

    /// Build the chart API URL for a ticker and date range.
    fn chart_url(ticker: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        let end_ts = end
            .and_hms_opt(23, 59, 59)
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or(start_ts);
        format!(
            "https://query2.finance.yahoo.com/v8/finance/chart/{}\
             ?period1={start_ts}&period2={end_ts}&interval=1d\
             &includeAdjustedClose=true",
            encode_ticker(ticker)
        )
    }

    /// Parse the chart response into daily observations.
    fn parse_response(ticker: &str, resp: ChartResponse) -> Result<Vec<Observation>, DataError> {
        let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) if err.code == "Not Found" => DataError::SeriesNotFound {
                series: ticker.to_string(),
            },
            Some(err) => {
                DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
            }
            None => DataError::ResponseFormatChanged("empty result with no error".into()),
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

        let timestamps = data
            .timestamp
            .ok_or_else(|| DataError::ResponseFormatChanged("no timestamps".into()))?;

        let closes = data
            .indicators
            .quote
            .into_iter()
            .next()
            .map(|q| q.close)
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

        // One basis per response: adjusted closes only when they cover every
        // bar that has a close, otherwise raw closes throughout.
        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose)
            .filter(|adj| adjclose_is_complete(adj, &closes));
        if adj_closes.is_none() {
            tracing::debug!(ticker, "using raw closes");
        }

        let mut observations = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| {
                    DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
                })?;

            let value = match &adj_closes {
                Some(adj) => adj.get(i).copied().flatten(),
                None => closes.get(i).copied().flatten(),
            };

            // Non-trading days come back as nulls
            match value {
                Some(value) if value.is_finite() => observations.push(Observation::new(date, value)),
                _ => continue,
            }
        }

        if observations.is_empty() {
            return Err(DataError::SeriesNotFound {
                series: ticker.to_string(),
            });
        }

        Ok(observations)
    }
}

fn adjclose_is_complete(adj: &[Option<f64>], closes: &[Option<f64>]) -> bool {
    closes.iter().enumerate().all(|(i, close)| match close {
        Some(c) if c.is_finite() => adj.get(i).copied().flatten().is_some_and(f64::is_finite),
        _ => true,
    })
}

/// Percent-encode the characters Yahoo tickers use that are not URL-safe.
fn encode_ticker(ticker: &str) -> String {
    let mut out = String::with_capacity(ticker.len() + 4);
    for c in ticker.chars() {
        match c {
            '^' => out.push_str("%5E"),
            '=' => out.push_str("%3D"),
            ' ' => out.push_str("%20"),
            _ => out.push(c),
        }
    }
    out
}

impl SeriesProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<RawSeries, DataError> {
        let url = Self::chart_url(ticker, start, end);
        let chart: ChartResponse =
            get_json_with_retry(&self.client, &self.circuit_breaker, self.policy, &url, ticker)?;
        let observations = Self::parse_response(ticker, chart)?;
        Ok(RawSeries::new(ticker, observations, DataSource::YahooFinance))
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "chart": {
            "result": [{
                "timestamp": [1704205800, 1704292200, 1704378600],
                "indicators": {
                    "quote": [{"close": [4742.8, null, 4688.7]}],
                    "adjclose": [{"adjclose": [4742.8, null, null]}]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn incomplete_adjclose_falls_back_to_close() {
        let resp: ChartResponse = serde_json::from_str(SAMPLE).unwrap();
        let obs = YahooProvider::parse_response("^GSPC", resp).unwrap();

        // Middle row is null in both arrays and is skipped
        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].value, 4742.8);
        assert_eq!(obs[1].value, 4688.7);
        assert_eq!(obs[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }

    #[test]
    fn complete_adjclose_is_used_for_every_bar() {
        let json = r#"{"chart": {"result": [{
            "timestamp": [1704205800, 1704292200, 1704378600],
            "indicators": {
                "quote": [{"close": [100.0, null, 110.0]}],
                "adjclose": [{"adjclose": [95.0, null, 104.5]}]
            }
        }], "error": null}}"#;
        let resp: ChartResponse = serde_json::from_str(json).unwrap();
        let obs = YahooProvider::parse_response("GC=F", resp).unwrap();
        let values: Vec<f64> = obs.iter().map(|o| o.value).collect();
        assert_eq!(values, vec![95.0, 104.5]);
    }

    #[test]
    fn adjusted_and_raw_closes_are_never_mixed() {
        let json = r#"{"chart": {"result": [{
            "timestamp": [1704205800, 1704292200, 1704378600, 1704465000],
            "indicators": {
                "quote": [{"close": [100.0, 102.0, 104.0, 106.0]}],
                "adjclose": [{"adjclose": [50.0, null, 52.0, null]}]
            }
        }], "error": null}}"#;
        let resp: ChartResponse = serde_json::from_str(json).unwrap();
        let obs = YahooProvider::parse_response("CL=F", resp).unwrap();
        let values: Vec<f64> = obs.iter().map(|o| o.value).collect();
        assert_eq!(values, vec![100.0, 102.0, 104.0, 106.0]);
    }

    #[test]
    fn not_found_error_maps_to_series_not_found() {
        let json = r#"{"chart": {"result": null, "error": {"code": "Not Found", "description": "No data found"}}}"#;
        let resp: ChartResponse = serde_json::from_str(json).unwrap();
        let err = YahooProvider::parse_response("NOPE", resp).unwrap_err();
        assert!(matches!(err, DataError::SeriesNotFound { .. }));
    }

    #[test]
    fn url_encodes_special_tickers() {
        let start = NaiveDate::from_ymd_opt(2013, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let url = YahooProvider::chart_url("^GSPC", start, end);
        assert!(url.contains("/chart/%5EGSPC?"));
        assert!(url.contains("interval=1d"));
        assert_eq!(encode_ticker("CL=F"), "CL%3DF");
        assert_eq!(encode_ticker("DX-Y.NYB"), "DX-Y.NYB");
    }
}
