//! Indicator collection for the runner.
//!
//! For each configured indicator, resolves data in this order:
//! 1. Local CSV sources are read straight from the raw directory
//! 2. Remote sources use the cache when it covers the requested range
//!    (`--offline` accepts any cached copy, `--force` skips the cache)
//! 3. Otherwise the provider is asked, and a successful download is cached
//! 4. With `--synthetic`, a deterministic series stands in (tagged)
//!
//! An indicator that fails every step is logged and left out. The run only
//! fails when no indicator produced data.

use chrono::NaiveDate;
use macrolab_core::data::resample::{resample_monthly, Aggregation};
use macrolab_core::data::{
    generate_synthetic_series, load_local_csv, CollectProgress, CoverageResult, DataError,
    DataSource, RawSeries, SeriesCache, SeriesProvider,
};
use macrolab_core::Dataset;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::config::{IndicatorSpec, SourceSpec};

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("no indicator produced data ({attempted} attempted)")]
    NoData { attempted: usize },

    #[error("data error: {0}")]
    Data(#[from] DataError),
}

/// Options controlling how indicators are loaded.
#[derive(Debug, Clone)]
pub struct CollectOptions {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Never make network requests.
    pub offline: bool,
    /// Generate synthetic series when real data is unavailable.
    pub synthetic: bool,
    /// Re-download even if cached.
    pub force: bool,
}

/// Remote providers available to the collector. Either may be absent.
#[derive(Default, Clone, Copy)]
pub struct Providers<'a> {
    pub yahoo: Option<&'a dyn SeriesProvider>,
    pub fred: Option<&'a dyn SeriesProvider>,
}

/// Outcome of collecting every indicator.
#[derive(Debug)]
pub struct CollectedData {
    /// Outer join of every loaded series, in configuration order.
    pub dataset: Dataset,
    /// Source per loaded indicator.
    pub sources: BTreeMap<String, DataSource>,
    /// Indicators that could not be loaded, with the last error.
    pub failures: Vec<(String, String)>,
    pub has_synthetic: bool,
}

impl CollectedData {
    pub fn loaded(&self) -> usize {
        self.sources.len()
    }
}

/// Collect all indicators.
pub fn collect_all(
    indicators: &[IndicatorSpec],
    cache: &SeriesCache,
    providers: Providers<'_>,
    raw_dir: &Path,
    progress: Option<&dyn CollectProgress>,
    opts: &CollectOptions,
) -> Result<CollectedData, CollectError> {
    let total = indicators.len();
    let mut series = Vec::new();
    let mut sources = BTreeMap::new();
    let mut failures = Vec::new();
    let mut has_synthetic = false;

    for (i, spec) in indicators.iter().enumerate() {
        if let Some(p) = progress {
            p.on_start(&spec.name, i, total);
        }

        let result = match load_indicator(spec, cache, providers, raw_dir, opts) {
            Ok(s) => Ok(s),
            Err(e) if opts.synthetic => {
                tracing::warn!(
                    indicator = %spec.name,
                    error = %e,
                    "using synthetic data; results will be tagged as synthetic"
                );
                Ok(generate_synthetic_series(&spec.name, opts.start, opts.end))
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(s) if !s.is_empty() => {
                if let Some(p) = progress {
                    p.on_complete(&spec.name, i, total, &Ok(()));
                }
                has_synthetic |= s.source == DataSource::Synthetic;
                sources.insert(spec.name.clone(), s.source);
                series.push(s);
            }
            Ok(_) => {
                let e = DataError::SeriesNotFound {
                    series: spec.source.key().to_string(),
                };
                failures.push((spec.name.clone(), e.to_string()));
                if let Some(p) = progress {
                    p.on_complete(&spec.name, i, total, &Err(e));
                }
            }
            Err(e) => {
                failures.push((spec.name.clone(), e.to_string()));
                if let Some(p) = progress {
                    p.on_complete(&spec.name, i, total, &Err(e));
                }
            }
        }
    }

    if let Some(p) = progress {
        p.on_batch_complete(series.len(), failures.len(), total);
    }

    if series.is_empty() {
        return Err(CollectError::NoData { attempted: total });
    }

    Ok(CollectedData {
        dataset: Dataset::from_series(&series),
        sources,
        failures,
        has_synthetic,
    })
}

/// Resolve one indicator without the synthetic fallback.
fn load_indicator(
    spec: &IndicatorSpec,
    cache: &SeriesCache,
    providers: Providers<'_>,
    raw_dir: &Path,
    opts: &CollectOptions,
) -> Result<RawSeries, DataError> {
    let provider = match &spec.source {
        SourceSpec::Csv { filename } => {
            return load_local_csv(&raw_dir.join(filename), &spec.name);
        }
        SourceSpec::Yahoo { .. } => providers.yahoo,
        SourceSpec::Fred { .. } => providers.fred,
    };

    if !opts.force {
        match cache.covers_range(&spec.name, spec.source.key(), opts.start, opts.end) {
            CoverageResult::FullyCovered => return cache.load(&spec.name),
            CoverageResult::PartiallyCovered { .. } if opts.offline => {
                tracing::info!(indicator = %spec.name, "offline: using partially cached range");
                return cache.load(&spec.name);
            }
            _ => {}
        }
    }

    if opts.offline {
        return Err(DataError::NoCachedData {
            name: spec.name.clone(),
        });
    }

    let provider = provider.ok_or_else(|| {
        DataError::Other(format!("no provider configured for '{}'", spec.name))
    })?;
    if !provider.is_available() {
        return Err(DataError::Other(format!(
            "{} provider unavailable for '{}'",
            provider.name(),
            spec.name
        )));
    }

    let fetched = provider.fetch(spec.source.key(), opts.start, opts.end)?;
    let monthly = RawSeries::new(
        spec.name.clone(),
        resample_monthly(&fetched.observations, Aggregation::Last),
        fetched.source,
    );

    if let Err(e) = cache.write(&monthly, spec.source.key()) {
        tracing::warn!(indicator = %spec.name, error = %e, "failed to cache downloaded series");
    }
    Ok(monthly)
}

#[cfg(test)]
mod tests {
    use super::*;
    use macrolab_core::data::Observation;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn opts() -> CollectOptions {
        CollectOptions {
            start: d(2024, 1, 1),
            end: d(2024, 3, 31),
            offline: false,
            synthetic: false,
            force: false,
        }
    }

    /// Returns a few daily observations per key and counts calls.
    struct StubProvider {
        calls: AtomicUsize,
        fail: bool,
    }

    impl StubProvider {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    impl SeriesProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        fn fetch(&self, key: &str, _start: NaiveDate, _end: NaiveDate) -> Result<RawSeries, DataError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if self.fail {
                return Err(DataError::NetworkUnreachable("stub offline".into()));
            }
            let observations = vec![
                Observation::new(d(2024, 1, 2), 10.0),
                Observation::new(d(2024, 1, 30), 11.0),
                Observation::new(d(2024, 2, 28), 12.0),
                Observation::new(d(2024, 3, 28), 13.0),
            ];
            Ok(RawSeries::new(key, observations, DataSource::YahooFinance))
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    #[test]
    fn download_is_renamed_resampled_and_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SeriesCache::new(dir.path());
        let stub = StubProvider::new(false);
        let providers = Providers {
            yahoo: Some(&stub),
            fred: None,
        };
        let specs = [IndicatorSpec::yahoo("SP500", "^GSPC")];

        let got = collect_all(&specs, &cache, providers, dir.path(), None, &opts()).unwrap();
        assert_eq!(got.dataset.columns, vec!["SP500"]);
        assert_eq!(got.dataset.dates, vec![d(2024, 1, 31), d(2024, 2, 29), d(2024, 3, 31)]);
        assert_eq!(got.dataset.column("SP500").unwrap(), &[11.0, 12.0, 13.0]);
        assert_eq!(got.sources["SP500"], DataSource::YahooFinance);

        // Second run is served from the cache
        let again = collect_all(&specs, &cache, providers, dir.path(), None, &opts()).unwrap();
        assert_eq!(again.sources["SP500"], DataSource::Cache);
        assert_eq!(stub.calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn force_bypasses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SeriesCache::new(dir.path());
        let stub = StubProvider::new(false);
        let providers = Providers {
            yahoo: Some(&stub),
            fred: None,
        };
        let specs = [IndicatorSpec::yahoo("SP500", "^GSPC")];
        let mut o = opts();
        o.force = true;

        collect_all(&specs, &cache, providers, dir.path(), None, &o).unwrap();
        collect_all(&specs, &cache, providers, dir.path(), None, &o).unwrap();
        assert_eq!(stub.calls.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn changed_ticker_is_not_served_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SeriesCache::new(dir.path());
        let stub = StubProvider::new(false);
        let providers = Providers {
            yahoo: Some(&stub),
            fred: None,
        };

        let before = [IndicatorSpec::yahoo("VIX", "^VIX")];
        collect_all(&before, &cache, providers, dir.path(), None, &opts()).unwrap();
        assert_eq!(stub.calls.load(Ordering::Relaxed), 1);

        // Offline, a cache written for another ticker is not reused
        let after = [IndicatorSpec::yahoo("VIX", "^VIX3M")];
        let mut offline = opts();
        offline.offline = true;
        let err = collect_all(&after, &cache, providers, dir.path(), None, &offline).unwrap_err();
        assert!(matches!(err, CollectError::NoData { attempted: 1 }));

        // Online, the new ticker is fetched and the cache re-keyed
        let got = collect_all(&after, &cache, providers, dir.path(), None, &opts()).unwrap();
        assert_eq!(got.sources["VIX"], DataSource::YahooFinance);
        assert_eq!(stub.calls.load(Ordering::Relaxed), 2);
        assert_eq!(cache.get_meta("VIX").unwrap().source_key.as_deref(), Some("^VIX3M"));
    }

    #[test]
    fn failed_indicator_is_omitted() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SeriesCache::new(dir.path());
        let good = StubProvider::new(false);
        let bad = StubProvider::new(true);
        let providers = Providers {
            yahoo: Some(&good),
            fred: Some(&bad),
        };
        let specs = [
            IndicatorSpec::yahoo("SP500", "^GSPC"),
            IndicatorSpec {
                name: "CPI".into(),
                source: SourceSpec::Fred {
                    series_id: "CPIAUCSL".into(),
                },
            },
        ];

        let got = collect_all(&specs, &cache, providers, dir.path(), None, &opts()).unwrap();
        assert_eq!(got.dataset.columns, vec!["SP500"]);
        assert_eq!(got.failures.len(), 1);
        assert_eq!(got.failures[0].0, "CPI");
    }

    #[test]
    fn offline_without_cache_is_fatal_unless_synthetic() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SeriesCache::new(dir.path());
        let specs = [IndicatorSpec::yahoo("VIX", "^VIX")];
        let mut o = opts();
        o.offline = true;

        let err = collect_all(&specs, &cache, Providers::default(), dir.path(), None, &o).unwrap_err();
        assert!(matches!(err, CollectError::NoData { attempted: 1 }));

        o.synthetic = true;
        let got = collect_all(&specs, &cache, Providers::default(), dir.path(), None, &o).unwrap();
        assert!(got.has_synthetic);
        assert_eq!(got.sources["VIX"], DataSource::Synthetic);
        assert_eq!(got.dataset.n_rows(), 3);
    }

    #[test]
    fn csv_source_reads_raw_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("housing.csv"),
            "Date,Starts\n2024-01-05,1.0\n2024-01-20,3.0\n2024-02-10,5.0\n",
        )
        .unwrap();
        let cache = SeriesCache::new(dir.path());
        let specs = [IndicatorSpec {
            name: "HOUSING".into(),
            source: SourceSpec::Csv {
                filename: "housing.csv".into(),
            },
        }];
        let mut o = opts();
        o.offline = true;

        let got = collect_all(&specs, &cache, Providers::default(), dir.path(), None, &o).unwrap();
        assert_eq!(got.sources["HOUSING"], DataSource::CsvImport);
        assert_eq!(got.dataset.column("HOUSING").unwrap(), &[2.0, 5.0]);
    }
}
