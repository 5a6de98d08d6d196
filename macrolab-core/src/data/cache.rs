//! Parquet cache for raw indicator series.
//!
//! Layout: `{cache_dir}/indicator={NAME}/series.parquet` plus a `meta.json`
//! sidecar holding the date range, observation count, BLAKE3 data hash,
//! source, provider key and cache time. A sidecar whose provider key differs
//! from the requested one counts as not cached.
//!
//! Writes are atomic (write to .tmp, rename into place). A file that fails
//! validation on load is renamed to `series.parquet.quarantined`.

use super::provider::{DataError, DataSource, Observation, RawSeries};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Metadata sidecar for a cached indicator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMeta {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub count: usize,
    pub data_hash: String,
    pub source: DataSource,
    /// Ticker or series id the series was fetched with.
    #[serde(default)]
    pub source_key: Option<String>,
    pub cached_at: chrono::NaiveDateTime,
}

/// How well the cache covers a requested date range.
#[derive(Debug, Clone, PartialEq)]
pub enum CoverageResult {
    NotCached,
    FullyCovered,
    PartiallyCovered {
        cached_start: NaiveDate,
        cached_end: NaiveDate,
    },
}

/// Cache status for a single indicator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatus {
    pub name: String,
    pub cached: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub count: Option<usize>,
}

pub struct SeriesCache {
    cache_dir: PathBuf,
}

impl SeriesCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn indicator_dir(&self, name: &str) -> PathBuf {
        self.cache_dir.join(format!("indicator={name}"))
    }

    fn series_path(&self, name: &str) -> PathBuf {
        self.indicator_dir(name).join("series.parquet")
    }

    fn meta_path(&self, name: &str) -> PathBuf {
        self.indicator_dir(name).join("meta.json")
    }

    /// Write a series fetched under `source_key`, replacing any previous copy.
    pub fn write(&self, series: &RawSeries, source_key: &str) -> Result<(), DataError> {
        let (first, last) = match (series.observations.first(), series.observations.last()) {
            (Some(f), Some(l)) => (f.date, l.date),
            _ => return Err(DataError::CacheError("no observations to cache".into())),
        };

        let dir = self.indicator_dir(&series.name);
        fs::create_dir_all(&dir)
            .map_err(|e| DataError::CacheError(format!("failed to create dir: {e}")))?;

        let df = observations_to_dataframe(&series.observations)?;
        let path = self.series_path(&series.name);
        let tmp_path = path.with_extension("parquet.tmp");
        write_parquet(&df, &tmp_path)?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::CacheError(format!("atomic rename failed: {e}"))
        })?;

        let meta = CacheMeta {
            name: series.name.clone(),
            start_date: first,
            end_date: last,
            count: series.len(),
            data_hash: hash_observations(&series.observations)?,
            source: series.source,
            source_key: Some(source_key.to_string()),
            cached_at: chrono::Local::now().naive_local(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::CacheError(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(&series.name), meta_json)
            .map_err(|e| DataError::CacheError(format!("meta write: {e}")))?;

        Ok(())
    }

    /// Load a cached series, sorted by date ascending.
    pub fn load(&self, name: &str) -> Result<RawSeries, DataError> {
        let path = self.series_path(name);
        if !path.exists() {
            return Err(DataError::NoCachedData {
                name: name.to_string(),
            });
        }

        match load_and_validate_parquet(&path) {
            Ok(mut observations) => {
                observations.sort_by_key(|o| o.date);
                Ok(RawSeries::new(name, observations, DataSource::Cache))
            }
            Err(e) => {
                let quarantine = path.with_extension("parquet.quarantined");
                tracing::warn!(file = %path.display(), error = %e, "quarantining corrupt cache file");
                let _ = fs::rename(&path, &quarantine);
                Err(DataError::NoCachedData {
                    name: name.to_string(),
                })
            }
        }
    }

    pub fn get_meta(&self, name: &str) -> Option<CacheMeta> {
        let content = fs::read_to_string(self.meta_path(name)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Names of every indicator with a cache directory, sorted.
    pub fn cached_names(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(&self.cache_dir)
            .map(|entries| {
                entries
                    .flatten()
                    .filter_map(|e| {
                        e.file_name()
                            .to_string_lossy()
                            .strip_prefix("indicator=")
                            .map(str::to_string)
                    })
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn status(&self, names: &[&str]) -> Vec<CacheStatus> {
        names
            .iter()
            .map(|name| {
                let meta = self.get_meta(name);
                CacheStatus {
                    name: name.to_string(),
                    cached: meta.is_some(),
                    start_date: meta.as_ref().map(|m| m.start_date),
                    end_date: meta.as_ref().map(|m| m.end_date),
                    count: meta.as_ref().map(|m| m.count),
                }
            })
            .collect()
    }

    /// Check whether data cached under `source_key` covers `[start, end]` at
    /// monthly granularity.
    ///
    /// Cached series are month-end stamped, so coverage compares against the
    /// month-ends of the requested bounds.
    pub fn covers_range(
        &self,
        name: &str,
        source_key: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> CoverageResult {
        match self.get_meta(name) {
            None => CoverageResult::NotCached,
            Some(meta) if meta.source_key.as_deref() != Some(source_key) => {
                tracing::info!(
                    indicator = name,
                    cached_key = meta.source_key.as_deref().unwrap_or("-"),
                    wanted_key = source_key,
                    "cached series has a different source key"
                );
                CoverageResult::NotCached
            }
            Some(meta) => {
                let want_start = super::resample::month_end(start);
                let want_end = super::resample::month_end(end);
                if meta.start_date <= want_start && meta.end_date >= want_end {
                    CoverageResult::FullyCovered
                } else {
                    CoverageResult::PartiallyCovered {
                        cached_start: meta.start_date,
                        cached_end: meta.end_date,
                    }
                }
            }
        }
    }
}

/// BLAKE3 hash over the observation dates and values.
fn hash_observations(observations: &[Observation]) -> Result<String, DataError> {
    let bytes = serde_json::to_vec(observations)
        .map_err(|e| DataError::CacheError(format!("hash serialization: {e}")))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn epoch() -> NaiveDate {
    NaiveDate::default()
}

fn observations_to_dataframe(observations: &[Observation]) -> Result<DataFrame, DataError> {
    let days: Vec<i32> = observations
        .iter()
        .map(|o| (o.date - epoch()).num_days() as i32)
        .collect();
    let values: Vec<f64> = observations.iter().map(|o| o.value).collect();

    DataFrame::new(vec![
        Column::new("date".into(), days)
            .cast(&DataType::Date)
            .map_err(|e| DataError::ParquetError(format!("date cast: {e}")))?,
        Column::new("value".into(), values),
    ])
    .map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), DataError> {
    let file =
        fs::File::create(path).map_err(|e| DataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

fn load_and_validate_parquet(path: &Path) -> Result<Vec<Observation>, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(DataError::CacheError("empty parquet file".into()));
    }

    let map_err = |e: PolarsError| DataError::ParquetError(format!("column read: {e}"));
    let dates = df.column("date").map_err(map_err)?;
    let values = df.column("value").map_err(map_err)?;

    let date_ca = dates
        .date()
        .map_err(|e| DataError::ParquetError(format!("date column type: {e}")))?;
    let value_ca = values
        .f64()
        .map_err(|e| DataError::ParquetError(format!("value column type: {e}")))?;

    let mut observations = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let days = date_ca
            .get(i)
            .ok_or_else(|| DataError::ParquetError(format!("null date at row {i}")))?;
        observations.push(Observation::new(
            epoch() + chrono::Duration::days(days as i64),
            value_ca.get(i).unwrap_or(f64::NAN),
        ));
    }

    Ok(observations)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn sample_series() -> RawSeries {
        RawSeries::new(
            "SP500",
            vec![
                Observation::new(d(2024, 1, 31), 4845.6),
                Observation::new(d(2024, 2, 29), 5096.3),
                Observation::new(d(2024, 3, 31), 5254.4),
            ],
            DataSource::YahooFinance,
        )
    }

    #[test]
    fn write_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SeriesCache::new(dir.path());

        cache.write(&sample_series(), "^GSPC").unwrap();
        let loaded = cache.load("SP500").unwrap();

        assert_eq!(loaded.source, DataSource::Cache);
        assert_eq!(loaded.observations, sample_series().observations);
    }

    #[test]
    fn load_missing_is_no_cached_data() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SeriesCache::new(dir.path());
        assert!(matches!(cache.load("VIX"), Err(DataError::NoCachedData { .. })));
    }

    #[test]
    fn meta_and_status_reflect_written_series() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SeriesCache::new(dir.path());
        cache.write(&sample_series(), "^GSPC").unwrap();

        let meta = cache.get_meta("SP500").unwrap();
        assert_eq!(meta.count, 3);
        assert_eq!(meta.start_date, d(2024, 1, 31));
        assert_eq!(meta.source, DataSource::YahooFinance);
        assert_eq!(meta.data_hash.len(), 64);

        let status = cache.status(&["SP500", "GOLD"]);
        assert!(status[0].cached);
        assert!(!status[1].cached);
        assert_eq!(cache.cached_names(), vec!["SP500".to_string()]);
    }

    #[test]
    fn coverage_is_checked_at_month_granularity() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SeriesCache::new(dir.path());
        cache.write(&sample_series(), "^GSPC").unwrap();

        assert_eq!(
            cache.covers_range("SP500", "^GSPC", d(2024, 1, 1), d(2024, 3, 15)),
            CoverageResult::FullyCovered
        );
        assert!(matches!(
            cache.covers_range("SP500", "^GSPC", d(2023, 6, 1), d(2024, 3, 15)),
            CoverageResult::PartiallyCovered { .. }
        ));
        assert_eq!(
            cache.covers_range("GOLD", "GC=F", d(2024, 1, 1), d(2024, 3, 1)),
            CoverageResult::NotCached
        );
    }

    #[test]
    fn changed_source_key_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SeriesCache::new(dir.path());
        cache.write(&sample_series(), "^GSPC").unwrap();

        assert_eq!(cache.get_meta("SP500").unwrap().source_key.as_deref(), Some("^GSPC"));
        assert_eq!(
            cache.covers_range("SP500", "^SPX", d(2024, 1, 1), d(2024, 3, 15)),
            CoverageResult::NotCached
        );
    }

    #[test]
    fn sidecar_without_source_key_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SeriesCache::new(dir.path());
        cache.write(&sample_series(), "^GSPC").unwrap();

        let meta_path = dir.path().join("indicator=SP500").join("meta.json");
        let mut meta: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&meta_path).unwrap()).unwrap();
        meta.as_object_mut().unwrap().remove("source_key");
        std::fs::write(&meta_path, meta.to_string()).unwrap();

        assert_eq!(cache.get_meta("SP500").unwrap().source_key, None);
        assert_eq!(
            cache.covers_range("SP500", "^GSPC", d(2024, 1, 1), d(2024, 3, 15)),
            CoverageResult::NotCached
        );
    }

    #[test]
    fn corrupt_file_is_quarantined() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SeriesCache::new(dir.path());
        cache.write(&sample_series(), "^GSPC").unwrap();

        let path = dir.path().join("indicator=SP500").join("series.parquet");
        std::fs::write(&path, b"not parquet").unwrap();

        assert!(cache.load("SP500").is_err());
        assert!(!path.exists());
        assert!(path.with_extension("parquet.quarantined").exists());
    }
}
