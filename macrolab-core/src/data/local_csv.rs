//! Local CSV import.
//!
//! Column detection:
//! - date: the first header containing "date" (case-insensitive); otherwise
//!   `Year` + `Month` columns build a first-of-month date; otherwise the file
//!   is rejected
//! - value: the first column whose non-empty cells all parse as numbers,
//!   excluding the date columns
//!
//! The result is resampled to month-end means.

use super::provider::{DataError, DataSource, Observation, RawSeries};
use super::resample::{resample_monthly, Aggregation};
use chrono::{NaiveDate, NaiveDateTime};
use std::path::Path;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y", "%Y%m%d"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%SZ"];

enum DateColumns {
    Single(usize),
    YearMonth { year: usize, month: usize },
}

/// Parse a date cell in any of the accepted layouts.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    // "2024-03" style month stamps
    NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d").ok()
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn csv_err(path: &Path, reason: impl Into<String>) -> DataError {
    DataError::CsvError {
        file: file_label(path),
        reason: reason.into(),
    }
}

/// Load a local CSV file as a monthly series named `name`.
pub fn load_local_csv(path: &Path, name: &str) -> Result<RawSeries, DataError> {
    if !path.exists() {
        return Err(csv_err(path, "file not found"));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| csv_err(path, e.to_string()))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| csv_err(path, e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let date_cols = detect_date_columns(&headers)
        .ok_or_else(|| csv_err(path, "no Date, Year or Month columns found"))?;

    let records: Vec<csv::StringRecord> = reader
        .records()
        .collect::<Result<_, _>>()
        .map_err(|e| csv_err(path, e.to_string()))?;

    let excluded: Vec<usize> = match date_cols {
        DateColumns::Single(i) => vec![i],
        DateColumns::YearMonth { year, month } => vec![year, month],
    };
    let value_col = (0..headers.len())
        .filter(|i| !excluded.contains(i))
        .find(|&i| is_numeric_column(&records, i))
        .ok_or_else(|| csv_err(path, "no numeric columns found"))?;

    let mut observations = Vec::with_capacity(records.len());
    for (row, record) in records.iter().enumerate() {
        let date = match date_cols {
            DateColumns::Single(i) => {
                let cell = record.get(i).unwrap_or("");
                if cell.is_empty() {
                    continue;
                }
                parse_date(cell)
                    .ok_or_else(|| csv_err(path, format!("unparseable date '{cell}' at row {}", row + 2)))?
            }
            DateColumns::YearMonth { year, month } => {
                let y = record.get(year).and_then(|c| c.parse::<f64>().ok());
                let m = record.get(month).and_then(|c| c.parse::<f64>().ok());
                match (y, m) {
                    (Some(y), Some(m)) => year_month_date(y, m)
                        .ok_or_else(|| csv_err(path, format!("invalid year/month at row {}", row + 2)))?,
                    _ => continue,
                }
            }
        };

        let value = record
            .get(value_col)
            .and_then(|c| c.parse::<f64>().ok())
            .unwrap_or(f64::NAN);
        observations.push(Observation::new(date, value));
    }

    let monthly = resample_monthly(&observations, Aggregation::Mean);
    if monthly.is_empty() {
        return Err(csv_err(path, "no usable rows"));
    }

    tracing::debug!(
        file = %path.display(),
        column = %headers[value_col],
        months = monthly.len(),
        "loaded local csv"
    );

    Ok(RawSeries::new(name, monthly, DataSource::CsvImport))
}

/// First of the month for whole-number year and month cells.
fn year_month_date(year: f64, month: f64) -> Option<NaiveDate> {
    if year.fract() != 0.0 || month.fract() != 0.0 || !(1.0..=12.0).contains(&month) {
        return None;
    }
    if !(f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(&year) {
        return None;
    }
    NaiveDate::from_ymd_opt(year as i32, month as u32, 1)
}

fn detect_date_columns(headers: &[String]) -> Option<DateColumns> {
    if let Some(i) = headers.iter().position(|h| h.to_lowercase().contains("date")) {
        return Some(DateColumns::Single(i));
    }
    let year = headers.iter().position(|h| h.eq_ignore_ascii_case("year"))?;
    let month = headers.iter().position(|h| h.eq_ignore_ascii_case("month"))?;
    Some(DateColumns::YearMonth { year, month })
}

fn is_numeric_column(records: &[csv::StringRecord], col: usize) -> bool {
    let mut seen = false;
    for record in records {
        match record.get(col) {
            Some("") | None => continue,
            Some(cell) => {
                if cell.parse::<f64>().is_err() {
                    return false;
                }
                seen = true;
            }
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_observation_date_column_and_averages_months() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "cpi.csv",
            "observation_date,label,CPI\n2024-01-01,a,100\n2024-01-15,b,102\n2024-02-01,c,104\n",
        );

        let series = load_local_csv(&path, "CPI").unwrap();
        assert_eq!(series.name, "CPI");
        assert_eq!(series.source, DataSource::CsvImport);
        assert_eq!(series.len(), 2);
        assert_eq!(series.observations[0].date, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
        assert_eq!(series.observations[0].value, 101.0);
        assert_eq!(series.observations[1].value, 104.0);
    }

    #[test]
    fn year_month_columns_are_not_picked_as_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "housing.csv",
            "Year,Month,Starts\n2023,11,1.5\n2023,12,1.7\n",
        );

        let series = load_local_csv(&path, "HOUSING").unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.observations[1].date, NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
        assert_eq!(series.observations[1].value, 1.7);
    }

    #[test]
    fn fractional_or_out_of_range_year_month_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        for (file, body) in [
            ("frac_year.csv", "Year,Month,Starts\n2023,11,1.5\n2023.7,12,1.7\n"),
            ("frac_month.csv", "Year,Month,Starts\n2023,11.5,1.5\n"),
            ("neg_month.csv", "Year,Month,Starts\n2023,-1,1.5\n"),
            ("month_13.csv", "Year,Month,Starts\n2023,13,1.5\n"),
            ("huge_year.csv", "Year,Month,Starts\n1e12,1,1.5\n"),
        ] {
            let path = write_csv(dir.path(), file, body);
            let err = load_local_csv(&path, "HOUSING").unwrap_err();
            assert!(err.to_string().contains("invalid year/month"), "{file}: {err}");
        }

        let whole = write_csv(dir.path(), "whole.csv", "Year,Month,Starts\n2023.0,12.0,1.7\n");
        let series = load_local_csv(&whole, "HOUSING").unwrap();
        assert_eq!(series.observations[0].date, NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
    }

    #[test]
    fn rejects_files_without_dates_or_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let no_date = write_csv(dir.path(), "a.csv", "x,y\n1,2\n");
        assert!(load_local_csv(&no_date, "A").is_err());

        let no_numbers = write_csv(dir.path(), "b.csv", "Date,label\n2024-01-01,foo\n");
        assert!(load_local_csv(&no_numbers, "B").is_err());

        assert!(load_local_csv(&dir.path().join("missing.csv"), "C").is_err());
    }

    #[test]
    fn parse_date_accepts_common_layouts() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(parse_date("2024-03-05"), Some(expected));
        assert_eq!(parse_date("03/05/2024"), Some(expected));
        assert_eq!(parse_date("2024-03-05 00:00:00"), Some(expected));
        assert_eq!(parse_date("2024-03"), NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(parse_date("not a date"), None);
    }
}
