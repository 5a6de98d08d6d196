//! Dataset preparation: restrict, resample, fill, drop sparse columns.

use crate::data::resample::{month_end, month_ends_between};
use crate::dataset::Dataset;
use chrono::NaiveDate;
use std::collections::HashMap;

/// Columns need at least this share of non-missing rows to survive.
pub const MIN_COVERAGE: f64 = 0.5;

/// Clean and align a raw dataset into the monthly table used downstream.
///
/// 1. keep rows with `start <= date <= end` (either bound optional)
/// 2. resample to month-end taking the mean of each month; every month
///    between the first and last date gets a row
/// 3. forward-fill, then back-fill
/// 4. drop columns with fewer than `floor(rows * 0.5)` non-missing values,
///    and columns with no values at all
/// 5. trim whitespace from column names
///
/// An empty input, or an input with no rows in range, yields an empty
/// dataset.
pub fn prepare_dataset(raw: &Dataset, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Dataset {
    let in_range: Vec<usize> = raw
        .dates
        .iter()
        .enumerate()
        .filter(|(_, d)| start.is_none_or(|s| **d >= s) && end.is_none_or(|e| **d <= e))
        .map(|(i, _)| i)
        .collect();

    let (first, last) = match (in_range.first(), in_range.last()) {
        (Some(&f), Some(&l)) => (raw.dates[f], raw.dates[l]),
        _ => return Dataset::empty(),
    };

    let months = month_ends_between(first, last);
    let row_of: HashMap<NaiveDate, usize> =
        months.iter().enumerate().map(|(i, d)| (*d, i)).collect();

    let mut columns = Vec::with_capacity(raw.n_cols());
    let mut values = Vec::with_capacity(raw.n_cols());
    let threshold = (months.len() as f64 * MIN_COVERAGE).floor() as usize;

    for (name, raw_col) in raw.iter_columns() {
        let mut sums = vec![0.0; months.len()];
        let mut counts = vec![0usize; months.len()];
        for &i in &in_range {
            let v = raw_col[i];
            if v.is_nan() {
                continue;
            }
            if let Some(&row) = row_of.get(&month_end(raw.dates[i])) {
                sums[row] += v;
                counts[row] += 1;
            }
        }

        let mut column: Vec<f64> = sums
            .iter()
            .zip(&counts)
            .map(|(s, &c)| if c > 0 { s / c as f64 } else { f64::NAN })
            .collect();
        forward_fill(&mut column);
        back_fill(&mut column);

        let present = column.iter().filter(|v| !v.is_nan()).count();
        if present == 0 || present < threshold {
            tracing::info!(column = name, present, threshold, "dropping sparse column");
            continue;
        }

        columns.push(name.trim().to_string());
        values.push(column);
    }

    Dataset {
        dates: months,
        columns,
        values,
    }
}

/// Carry the last seen value forward over NaN gaps.
pub fn forward_fill(values: &mut [f64]) {
    let mut last = f64::NAN;
    for v in values.iter_mut() {
        if v.is_nan() {
            *v = last;
        } else {
            last = *v;
        }
    }
}

/// Fill leading NaN gaps with the next seen value.
pub fn back_fill(values: &mut [f64]) {
    let mut next = f64::NAN;
    for v in values.iter_mut().rev() {
        if v.is_nan() {
            *v = next;
        } else {
            next = *v;
        }
    }
}
