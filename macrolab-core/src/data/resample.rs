//! Month-end calendar helpers and monthly resampling.

use super::provider::Observation;
use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How observations within a month collapse into one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Last finite observation of the month (price series).
    Last,
    /// Mean of the month's finite observations.
    Mean,
}

/// Last calendar day of `date`'s month.
pub fn month_end(date: NaiveDate) -> NaiveDate {
    let first = date.with_day(1).unwrap_or(date);
    first
        .checked_add_months(Months::new(1))
        .and_then(|d| d.pred_opt())
        .unwrap_or(date)
}

/// Month-end `n` months after the month-end of `date`.
pub fn add_month_ends(date: NaiveDate, n: u32) -> NaiveDate {
    let first = date.with_day(1).unwrap_or(date);
    first
        .checked_add_months(Months::new(n))
        .map(month_end)
        .unwrap_or(date)
}

pub fn is_month_end(date: NaiveDate) -> bool {
    month_end(date) == date
}

/// Every month-end from `first`'s month through `last`'s month, inclusive.
pub fn month_ends_between(first: NaiveDate, last: NaiveDate) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    if last < first {
        return out;
    }
    let stop = month_end(last);
    let mut current = month_end(first);
    while current <= stop {
        out.push(current);
        let next = add_month_ends(current, 1);
        if next <= current {
            break;
        }
        current = next;
    }
    out
}

/// Collapse observations to one per month, labelled with the month-end date.
///
/// Non-finite values are ignored; months without any finite value are
/// omitted. Output is sorted by date.
pub fn resample_monthly(observations: &[Observation], aggregation: Aggregation) -> Vec<Observation> {
    let mut buckets: BTreeMap<NaiveDate, Vec<(NaiveDate, f64)>> = BTreeMap::new();
    for obs in observations.iter().filter(|o| o.value.is_finite()) {
        buckets
            .entry(month_end(obs.date))
            .or_default()
            .push((obs.date, obs.value));
    }

    buckets
        .into_iter()
        .map(|(date, mut values)| {
            let value = match aggregation {
                Aggregation::Mean => values.iter().map(|(_, v)| v).sum::<f64>() / values.len() as f64,
                Aggregation::Last => {
                    // Stable sort keeps provider order for same-day duplicates
                    values.sort_by_key(|(d, _)| *d);
                    values.last().map(|(_, v)| *v).unwrap_or(f64::NAN)
                }
            };
            Observation::new(date, value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn month_end_handles_leap_years_and_december() {
        assert_eq!(month_end(d(2024, 2, 10)), d(2024, 2, 29));
        assert_eq!(month_end(d(2023, 2, 1)), d(2023, 2, 28));
        assert_eq!(month_end(d(2024, 12, 31)), d(2024, 12, 31));
        assert!(is_month_end(d(2024, 4, 30)));
        assert!(!is_month_end(d(2024, 4, 29)));
    }

    #[test]
    fn add_month_ends_rolls_over_year() {
        assert_eq!(add_month_ends(d(2024, 11, 30), 1), d(2024, 12, 31));
        assert_eq!(add_month_ends(d(2024, 12, 31), 1), d(2025, 1, 31));
        assert_eq!(add_month_ends(d(2024, 1, 31), 1), d(2024, 2, 29));
        assert_eq!(add_month_ends(d(2024, 12, 31), 12), d(2025, 12, 31));
    }

    #[test]
    fn month_range_is_inclusive() {
        let months = month_ends_between(d(2023, 11, 15), d(2024, 2, 1));
        assert_eq!(
            months,
            vec![d(2023, 11, 30), d(2023, 12, 31), d(2024, 1, 31), d(2024, 2, 29)]
        );
        assert!(month_ends_between(d(2024, 2, 1), d(2023, 1, 1)).is_empty());
    }

    #[test]
    fn resample_last_and_mean() {
        let obs = vec![
            Observation::new(d(2024, 1, 2), 10.0),
            Observation::new(d(2024, 1, 31), 14.0),
            Observation::new(d(2024, 1, 15), 12.0),
            Observation::new(d(2024, 3, 1), 20.0),
            Observation::new(d(2024, 3, 2), f64::NAN),
        ];

        let last = resample_monthly(&obs, Aggregation::Last);
        assert_eq!(last.len(), 2);
        assert_eq!(last[0], Observation::new(d(2024, 1, 31), 14.0));
        assert_eq!(last[1], Observation::new(d(2024, 3, 31), 20.0));

        let mean = resample_monthly(&obs, Aggregation::Mean);
        assert_eq!(mean[0].value, 12.0);
        assert_eq!(mean[1].value, 20.0);
    }
}
