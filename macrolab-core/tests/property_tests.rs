//! Property tests for dataset and model invariants.
//!
//! Uses proptest to verify:
//! 1. Prepared datasets have strictly ascending month-end dates, one per month
//! 2. Prepared datasets have no missing cells
//! 3. Lag-k features are missing exactly in the first k rows
//! 4. SARIMA forecasts have the requested length and non-shrinking intervals
//! 5. Heuristic labels follow the 0.2 threshold

use chrono::NaiveDate;
use macrolab_core::classify::{hype_vs_structural, Classification, SignalLabel, STRUCTURAL_THRESHOLD};
use macrolab_core::data::resample::{is_month_end, month_ends_between};
use macrolab_core::dataset::Dataset;
use macrolab_core::models::{build_lag_features, Sarima, SarimaOrder};
use macrolab_core::prepare::prepare_dataset;
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

/// Daily-ish observations over a few years, some missing.
fn arb_raw_dataset() -> impl Strategy<Value = Dataset> {
    (
        prop::collection::vec((0u32..1500, prop::option::weighted(0.8, -100.0..100.0_f64)), 1..120),
        prop::collection::vec((0u32..1500, prop::option::weighted(0.3, 0.0..10.0_f64)), 1..120),
    )
        .prop_map(|(a, b)| {
            let base = NaiveDate::from_ymd_opt(2015, 1, 1).unwrap();
            let mut dates: Vec<NaiveDate> = a
                .iter()
                .chain(&b)
                .map(|(off, _)| base + chrono::Duration::days(i64::from(*off)))
                .collect();
            dates.sort();
            dates.dedup();

            let column = |obs: &[(u32, Option<f64>)]| -> Vec<f64> {
                dates
                    .iter()
                    .map(|d| {
                        obs.iter()
                            .rev()
                            .find(|(off, _)| base + chrono::Duration::days(i64::from(*off)) == *d)
                            .and_then(|(_, v)| *v)
                            .unwrap_or(f64::NAN)
                    })
                    .collect()
            };
            let (col_a, col_b) = (column(&a), column(&b));
            Dataset::from_columns(dates.clone(), vec!["A".into(), " B ".into()], vec![col_a, col_b])
                .unwrap()
        })
}

fn arb_monthly_series(min: usize, max: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-5.0..5.0_f64, min..max).prop_map(|steps| {
        let mut level = 100.0;
        steps
            .into_iter()
            .enumerate()
            .map(|(i, s)| {
                level += s;
                level + 3.0 * ((i % 12) as f64 / 12.0 * std::f64::consts::TAU).sin()
            })
            .collect()
    })
}

// ── 1-2. Preparation ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn prepared_dates_are_consecutive_month_ends(raw in arb_raw_dataset()) {
        let prepared = prepare_dataset(&raw, None, None);
        if let (Some(first), Some(last)) = (raw.first_date(), raw.last_date()) {
            prop_assert_eq!(&prepared.dates, &month_ends_between(first, last));
        }
        prop_assert!(prepared.dates.iter().all(|d| is_month_end(*d)));
        prop_assert!(prepared.dates.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn prepared_dataset_has_no_missing_cells(raw in arb_raw_dataset()) {
        let prepared = prepare_dataset(&raw, None, None);
        prop_assert_eq!(prepared.missing_cells(), 0);
        prop_assert!(prepared.columns.iter().all(|c| c.trim() == c));
        for col in &prepared.values {
            prop_assert_eq!(col.len(), prepared.n_rows());
        }
    }
}

// ── 3. Lag features ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn lag_features_missing_only_in_leading_rows(
        series in arb_monthly_series(8, 60),
        lags in 1usize..8,
    ) {
        let start = NaiveDate::from_ymd_opt(2010, 1, 31).unwrap();
        let end = NaiveDate::from_ymd_opt(2030, 1, 31).unwrap();
        let dates: Vec<NaiveDate> = month_ends_between(start, end).into_iter().take(series.len()).collect();
        let ds = Dataset::from_columns(dates, vec!["X".into()], vec![series.clone()]).unwrap();

        let f = build_lag_features(&ds, lags);
        for (t, row) in f.rows.iter().enumerate() {
            for (j, v) in row.iter().enumerate() {
                let k = j + 1;
                prop_assert_eq!(v.is_nan(), t < k);
                if t >= k {
                    prop_assert_eq!(*v, series[t - k]);
                }
            }
        }
    }
}

// ── 4. SARIMA forecasts ──────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn sarima_forecast_shape_and_intervals(
        series in arb_monthly_series(40, 80),
        steps in 1usize..18,
    ) {
        let mut model = Sarima::new(SarimaOrder::default()).unwrap();
        model.fit(&series).unwrap();
        let fc = model.forecast(steps).unwrap();

        prop_assert_eq!(fc.mean.len(), steps);
        prop_assert_eq!(fc.lower.len(), steps);
        prop_assert_eq!(fc.upper.len(), steps);
        let mut prev_width = 0.0;
        for i in 0..steps {
            prop_assert!(fc.lower[i] <= fc.mean[i] && fc.mean[i] <= fc.upper[i]);
            let width = fc.upper[i] - fc.lower[i];
            prop_assert!(width + 1e-9 >= prev_width);
            prev_width = width;
        }
    }
}

// ── 5. Heuristic threshold ───────────────────────────────────────────

proptest! {
    #[test]
    fn label_follows_threshold(series in arb_monthly_series(0, 40)) {
        let score = hype_vs_structural(&series, 6);
        let c = Classification::from_score(score);
        match score {
            Some(s) if s > STRUCTURAL_THRESHOLD => prop_assert_eq!(c.label, SignalLabel::Structural),
            _ => prop_assert_eq!(c.label, SignalLabel::TemporaryHype),
        }
        prop_assert_eq!(score.is_some(), series.len() >= 8);
        if let Some(s) = score {
            prop_assert!(s.abs() <= 1.0);
        }
    }
}
