//! Synthetic monthly series for development runs.
//!
//! A geometric random walk with a mild annual cycle, one value per month-end.
//! The RNG is seeded from the BLAKE3 hash of the indicator name, so the same
//! name always yields the same series. Results are tagged `Synthetic`.

use super::provider::{DataSource, Observation, RawSeries};
use super::resample::month_ends_between;
use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Generate a deterministic monthly series for `name` over `[start, end]`.
pub fn generate_synthetic_series(name: &str, start: NaiveDate, end: NaiveDate) -> RawSeries {
    let seed: [u8; 32] = *blake3::hash(name.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let level = rng.gen_range(20.0..2000.0_f64);
    let drift = rng.gen_range(-0.002..0.008_f64);
    let season_amp = rng.gen_range(0.0..0.02_f64);

    let mut value = level;
    let observations = month_ends_between(start, end)
        .into_iter()
        .map(|date| {
            let shock: f64 = rng.gen_range(-0.04..0.04);
            let phase = 2.0 * std::f64::consts::PI * f64::from(date.month0()) / 12.0;
            value *= 1.0 + drift + shock;
            Observation::new(date, value * (1.0 + season_amp * phase.sin()))
        })
        .collect();

    RawSeries::new(name, observations, DataSource::Synthetic)
}
