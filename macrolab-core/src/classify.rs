//! Structural-vs-hype heuristic.
//!
//! Combines three cues over the recent window:
//! - persistence: lag-1 autocorrelation of the level
//! - calm: `1 / (1 + σ)` where σ is the sample std of the last `window`
//!   first differences
//! - signal-to-noise: `|mean| / (σ + 1e-9)` of those same differences
//!
//! `score = 0.5 tanh(persistence) + 0.3 tanh(calm) + 0.2 tanh(snr)`, with
//! undefined cues contributing zero. Scores above 0.2 read as structural.

use crate::dataset::Dataset;
use crate::stats::descriptive::{autocorr, diff, finite, mean, sample_std};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_WINDOW: usize = 6;
pub const STRUCTURAL_THRESHOLD: f64 = 0.2;

const W_PERSISTENCE: f64 = 0.5;
const W_CALM: f64 = 0.3;
const W_SNR: f64 = 0.2;
const NOISE_FLOOR: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalLabel {
    #[serde(rename = "structural")]
    Structural,
    #[serde(rename = "temporary/hype")]
    TemporaryHype,
}

impl fmt::Display for SignalLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalLabel::Structural => write!(f, "structural"),
            SignalLabel::TemporaryHype => write!(f, "temporary/hype"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// `None` when the series is too short to score.
    pub score: Option<f64>,
    pub label: SignalLabel,
}

impl Classification {
    pub fn from_score(score: Option<f64>) -> Self {
        let label = match score {
            Some(s) if s > STRUCTURAL_THRESHOLD => SignalLabel::Structural,
            _ => SignalLabel::TemporaryHype,
        };
        Self { score, label }
    }
}

/// Heuristic score for one series; `None` below `window + 2` points.
pub fn hype_vs_structural(series: &[f64], window: usize) -> Option<f64> {
    let s = finite(series);
    if window == 0 || s.len() < window + 2 {
        return None;
    }

    let persistence = autocorr(&s, 1);
    let diffs = diff(&s);
    let recent = &diffs[diffs.len() - window..];
    let vol = sample_std(recent);
    let snr = mean(recent).abs() / (vol + NOISE_FLOOR);

    let p = or_zero(persistence.tanh());
    let v = or_zero((1.0 / (1.0 + vol)).tanh());
    let n = or_zero(snr.tanh());

    Some(W_PERSISTENCE * p + W_CALM * v + W_SNR * n)
}

fn or_zero(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x
    }
}

/// Classify every column of the dataset, in column order.
pub fn evaluate_signals(dataset: &Dataset, window: usize) -> Vec<(String, Classification)> {
    dataset
        .iter_columns()
        .map(|(name, values)| {
            let c = Classification::from_score(hype_vs_structural(values, window));
            tracing::debug!(column = name, score = ?c.score, label = %c.label, "classified");
            (name.to_string(), c)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steady_trend_is_structural() {
        let s: Vec<f64> = (0..40).map(|i| 100.0 + 0.5 * f64::from(i)).collect();
        let score = hype_vs_structural(&s, DEFAULT_WINDOW).unwrap();
        // persistence 1, zero volatility, huge snr
        let expected = 0.5 * 1f64.tanh() + 0.3 * 1f64.tanh() + 0.2;
        assert!((score - expected).abs() < 1e-9);
        assert_eq!(Classification::from_score(Some(score)).label, SignalLabel::Structural);
    }

    #[test]
    fn noisy_spikes_are_hype() {
        let s: Vec<f64> = (0..40)
            .map(|i| if i % 2 == 0 { 50.0 } else { -50.0 })
            .collect();
        let score = hype_vs_structural(&s, DEFAULT_WINDOW).unwrap();
        assert!(score < STRUCTURAL_THRESHOLD);
        assert_eq!(Classification::from_score(Some(score)).label, SignalLabel::TemporaryHype);
    }

    #[test]
    fn threshold_is_strict() {
        assert_eq!(Classification::from_score(Some(0.2)).label, SignalLabel::TemporaryHype);
        assert_eq!(Classification::from_score(Some(0.2001)).label, SignalLabel::Structural);
    }

    #[test]
    fn short_series_get_no_score_and_hype_label() {
        let s = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        assert_eq!(hype_vs_structural(&s, DEFAULT_WINDOW), None);
        let c = Classification::from_score(None);
        assert_eq!(c.label, SignalLabel::TemporaryHype);
        assert_eq!(serde_json::to_string(&c.label).unwrap(), "\"temporary/hype\"");
    }

    #[test]
    fn constant_series_uses_zero_for_undefined_persistence() {
        let s = vec![5.0; 12];
        let score = hype_vs_structural(&s, DEFAULT_WINDOW).unwrap();
        // autocorrelation undefined, vol 0, snr 0
        assert!((score - 0.3 * 1f64.tanh()).abs() < 1e-12);
    }
}
