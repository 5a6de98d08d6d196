//! Statistical testing stage: ADF per column and pairwise Granger tests.
//!
//! Writes `adf_summary.txt` and `granger_summary.txt` to the output
//! directory.

use anyhow::{Context, Result};
use macrolab_core::stats::{adf_test, granger_all_pairs, AdfResult, GrangerResult, StatsError};
use macrolab_core::Dataset;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;

/// ADF outcome for one column; `result` is `None` when the test could not run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdfEntry {
    pub column: String,
    pub result: Option<AdfResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    pub adf: Vec<AdfEntry>,
    pub granger: Vec<GrangerResult>,
}

/// Run every test. Per-column failures are kept as empty results.
pub fn run_stats(dataset: &Dataset, granger_max_lag: usize) -> StatsReport {
    let adf = dataset
        .iter_columns()
        .map(|(name, values)| {
            let result = match adf_test(values) {
                Ok(r) => Some(r),
                Err(StatsError::InsufficientData { needed, got }) => {
                    tracing::info!(column = name, needed, got, "too short for ADF");
                    None
                }
                Err(e) => {
                    tracing::warn!(column = name, error = %e, "ADF failed");
                    None
                }
            };
            AdfEntry {
                column: name.to_string(),
                result,
            }
        })
        .collect();

    let granger = granger_all_pairs(dataset.iter_columns(), granger_max_lag);
    let failed = granger.iter().filter(|g| g.pvalue.is_none()).count();
    if failed > 0 {
        tracing::warn!(failed, total = granger.len(), "some Granger tests failed");
    }

    StatsReport { adf, granger }
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map_or_else(|| "n/a".to_string(), |x| format!("{x:.6}"))
}

pub fn adf_summary_text(report: &StatsReport) -> String {
    let mut out = String::new();
    for entry in &report.adf {
        let r = entry.result.as_ref();
        let _ = write!(
            out,
            "{}: adf_stat={}, p={}",
            entry.column,
            fmt_opt(r.map(|r| r.statistic)),
            fmt_opt(r.map(|r| r.pvalue))
        );
        if let Some(r) = r {
            let _ = write!(
                out,
                ", lag={}, nobs={}, 5%={:.4}",
                r.used_lag, r.nobs, r.critical_values.five_pct
            );
        }
        out.push('\n');
    }
    out
}

pub fn granger_summary_text(report: &StatsReport) -> String {
    let mut out = String::new();
    for g in &report.granger {
        let _ = writeln!(out, "{}: p={}", g.label(), fmt_opt(g.pvalue));
    }
    out
}

/// Write both summaries into `output_dir`.
pub fn write_summaries(report: &StatsReport, output_dir: &Path) -> Result<()> {
    let adf_path = output_dir.join("adf_summary.txt");
    std::fs::write(&adf_path, adf_summary_text(report))
        .with_context(|| format!("failed to write {}", adf_path.display()))?;
    let granger_path = output_dir.join("granger_summary.txt");
    std::fs::write(&granger_path, granger_summary_text(report))
        .with_context(|| format!("failed to write {}", granger_path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use macrolab_core::data::resample::add_month_ends;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn dataset(n: u32) -> Dataset {
        let mut rng = StdRng::seed_from_u64(3);
        let start = NaiveDate::from_ymd_opt(2015, 1, 31).unwrap();
        let dates = (0..n).map(|i| add_month_ends(start, i)).collect();
        let noise: Vec<f64> = (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let walk: Vec<f64> = noise
            .iter()
            .scan(100.0, |level, e| {
                *level += e;
                Some(*level)
            })
            .collect();
        Dataset::from_columns(dates, vec!["NOISE".into(), "WALK".into()], vec![noise, walk]).unwrap()
    }

    #[test]
    fn adf_and_granger_for_every_column() {
        let report = run_stats(&dataset(80), 4);
        assert_eq!(report.adf.len(), 2);
        let noise = report.adf[0].result.as_ref().unwrap();
        assert!(noise.pvalue < 0.05, "white noise p = {}", noise.pvalue);
        assert_eq!(report.granger.len(), 2);
        assert_eq!(report.granger[0].label(), "WALK -> NOISE");
    }

    #[test]
    fn short_columns_report_no_result() {
        let report = run_stats(&dataset(8), 4);
        assert!(report.adf.iter().all(|e| e.result.is_none()));
        assert!(report.granger.iter().all(|g| g.pvalue.is_none()));

        let text = adf_summary_text(&report);
        assert!(text.contains("NOISE: adf_stat=n/a, p=n/a"));
        assert!(granger_summary_text(&report).contains("NOISE -> WALK: p=n/a"));
    }

    #[test]
    fn summaries_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let report = run_stats(&dataset(60), 2);
        write_summaries(&report, dir.path()).unwrap();

        let adf = std::fs::read_to_string(dir.path().join("adf_summary.txt")).unwrap();
        assert_eq!(adf.lines().count(), 2);
        assert!(adf.starts_with("NOISE: adf_stat="));
        let granger = std::fs::read_to_string(dir.path().join("granger_summary.txt")).unwrap();
        assert_eq!(granger.lines().count(), 2);
    }
}
