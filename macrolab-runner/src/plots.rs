//! SVG charts for the exploration and modeling stages.
//!
//! Time axes are plotted as month indices (`year * 12 + month0`) and
//! labelled back to `YYYY-MM`.

use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use macrolab_core::models::MlForecast;
use macrolab_core::stats::{CorrelationMatrix, Decomposition};
use macrolab_core::Dataset;
use plotters::prelude::*;
use std::ops::Range;
use std::path::Path;

const WIDTH: u32 = 1000;
const PANEL_HEIGHT: u32 = 220;
const FONT: &str = "sans-serif";

fn month_index(date: NaiveDate) -> f64 {
    f64::from(date.year() * 12 + date.month0() as i32)
}

fn month_label(x: &f64) -> String {
    let m = x.round() as i32;
    format!("{}-{:02}", m.div_euclid(12), m.rem_euclid(12) + 1)
}

/// Padded range over the finite values of every slice.
fn value_range<'a>(series: impl IntoIterator<Item = &'a [f64]>) -> Range<f64> {
    let (lo, hi) = series
        .into_iter()
        .flatten()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    if !lo.is_finite() {
        return 0.0..1.0;
    }
    let pad = if hi > lo { (hi - lo) * 0.05 } else { lo.abs().max(1.0) * 0.05 };
    (lo - pad)..(hi + pad)
}

fn date_range(dates: &[NaiveDate]) -> Range<f64> {
    match (dates.first(), dates.last()) {
        (Some(f), Some(l)) if l > f => month_index(*f)..month_index(*l),
        (Some(f), _) => (month_index(*f) - 0.5)..(month_index(*f) + 0.5),
        _ => 0.0..1.0,
    }
}

fn points<'a>(dates: &'a [NaiveDate], values: &'a [f64]) -> impl Iterator<Item = (f64, f64)> + 'a {
    dates
        .iter()
        .zip(values)
        .filter(|(_, v)| v.is_finite())
        .map(|(d, v)| (month_index(*d), *v))
}

/// Draw one line chart into `area`.
fn line_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, plotters::coord::Shift>,
    title: &str,
    dates: &[NaiveDate],
    series: &[(&str, &[f64], RGBColor)],
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let y_range = value_range(series.iter().map(|(_, v, _)| *v));
    let mut chart = ChartBuilder::on(area)
        .caption(title, (FONT, 16))
        .margin(8)
        .x_label_area_size(24)
        .y_label_area_size(60)
        .build_cartesian_2d(date_range(dates), y_range)?;

    chart
        .configure_mesh()
        .x_labels(8)
        .x_label_formatter(&month_label)
        .draw()?;

    for (label, values, color) in series {
        let color = *color;
        chart
            .draw_series(LineSeries::new(points(dates, values), &color))?
            .label(*label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    if series.len() > 1 {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }
    Ok(())
}

/// One stacked panel per column.
pub fn overview_plot(dataset: &Dataset, path: &Path) -> Result<()> {
    let height = PANEL_HEIGHT * dataset.n_cols().max(1) as u32;
    let root = SVGBackend::new(path, (WIDTH, height)).into_drawing_area();
    root.fill(&WHITE)?;

    let panels = root.split_evenly((dataset.n_cols().max(1), 1));
    for (panel, (name, values)) in panels.iter().zip(dataset.iter_columns()) {
        line_panel(panel, name, &dataset.dates, &[(name, values, BLUE)])?;
    }

    root.present()?;
    Ok(())
}

/// Blue-white-red scale over `[-1, 1]`.
fn coolwarm(v: f64) -> RGBColor {
    let lerp = |a: u8, b: u8, t: f64| (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8;
    let (cold, mid, warm) = ((59, 76, 192), (221, 221, 221), (180, 4, 38));
    let v = if v.is_finite() { v.clamp(-1.0, 1.0) } else { 0.0 };
    let (from, to, t) = if v < 0.0 { (cold, mid, v + 1.0) } else { (mid, warm, v) };
    RGBColor(lerp(from.0, to.0, t), lerp(from.1, to.1, t), lerp(from.2, to.2, t))
}

/// Annotated correlation heatmap.
pub fn correlation_heatmap(corr: &CorrelationMatrix, path: &Path) -> Result<()> {
    let n = corr.names.len();
    if n == 0 {
        anyhow::bail!("correlation matrix is empty");
    }
    let side = 120 + 70 * n as u32;
    let root = SVGBackend::new(path, (side + 80, side)).into_drawing_area();
    root.fill(&WHITE)?;

    let names = &corr.names;
    let label = |v: &SegmentValue<usize>| match v {
        SegmentValue::CenterOf(i) => names.get(*i).cloned().unwrap_or_default(),
        _ => String::new(),
    };

    let mut chart = ChartBuilder::on(&root)
        .caption("Correlation matrix", (FONT, 20))
        .margin(10)
        .x_label_area_size(60)
        .y_label_area_size(100)
        // Integer ranges include their end, so 0..n-1 gives n cells
        .build_cartesian_2d((0..n - 1).into_segmented(), (0..n - 1).into_segmented())?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(n)
        .y_labels(n)
        .x_label_formatter(&label)
        .y_label_formatter(&label)
        .draw()?;

    for i in 0..n {
        for j in 0..n {
            // Row 0 at the top, like a printed matrix
            let row = n - 1 - j;
            let v = corr.values[j][i];
            chart.draw_series(std::iter::once(Rectangle::new(
                [
                    (SegmentValue::Exact(i), SegmentValue::Exact(row)),
                    (SegmentValue::Exact(i + 1), SegmentValue::Exact(row + 1)),
                ],
                coolwarm(v).filled(),
            )))?;
            let text = if v.is_finite() { format!("{v:.2}") } else { "n/a".to_string() };
            chart.draw_series(std::iter::once(Text::new(
                text,
                (SegmentValue::CenterOf(i), SegmentValue::CenterOf(row)),
                (FONT, 12).into_font(),
            )))?;
        }
    }

    root.present()?;
    Ok(())
}

/// Observed, trend, seasonal and residual panels.
pub fn decomposition_plot(name: &str, dates: &[NaiveDate], dec: &Decomposition, path: &Path) -> Result<()> {
    let root = SVGBackend::new(path, (WIDTH, PANEL_HEIGHT * 4)).into_drawing_area();
    root.fill(&WHITE)?;

    let panels = root.split_evenly((4, 1));
    let parts: [(&str, &[f64]); 4] = [
        ("observed", dec.observed.as_slice()),
        ("trend", dec.trend.as_slice()),
        ("seasonal", dec.seasonal.as_slice()),
        ("resid", dec.resid.as_slice()),
    ];
    for (panel, (part, values)) in panels.iter().zip(parts) {
        line_panel(panel, &format!("{name}: {part}"), dates, &[(part, values, BLUE)])?;
    }

    root.present()?;
    Ok(())
}

/// History, forecast mean and the 95% band.
pub struct ForecastChart<'a> {
    pub name: &'a str,
    pub history_dates: &'a [NaiveDate],
    pub history: &'a [f64],
    pub forecast_dates: &'a [NaiveDate],
    pub mean: &'a [f64],
    pub lower: &'a [f64],
    pub upper: &'a [f64],
}

pub fn sarima_plot(fc: &ForecastChart<'_>, path: &Path) -> Result<()> {
    let root = SVGBackend::new(path, (WIDTH, 400)).into_drawing_area();
    root.fill(&WHITE)?;

    let x_start = fc.history_dates.first().or(fc.forecast_dates.first());
    let x_end = fc.forecast_dates.last().or(fc.history_dates.last());
    let x_range = match (x_start, x_end) {
        (Some(a), Some(b)) => date_range(&[*a, *b]),
        _ => 0.0..1.0,
    };
    let y_range = value_range([fc.history, fc.lower, fc.upper, fc.mean]);

    let mut chart = ChartBuilder::on(&root)
        .caption(format!("SARIMA forecast: {}", fc.name), (FONT, 20))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, y_range)?;

    chart
        .configure_mesh()
        .x_labels(10)
        .x_label_formatter(&month_label)
        .draw()?;

    let band: Vec<(f64, f64)> = points(fc.forecast_dates, fc.upper)
        .chain(points(fc.forecast_dates, fc.lower).collect::<Vec<_>>().into_iter().rev())
        .collect();
    if band.len() >= 3 {
        chart.draw_series(std::iter::once(Polygon::new(band, RED.mix(0.2))))?;
    }

    chart
        .draw_series(LineSeries::new(points(fc.history_dates, fc.history), &BLUE))?
        .label("history")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));
    chart
        .draw_series(LineSeries::new(points(fc.forecast_dates, fc.mean), &RED))?
        .label("sarima_forecast")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

/// Test-window actuals against ML predictions.
pub fn ml_plot(fc: &MlForecast, path: &Path) -> Result<()> {
    let root = SVGBackend::new(path, (WIDTH, 400)).into_drawing_area();
    root.fill(&WHITE)?;

    let title = format!("ML lag baseline: {} (MSE={:.3})", fc.target, fc.mse);
    let predicted_label = format!("{}_ml_pred", fc.target);
    line_panel(
        &root,
        &title,
        &fc.dates,
        &[
            (fc.target.as_str(), fc.actual.as_slice(), BLUE),
            (predicted_label.as_str(), fc.predicted.as_slice(), RED),
        ],
    )?;

    root.present()?;
    Ok(())
}

/// File-system friendly version of an indicator name.
pub fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use macrolab_core::stats::correlation_matrix;
    use proptest::prelude::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn month_labels_roundtrip() {
        assert_eq!(month_label(&month_index(d(2024, 1, 31))), "2024-01");
        assert_eq!(month_label(&month_index(d(2013, 12, 31))), "2013-12");
    }

    #[test]
    fn value_range_pads_and_skips_nan() {
        let r = value_range([&[1.0, f64::NAN, 3.0][..]]);
        assert!(r.start < 1.0 && r.end > 3.0);
        let flat = value_range([&[5.0, 5.0][..]]);
        assert!(flat.start < 5.0 && flat.end > 5.0);
        assert_eq!(value_range([&[f64::NAN][..]]), 0.0..1.0);
    }

    #[test]
    fn coolwarm_endpoints() {
        assert_eq!(coolwarm(-1.0), RGBColor(59, 76, 192));
        assert_eq!(coolwarm(0.0), RGBColor(221, 221, 221));
        assert_eq!(coolwarm(1.0), RGBColor(180, 4, 38));
    }

    #[test]
    fn file_stem_replaces_unsafe_chars() {
        assert_eq!(file_stem("10YR_YIELD"), "10YR_YIELD");
        assert_eq!(file_stem("DX-Y.NYB / x"), "DX-Y_NYB___x");
    }

    proptest! {
        #[test]
        fn month_label_matches_calendar(year in 1990i32..2060, month in 1u32..=12) {
            let date = macrolab_core::data::month_end(d(year, month, 1));
            prop_assert_eq!(month_label(&month_index(date)), date.format("%Y-%m").to_string());
        }

        #[test]
        fn file_stem_is_path_safe(name in "\\PC{0,24}") {
            let stem = file_stem(&name);
            prop_assert_eq!(stem.chars().count(), name.chars().count());
            prop_assert!(stem.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
        }
    }

    #[test]
    fn writes_svg_files() {
        let dir = tempfile::tempdir().unwrap();
        let dates: Vec<NaiveDate> = (1..=12).map(|m| macrolab_core::data::month_end(d(2020, m, 1))).collect();
        let a: Vec<f64> = (0..12).map(f64::from).collect();
        let b: Vec<f64> = (0..12).map(|i| f64::from(12 - i)).collect();
        let ds = Dataset::from_columns(dates, vec!["A".into(), "B".into()], vec![a, b]).unwrap();

        let overview = dir.path().join("overview.svg");
        overview_plot(&ds, &overview).unwrap();
        let heatmap = dir.path().join("corr.svg");
        correlation_heatmap(&correlation_matrix(ds.iter_columns()), &heatmap).unwrap();

        for path in [overview, heatmap] {
            let svg = std::fs::read_to_string(&path).unwrap();
            assert!(svg.contains("<svg"), "{}", path.display());
        }
    }
}
