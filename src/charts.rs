//! SVG chart rendering for the dashboard panels.
//!
//! Each chart is an independent function of the scored table (or an
//! aggregate of it) and returns a standalone `<svg>` document that the page
//! embeds inline.

use crate::error::{DashboardError, Result};
use crate::models::Explanation;
use crate::report::{self, Histogram, HISTOGRAM_BINS, TOP_N};
use crate::types::{PredictedLabel, ScoredTable};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::f64::consts::PI;

type DrawResult = std::result::Result<(), Box<dyn std::error::Error>>;

const REAL_COLOR: RGBColor = RGBColor(46, 160, 67);
const FRAUD_COLOR: RGBColor = RGBColor(220, 53, 69);
const PURPLE: RGBColor = RGBColor(128, 0, 128);
const ORANGE: RGBColor = RGBColor(255, 165, 0);
const PUSH_DOWN_COLOR: RGBColor = RGBColor(30, 136, 229);
const FONT: &str = "sans-serif";

fn label_color(label: PredictedLabel) -> RGBColor {
    match label {
        PredictedLabel::Real => REAL_COLOR,
        PredictedLabel::Fraud => FRAUD_COLOR,
    }
}

/// The five dashboard charts for one scored batch
#[derive(Debug, Clone)]
pub struct DashboardCharts {
    pub prediction_split: String,
    pub probability_distribution: String,
    pub fraud_locations: String,
    pub description_length: String,
    pub remote_logo_rate: String,
}

impl DashboardCharts {
    pub fn render(table: &ScoredTable) -> Result<Self> {
        Ok(Self {
            prediction_split: prediction_split(table)?,
            probability_distribution: probability_distribution(table)?,
            fraud_locations: fraud_locations(table)?,
            description_length: description_length(table)?,
            remote_logo_rate: remote_logo_rate(table)?,
        })
    }
}

fn render_svg<F>(size: (u32, u32), draw: F) -> Result<String>
where
    F: FnOnce(&DrawingArea<SVGBackend<'_>, Shift>) -> DrawResult,
{
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, size).into_drawing_area();
        root.fill(&WHITE).map_err(chart_error)?;
        draw(&root).map_err(chart_error)?;
        root.present().map_err(chart_error)?;
    }
    Ok(svg)
}

fn chart_error(err: impl std::fmt::Display) -> DashboardError {
    DashboardError::Chart(err.to_string())
}

fn centered(size: i32) -> TextStyle<'static> {
    (FONT, size)
        .into_font()
        .color(&BLACK)
        .pos(Pos::new(HPos::Center, VPos::Center))
}

fn draw_placeholder(root: &DrawingArea<SVGBackend<'_>, Shift>, title: &str) -> DrawResult {
    let (w, h) = root.dim_in_pixel();
    root.draw(&Text::new(title.to_string(), (w as i32 / 2, 20), centered(18)))?;
    root.draw(&Text::new(
        "No data".to_string(),
        (w as i32 / 2, h as i32 / 2),
        centered(14),
    ))?;
    Ok(())
}

/// Pie chart of predicted classes, slices labeled by class.
pub fn prediction_split(table: &ScoredTable) -> Result<String> {
    let counts = report::label_counts(table);
    let total: usize = counts.iter().map(|(_, c)| c).sum();

    render_svg((400, 400), |root| {
        if total == 0 {
            return draw_placeholder(root, "Prediction Split");
        }
        let (w, h) = root.dim_in_pixel();
        root.draw(&Text::new("Prediction Split".to_string(), (w as i32 / 2, 20), centered(18)))?;

        let (cx, cy) = (w as f64 / 2.0, h as f64 / 2.0 + 15.0);
        let radius = w.min(h) as f64 * 0.33;
        let mut start = -PI / 2.0;

        for (label, count) in &counts {
            let share = *count as f64 / total as f64;
            let sweep = 2.0 * PI * share;
            let steps = ((sweep * 40.0) as usize).max(2);

            let mut points = vec![(cx as i32, cy as i32)];
            points.extend((0..=steps).map(|s| {
                let a = start + sweep * s as f64 / steps as f64;
                ((cx + radius * a.cos()) as i32, (cy + radius * a.sin()) as i32)
            }));
            root.draw(&Polygon::new(points, label_color(*label).filled()))?;

            let mid = start + sweep / 2.0;
            let at = |r: f64| ((cx + r * mid.cos()) as i32, (cy + r * mid.sin()) as i32);
            root.draw(&Text::new(
                label.display_name().to_string(),
                at(radius * 1.18),
                centered(14),
            ))?;
            root.draw(&Text::new(
                format!("{:.1}%", share * 100.0),
                at(radius * 0.6),
                centered(14).color(&WHITE),
            ))?;

            start += sweep;
        }
        Ok(())
    })
}

/// Histogram of fraud probabilities with a density overlay.
pub fn probability_distribution(table: &ScoredTable) -> Result<String> {
    let histogram = Histogram::new(table.probabilities(), HISTOGRAM_BINS);

    render_svg((800, 400), |root| {
        let (lo, hi) = match (histogram.edges.first(), histogram.edges.last()) {
            (Some(&lo), Some(&hi)) => (lo, hi),
            _ => return draw_placeholder(root, "Distribution of Fraud Scores"),
        };
        let peak = histogram
            .counts
            .iter()
            .map(|&c| c as f64)
            .chain(histogram.density.iter().map(|&(_, d)| d))
            .fold(1.0, f64::max);

        let mut chart = ChartBuilder::on(root)
            .caption("Distribution of Fraud Scores", (FONT, 20))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(lo..hi, 0f64..peak * 1.1)?;
        chart
            .configure_mesh()
            .x_desc("Fraud Probability")
            .y_desc("Count")
            .draw()?;

        chart.draw_series(histogram.counts.iter().enumerate().map(|(i, &c)| {
            Rectangle::new(
                [(histogram.edges[i], 0.0), (histogram.edges[i + 1], c as f64)],
                PURPLE.mix(0.45).filled(),
            )
        }))?;
        if !histogram.density.is_empty() {
            chart.draw_series(LineSeries::new(
                histogram.density.iter().copied(),
                PURPLE.stroke_width(2),
            ))?;
        }
        Ok(())
    })
}

/// Horizontal bars of the locations with the most predicted fraud.
pub fn fraud_locations(table: &ScoredTable) -> Result<String> {
    let locations = report::top_fraud_locations(table, TOP_N);
    let title = "Top 10 Locations with Most Predicted Fraud Jobs";

    render_svg((800, 400), |root| {
        if locations.is_empty() {
            return draw_placeholder(root, title);
        }
        let k = locations.len() as u32;
        let max = locations.iter().map(|(_, c)| *c).max().unwrap_or(1) as f64;
        // rank 0 is drawn at the top
        let name_at = |slot: u32| -> String {
            if slot >= k {
                return String::new();
            }
            locations
                .get((k - 1 - slot) as usize)
                .map(|(name, _)| truncate(name, 28))
                .unwrap_or_default()
        };

        let mut chart = ChartBuilder::on(root)
            .caption(title, (FONT, 20))
            .margin(10)
            .x_label_area_size(35)
            .y_label_area_size(190)
            .build_cartesian_2d(0f64..max * 1.1, (0u32..k).into_segmented())?;
        chart
            .configure_mesh()
            .disable_y_mesh()
            .y_labels(k as usize * 2 + 2)
            .x_desc("Predicted fraud listings")
            .y_label_formatter(&|v| match v {
                SegmentValue::CenterOf(slot) => name_at(*slot),
                _ => String::new(),
            })
            .draw()?;

        chart.draw_series(locations.iter().enumerate().map(|(rank, (_, count))| {
            let slot = k - 1 - rank as u32;
            // darker red for higher rank
            let shade = 0.45 + 0.55 * (1.0 - rank as f64 / k as f64);
            Rectangle::new(
                [
                    (0.0, SegmentValue::Exact(slot)),
                    (*count as f64, SegmentValue::Exact(slot + 1)),
                ],
                FRAUD_COLOR.mix(shade).filled(),
            )
        }))?;
        Ok(())
    })
}

/// Scatter of description length against probability, colored by label.
pub fn description_length(table: &ScoredTable) -> Result<String> {
    let points = report::description_points(table);
    let title = "Fraud Probability by Description Length";

    render_svg((800, 400), |root| {
        if points.is_empty() {
            return draw_placeholder(root, title);
        }
        let max_len = points.iter().map(|(len, _, _)| *len).max().unwrap_or(0).max(1) as f64;

        let mut chart = ChartBuilder::on(root)
            .caption(title, (FONT, 20))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(0f64..max_len * 1.05, 0f64..1.0)?;
        chart
            .configure_mesh()
            .x_desc("desc_length")
            .y_desc("fraud_probability")
            .draw()?;

        for label in [PredictedLabel::Real, PredictedLabel::Fraud] {
            let color = label_color(label);
            chart
                .draw_series(
                    points
                        .iter()
                        .filter(|(_, _, l)| *l == label)
                        .map(|(len, p, _)| {
                            Circle::new((*len as f64, *p), 3, color.mix(0.6).filled())
                        }),
                )?
                .label(label.as_u8().to_string())
                .legend(move |(x, y)| Circle::new((x + 8, y), 4, color.filled()));
        }
        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .position(SeriesLabelPosition::UpperRight)
            .draw()?;
        Ok(())
    })
}

/// Bar chart of fraud rate per remote/logo combination.
pub fn remote_logo_rate(table: &ScoredTable) -> Result<String> {
    let rates = report::fraud_rate_by_combo(table);
    let title = "Fraud Rate by Remote + Logo Combo";

    render_svg((600, 400), |root| {
        if rates.is_empty() {
            return draw_placeholder(root, title);
        }
        let k = rates.len() as u32;

        let mut chart = ChartBuilder::on(root)
            .caption(title, (FONT, 20))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d((0u32..k).into_segmented(), 0f64..1.05)?;
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(k as usize * 2 + 2)
            .x_desc("telecommuting_has_company_logo")
            .y_desc("Fraud rate")
            .x_label_formatter(&|v| match v {
                SegmentValue::CenterOf(i) => rates
                    .get(*i as usize)
                    .map(|(key, _)| key.clone())
                    .unwrap_or_default(),
                _ => String::new(),
            })
            .draw()?;

        chart.draw_series(rates.iter().enumerate().map(|(i, (_, rate))| {
            let i = i as u32;
            let mut bar = Rectangle::new(
                [(SegmentValue::Exact(i), 0.0), (SegmentValue::Exact(i + 1), *rate)],
                ORANGE.filled(),
            );
            bar.set_margin(0, 0, 8, 8);
            bar
        }))?;
        Ok(())
    })
}

/// Horizontal bars of the largest attributions, with the remaining features
/// folded into one bar.
pub fn attribution_chart(explanation: &Explanation, max_features: usize) -> Result<String> {
    let shown = max_features.max(1).min(explanation.contributions.len());
    let mut bars: Vec<(String, f64)> = explanation.contributions[..shown]
        .iter()
        .map(|c| {
            let label = format!("{} = {}", truncate(&c.feature, 24), format_value(c.value));
            (label, c.attribution)
        })
        .collect();
    let rest = &explanation.contributions[shown..];
    if !rest.is_empty() {
        bars.push((
            format!("{} other features", rest.len()),
            rest.iter().map(|c| c.attribution).sum(),
        ));
    }

    let title = format!(
        "f(x) = {:.3}  (base value {:.3})",
        explanation.prediction, explanation.base_value
    );
    let height = 90 + 26 * bars.len().max(1) as u32;

    render_svg((800, height), |root| {
        if bars.is_empty() {
            return draw_placeholder(root, &title);
        }
        let k = bars.len() as u32;
        let extent = bars.iter().map(|(_, v)| v.abs()).fold(1e-6, f64::max) * 1.1;
        let name_at = |slot: u32| -> String {
            if slot >= k {
                return String::new();
            }
            bars.get((k - 1 - slot) as usize)
                .map(|(name, _)| name.clone())
                .unwrap_or_default()
        };

        let mut chart = ChartBuilder::on(root)
            .caption(title.as_str(), (FONT, 18))
            .margin(10)
            .x_label_area_size(35)
            .y_label_area_size(240)
            .build_cartesian_2d(-extent..extent, (0u32..k).into_segmented())?;
        chart
            .configure_mesh()
            .disable_y_mesh()
            .y_labels(k as usize * 2 + 2)
            .x_desc("Contribution to fraud probability")
            .y_label_formatter(&|v| match v {
                SegmentValue::CenterOf(slot) => name_at(*slot),
                _ => String::new(),
            })
            .draw()?;

        chart.draw_series(bars.iter().enumerate().map(|(rank, (_, value))| {
            let slot = k - 1 - rank as u32;
            let color = if *value >= 0.0 { FRAUD_COLOR } else { PUSH_DOWN_COLOR };
            let mut bar = Rectangle::new(
                [
                    (0.0, SegmentValue::Exact(slot)),
                    (*value, SegmentValue::Exact(slot + 1)),
                ],
                color.filled(),
            );
            bar.set_margin(3, 3, 0, 0);
            bar
        }))?;
        Ok(())
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn format_value(value: f32) -> String {
    if value.is_nan() {
        "missing".to_string()
    } else if value.fract() == 0.0 && value.abs() < 1e7 {
        format!("{}", value as i64)
    } else {
        format!("{:.3}", value)
    }
}
