//! Page templates and the view models they render

use crate::charts::DashboardCharts;
use crate::models::Explanation;
use crate::report::{RankedListing, Summary};
use crate::types::ScoredBatch;
use askama::Template;

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub model_name: String,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub model_name: String,
    pub batch: BatchView,
    pub summary: Summary,
    pub fraud_pct: String,
    pub top: Vec<RankedRow>,
    pub charts: DashboardCharts,
    /// Last requested row, echoed back into the selector
    pub row_value: String,
    pub max_row: usize,
    pub explanation: Option<ExplanationView>,
    pub shap_error: Option<String>,
}

pub struct BatchView {
    pub id: String,
    pub source_name: String,
    pub created_at: String,
    pub threshold: String,
    pub dropped_rows: usize,
}

impl From<&ScoredBatch> for BatchView {
    fn from(batch: &ScoredBatch) -> Self {
        Self {
            id: batch.id.to_string(),
            source_name: batch.source_name.clone(),
            created_at: batch.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            threshold: format!("{:.2}", batch.threshold),
            dropped_rows: batch.dropped_rows,
        }
    }
}

pub struct RankedRow {
    pub row: usize,
    pub title: String,
    pub location: String,
    pub probability: String,
}

impl From<RankedListing> for RankedRow {
    fn from(r: RankedListing) -> Self {
        Self {
            row: r.row,
            title: r.title,
            location: r.location,
            probability: format!("{:.4}", r.fraud_probability),
        }
    }
}

pub struct ExplanationView {
    pub row: usize,
    pub title: String,
    pub prediction: String,
    pub base_value: String,
    pub chart: String,
    pub contributions: Vec<ContributionRow>,
}

pub struct ContributionRow {
    pub feature: String,
    pub value: String,
    pub attribution: String,
    pub positive: bool,
}

impl ExplanationView {
    pub fn new(explanation: &Explanation, title: &str, chart: String, max_rows: usize) -> Self {
        let contributions = explanation
            .contributions
            .iter()
            .take(max_rows)
            .map(|c| ContributionRow {
                feature: c.feature.clone(),
                value: if c.value.is_nan() {
                    "missing".to_string()
                } else {
                    format!("{}", c.value)
                },
                attribution: format!("{:+.4}", c.attribution),
                positive: c.attribution > 0.0,
            })
            .collect();

        Self {
            row: explanation.row,
            title: title.to_string(),
            prediction: format!("{:.4}", explanation.prediction),
            base_value: format!("{:.4}", explanation.base_value),
            chart,
            contributions,
        }
    }
}
