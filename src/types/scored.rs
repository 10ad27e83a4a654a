//! Scored listings and batches

use crate::features::FeatureMatrix;
use crate::types::listing::{ListingColumns, RawTable};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Binary decision derived from a fraud probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictedLabel {
    Real,
    Fraud,
}

impl PredictedLabel {
    /// Threshold is inclusive: a probability equal to it is fraud.
    pub fn from_probability(probability: f64, threshold: f64) -> Self {
        if probability >= threshold {
            PredictedLabel::Fraud
        } else {
            PredictedLabel::Real
        }
    }

    /// Numeric form used in the export (0 = real, 1 = fraud)
    pub fn as_u8(self) -> u8 {
        match self {
            PredictedLabel::Real => 0,
            PredictedLabel::Fraud => 1,
        }
    }

    pub fn is_fraud(self) -> bool {
        self == PredictedLabel::Fraud
    }

    pub fn display_name(self) -> &'static str {
        match self {
            PredictedLabel::Real => "Real",
            PredictedLabel::Fraud => "Fraud",
        }
    }
}

/// Uploaded listings with model output appended.
///
/// All per-row vectors have the same length as `raw`.
#[derive(Debug, Clone)]
pub struct ScoredTable {
    raw: RawTable,
    columns: ListingColumns,
    probabilities: Vec<f64>,
    labels: Vec<PredictedLabel>,
    desc_lengths: Vec<usize>,
}

/// Borrowed view of one scored listing
#[derive(Debug, Clone, Copy)]
pub struct ScoredRow<'a> {
    table: &'a ScoredTable,
    pub index: usize,
    pub probability: f64,
    pub label: PredictedLabel,
    pub desc_length: usize,
}

impl ScoredTable {
    /// Attach probabilities to an aligned raw table.
    ///
    /// Panics in debug builds if the lengths disagree; callers align first.
    pub fn new(
        raw: RawTable,
        columns: ListingColumns,
        probabilities: Vec<f64>,
        threshold: f64,
    ) -> Self {
        debug_assert_eq!(raw.len(), probabilities.len());

        let labels = probabilities
            .iter()
            .map(|&p| PredictedLabel::from_probability(p, threshold))
            .collect();
        let desc_lengths = (0..raw.len())
            .map(|i| raw.cell(i, columns.description).chars().count())
            .collect();

        Self {
            raw,
            columns,
            probabilities,
            labels,
            desc_lengths,
        }
    }

    pub fn len(&self) -> usize {
        self.probabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probabilities.is_empty()
    }

    pub fn raw(&self) -> &RawTable {
        &self.raw
    }

    pub fn probabilities(&self) -> &[f64] {
        &self.probabilities
    }

    pub fn labels(&self) -> &[PredictedLabel] {
        &self.labels
    }

    pub fn row(&self, index: usize) -> Option<ScoredRow<'_>> {
        if index >= self.len() {
            return None;
        }
        Some(ScoredRow {
            table: self,
            index,
            probability: self.probabilities[index],
            label: self.labels[index],
            desc_length: self.desc_lengths[index],
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = ScoredRow<'_>> + '_ {
        (0..self.len()).filter_map(move |i| self.row(i))
    }
}

impl<'a> ScoredRow<'a> {
    fn cell(&self, column: usize) -> &'a str {
        self.table.raw.cell(self.index, column)
    }

    pub fn title(&self) -> &'a str {
        self.cell(self.table.columns.title)
    }

    pub fn location(&self) -> &'a str {
        self.cell(self.table.columns.location)
    }

    pub fn description(&self) -> &'a str {
        self.cell(self.table.columns.description)
    }

    pub fn telecommuting(&self) -> &'a str {
        self.cell(self.table.columns.telecommuting)
    }

    pub fn has_company_logo(&self) -> &'a str {
        self.cell(self.table.columns.has_company_logo)
    }
}

/// One scored upload held by the dashboard between interactions
#[derive(Debug, Clone)]
pub struct ScoredBatch {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Name of the uploaded file
    pub source_name: String,
    pub table: ScoredTable,
    /// Feature rows aligned with `table`
    pub features: FeatureMatrix,
    /// Raw rows with no processed partner
    pub dropped_rows: usize,
    pub threshold: f64,
}

impl ScoredBatch {
    pub fn new(
        source_name: String,
        table: ScoredTable,
        features: FeatureMatrix,
        dropped_rows: usize,
        threshold: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            source_name,
            table,
            features,
            dropped_rows,
            threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(probabilities: Vec<f64>) -> ScoredTable {
        let headers = ["title", "location", "description", "telecommuting", "has_company_logo"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let rows = probabilities
            .iter()
            .enumerate()
            .map(|(i, _)| {
                vec![
                    format!("job {}", i),
                    "US".to_string(),
                    "héllo".to_string(),
                    "0".to_string(),
                    "1".to_string(),
                ]
            })
            .collect();
        let raw = RawTable::new(headers, rows).unwrap();
        let cols = raw.listing_columns().unwrap();
        ScoredTable::new(raw, cols, probabilities, 0.5)
    }

    #[test]
    fn test_label_threshold_is_inclusive() {
        assert_eq!(PredictedLabel::from_probability(0.5, 0.5), PredictedLabel::Fraud);
        assert_eq!(
            PredictedLabel::from_probability(0.499_999, 0.5),
            PredictedLabel::Real
        );
        assert_eq!(PredictedLabel::from_probability(1.0, 0.5), PredictedLabel::Fraud);
    }

    #[test]
    fn test_scored_rows() {
        let t = table(vec![0.2, 0.5, 0.9]);
        let labels: Vec<u8> = t.rows().map(|r| r.label.as_u8()).collect();
        assert_eq!(labels, vec![0, 1, 1]);

        let row = t.row(2).unwrap();
        assert_eq!(row.title(), "job 2");
        assert_eq!(row.has_company_logo(), "1");
        // counts characters, not bytes
        assert_eq!(row.desc_length, 5);
        assert!(t.row(3).is_none());
    }
}
