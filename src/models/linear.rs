//! Logistic-regression classifier loaded from a JSON coefficient file

use crate::error::{DashboardError, Result};
use crate::features::FeatureMatrix;
use crate::models::Classifier;
use serde::Deserialize;
use std::collections::HashMap;

/// Logistic model: `sigmoid(intercept + sum(w_i * x_i))`.
///
/// Weights are keyed by feature name. Features without a weight contribute
/// nothing; missing values (NaN) contribute nothing.
#[derive(Debug, Clone, Deserialize)]
pub struct LinearClassifier {
    name: String,
    intercept: f64,
    weights: HashMap<String, f64>,
}

impl LinearClassifier {
    pub fn new(name: &str, intercept: f64, weights: HashMap<String, f64>) -> Self {
        Self {
            name: name.to_string(),
            intercept,
            weights,
        }
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Weight vector aligned with the batch's columns
    fn aligned_weights(&self, names: &[String]) -> Result<Vec<f64>> {
        if let Some(unknown) = self.weights.keys().find(|k| !names.contains(k)) {
            return Err(DashboardError::Model(format!(
                "model expects feature '{}' which the feature file does not provide",
                unknown
            )));
        }
        Ok(names
            .iter()
            .map(|n| self.weights.get(n).copied().unwrap_or(0.0))
            .collect())
    }
}

impl Classifier for LinearClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict_proba(&self, batch: &FeatureMatrix) -> Result<Vec<f64>> {
        let weights = self.aligned_weights(batch.feature_names())?;
        let width = batch.feature_count();
        if width == 0 {
            return Ok(vec![sigmoid(self.intercept); batch.n_rows()]);
        }

        Ok(batch
            .values()
            .chunks(width)
            .map(|row| {
                let logit = row
                    .iter()
                    .zip(&weights)
                    .filter(|(x, _)| !x.is_nan())
                    .fold(self.intercept, |acc, (&x, &w)| acc + x as f64 * w);
                sigmoid(logit)
            })
            .collect())
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}
