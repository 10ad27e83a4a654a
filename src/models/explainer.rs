//! Per-listing feature attribution.
//!
//! Shapley values are estimated by permutation sampling: for each sampled
//! feature ordering, features of the explained row are switched in one at a
//! time on top of a background row, and each feature is credited with the
//! change in model output its switch caused. Averaged over orderings this
//! converges to the Shapley value against the background distribution.
//!
//! Per ordering the credits telescope to `f(x) - f(background)`, so the
//! reported attributions always sum to `prediction - base_value`.

use crate::config::ExplainConfig;
use crate::error::{DashboardError, Result};
use crate::features::FeatureMatrix;
use crate::models::Classifier;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info};

/// Contribution of one feature to one prediction
#[derive(Debug, Clone, Serialize)]
pub struct FeatureContribution {
    pub feature: String,
    /// Value of the feature in the explained row
    pub value: f32,
    pub attribution: f64,
}

/// Attribution result for a single row
#[derive(Debug, Clone, Serialize)]
pub struct Explanation {
    pub row: usize,
    /// Model output for the explained row
    pub prediction: f64,
    /// Mean model output over the sampled background rows
    pub base_value: f64,
    /// Sorted by absolute attribution, largest first
    pub contributions: Vec<FeatureContribution>,
}

impl Explanation {
    pub fn attribution_sum(&self) -> f64 {
        self.contributions.iter().map(|c| c.attribution).sum()
    }

    /// Contributions pushing the prediction up
    pub fn positive(&self) -> impl Iterator<Item = &FeatureContribution> {
        self.contributions.iter().filter(|c| c.attribution > 0.0)
    }

    /// Contributions pushing the prediction down
    pub fn negative(&self) -> impl Iterator<Item = &FeatureContribution> {
        self.contributions.iter().filter(|c| c.attribution < 0.0)
    }
}

/// Feature values sent to the model in one call (16 MiB of f32)
pub const MAX_BATCH_VALUES: usize = 1 << 22;

/// Permutation-sampling Shapley explainer over any [`Classifier`]
pub struct PermutationExplainer<'a> {
    classifier: &'a dyn Classifier,
    permutations: usize,
    background_rows: usize,
    seed: u64,
    max_batch_values: usize,
}

impl<'a> PermutationExplainer<'a> {
    pub fn new(classifier: &'a dyn Classifier, config: &ExplainConfig) -> Self {
        Self {
            classifier,
            permutations: config.permutations.max(1),
            background_rows: config.background_rows.max(1),
            seed: config.seed,
            max_batch_values: MAX_BATCH_VALUES,
        }
    }

    /// Cap the feature values evaluated per model call. At least one row is
    /// always sent.
    pub fn with_max_batch_values(mut self, max_batch_values: usize) -> Self {
        self.max_batch_values = max_batch_values;
        self
    }

    /// Explain `row` of `features`, drawing background rows from the same
    /// matrix.
    pub fn explain(&self, features: &FeatureMatrix, row: usize) -> Result<Explanation> {
        let start = Instant::now();
        let n_rows = features.n_rows();
        let target = features.row(row).ok_or_else(|| {
            DashboardError::Attribution(format!(
                "row index {} is out of range (0..{})",
                row, n_rows
            ))
        })?;
        let width = features.feature_count();
        if width == 0 {
            return Err(DashboardError::Attribution(
                "feature matrix has no columns".to_string(),
            ));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let background =
            rand::seq::index::sample(&mut rng, n_rows, self.background_rows.min(n_rows)).into_vec();

        // Each permutation contributes its background row followed by one row
        // per feature switched in from the target. Switches that leave the row
        // unchanged add no row and earn no credit. Rows are evaluated in
        // chunks so wide feature files stay within the batch budget.
        let mut predictor = ChunkedPredictor::new(
            self.classifier,
            features.feature_names(),
            (self.max_batch_values / width).max(1),
        );
        let mut order: Vec<usize> = (0..width).collect();
        let mut walks: Vec<(usize, Vec<usize>)> = Vec::with_capacity(self.permutations);
        let mut offset = 0usize;
        for p in 0..self.permutations {
            order.shuffle(&mut rng);
            let reference = features
                .row(background[p % background.len()])
                .ok_or_else(|| DashboardError::Attribution("background row vanished".into()))?;

            let mut current = reference.to_vec();
            predictor.push(&current)?;
            let mut switched = Vec::with_capacity(width);
            for &j in &order {
                if !same_value(current[j], target[j]) {
                    current[j] = target[j];
                    predictor.push(&current)?;
                    switched.push(j);
                }
            }
            let rows = switched.len() + 1;
            walks.push((offset, switched));
            offset += rows;
        }
        let (outputs, calls) = predictor.finish()?;

        let mut totals = vec![0.0f64; width];
        let mut base_sum = 0.0;
        let mut prediction_sum = 0.0;
        for (first, switched) in &walks {
            let walk = &outputs[*first..*first + switched.len() + 1];
            base_sum += walk[0];
            for (step, &j) in switched.iter().enumerate() {
                totals[j] += walk[step + 1] - walk[step];
            }
            prediction_sum += walk[switched.len()];
        }

        let m = self.permutations as f64;
        let mut contributions: Vec<FeatureContribution> = features
            .feature_names()
            .iter()
            .zip(target)
            .zip(&totals)
            .map(|((name, &value), &total)| FeatureContribution {
                feature: name.clone(),
                value,
                attribution: total / m,
            })
            .collect();
        // stable: equal magnitudes keep column order
        contributions.sort_by(|a, b| b.attribution.abs().total_cmp(&a.attribution.abs()));

        let explanation = Explanation {
            row,
            prediction: prediction_sum / m,
            base_value: base_sum / m,
            contributions,
        };

        debug!(row, evaluated_rows = outputs.len(), calls, "Attribution rows evaluated");
        info!(
            model = %self.classifier.name(),
            row,
            features = width,
            permutations = self.permutations,
            prediction = explanation.prediction,
            base_value = explanation.base_value,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Explanation computed"
        );

        Ok(explanation)
    }
}

/// Buffers rows and sends them to the classifier `rows_per_call` at a time,
/// keeping outputs in push order.
struct ChunkedPredictor<'a> {
    classifier: &'a dyn Classifier,
    names: &'a [String],
    rows_per_call: usize,
    pending: Vec<f32>,
    pending_rows: usize,
    outputs: Vec<f64>,
    calls: usize,
}

impl<'a> ChunkedPredictor<'a> {
    fn new(classifier: &'a dyn Classifier, names: &'a [String], rows_per_call: usize) -> Self {
        Self {
            classifier,
            names,
            rows_per_call,
            pending: Vec::new(),
            pending_rows: 0,
            outputs: Vec::new(),
            calls: 0,
        }
    }

    fn push(&mut self, row: &[f32]) -> Result<()> {
        self.pending.extend_from_slice(row);
        self.pending_rows += 1;
        if self.pending_rows >= self.rows_per_call {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.pending_rows == 0 {
            return Ok(());
        }
        let batch = FeatureMatrix::new(self.names.to_vec(), std::mem::take(&mut self.pending))?;
        self.pending_rows = 0;

        let outputs = self.classifier.predict_proba(&batch)?;
        if outputs.len() != batch.n_rows() {
            return Err(DashboardError::Model(format!(
                "classifier returned {} outputs for {} rows",
                outputs.len(),
                batch.n_rows()
            )));
        }
        self.outputs.extend(outputs);
        self.calls += 1;
        Ok(())
    }

    fn finish(mut self) -> Result<(Vec<f64>, usize)> {
        self.flush()?;
        Ok((self.outputs, self.calls))
    }
}

fn same_value(a: f32, b: f32) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LinearClassifier;
    use std::collections::HashMap;

    fn config() -> ExplainConfig {
        ExplainConfig {
            permutations: 8,
            background_rows: 4,
            seed: 7,
            max_features_shown: 10,
        }
    }

    fn model() -> LinearClassifier {
        let mut weights = HashMap::new();
        weights.insert("urgent".to_string(), 2.0);
        weights.insert("logo".to_string(), -1.5);
        weights.insert("salary".to_string(), 0.0);
        LinearClassifier::new("lr", -1.0, weights)
    }

    fn features() -> FeatureMatrix {
        FeatureMatrix::new(
            vec!["urgent".into(), "logo".into(), "salary".into()],
            vec![
                1.0, 0.0, 3.0, //
                0.0, 1.0, 1.0, //
                0.0, 1.0, 2.0, //
                0.0, 1.0, 3.0, //
                0.0, 0.0, 4.0,
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_attributions_sum_to_prediction_minus_base() {
        let model = model();
        let explainer = PermutationExplainer::new(&model, &config());
        let exp = explainer.explain(&features(), 0).unwrap();

        let direct = model.predict_proba(&features()).unwrap()[0];
        assert!((exp.prediction - direct).abs() < 1e-9);
        assert!((exp.attribution_sum() - (exp.prediction - exp.base_value)).abs() < 1e-9);
        assert_eq!(exp.contributions.len(), 3);
    }

    #[test]
    fn test_zero_weight_feature_gets_no_credit() {
        let model = model();
        let exp = PermutationExplainer::new(&model, &config())
            .explain(&features(), 0)
            .unwrap();

        let salary = exp.contributions.iter().find(|c| c.feature == "salary").unwrap();
        assert!(salary.attribution.abs() < 1e-12);

        // urgent=1 against an all-zero background raises the score
        let urgent = exp.contributions.iter().find(|c| c.feature == "urgent").unwrap();
        assert!(urgent.attribution > 0.0);
        assert!(exp.positive().any(|c| c.feature == "urgent"));
        assert!(exp.negative().next().is_none());
        assert!(exp
            .contributions
            .windows(2)
            .all(|w| w[0].attribution.abs() >= w[1].attribution.abs()));
    }

    #[test]
    fn test_single_feature_is_exact() {
        let mut weights = HashMap::new();
        weights.insert("a".to_string(), 1.0);
        let model = LinearClassifier::new("lr", 0.0, weights);
        let m = FeatureMatrix::new(vec!["a".into()], vec![2.0, 0.0]).unwrap();

        let cfg = ExplainConfig {
            permutations: 2,
            background_rows: 1,
            seed: 1,
            max_features_shown: 5,
        };
        let exp = PermutationExplainer::new(&model, &cfg).explain(&m, 0).unwrap();
        let expected = exp.prediction - exp.base_value;
        assert!((exp.contributions[0].attribution - expected).abs() < 1e-12);
    }

    #[test]
    fn test_deterministic_for_fixed_seed() {
        let model = model();
        let a = PermutationExplainer::new(&model, &config()).explain(&features(), 4).unwrap();
        let b = PermutationExplainer::new(&model, &config()).explain(&features(), 4).unwrap();
        let av: Vec<f64> = a.contributions.iter().map(|c| c.attribution).collect();
        let bv: Vec<f64> = b.contributions.iter().map(|c| c.attribution).collect();
        assert_eq!(av, bv);
    }

    #[test]
    fn test_row_out_of_range() {
        let model = model();
        let err = PermutationExplainer::new(&model, &config())
            .explain(&features(), 99)
            .unwrap_err();
        assert!(matches!(err, DashboardError::Attribution(_)));
        assert!(err.to_string().contains("out of range"));
    }

    /// Records the largest batch and the number of calls it sees
    struct Recording {
        inner: LinearClassifier,
        calls: std::sync::atomic::AtomicUsize,
        largest: std::sync::atomic::AtomicUsize,
    }

    impl Classifier for Recording {
        fn name(&self) -> &str {
            self.inner.name()
        }

        fn predict_proba(&self, batch: &FeatureMatrix) -> Result<Vec<f64>> {
            use std::sync::atomic::Ordering;
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.largest.fetch_max(batch.n_rows(), Ordering::Relaxed);
            self.inner.predict_proba(batch)
        }
    }

    #[test]
    fn test_wide_walks_are_split_across_calls() {
        use std::sync::atomic::Ordering;
        let recording = Recording {
            inner: model(),
            calls: Default::default(),
            largest: Default::default(),
        };

        // three features per row, so a budget of six values is two rows
        let chunked = PermutationExplainer::new(&recording, &config())
            .with_max_batch_values(6)
            .explain(&features(), 0)
            .unwrap();
        assert!(recording.largest.load(Ordering::Relaxed) <= 2);
        assert!(recording.calls.load(Ordering::Relaxed) > 1);

        let whole = PermutationExplainer::new(&model(), &config())
            .explain(&features(), 0)
            .unwrap();
        let a: Vec<f64> = chunked.contributions.iter().map(|c| c.attribution).collect();
        let b: Vec<f64> = whole.contributions.iter().map(|c| c.attribution).collect();
        assert_eq!(a, b);
        assert_eq!(chunked.base_value, whole.base_value);
    }
}
