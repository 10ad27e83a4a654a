//! Batch inference on an ONNX classifier

use crate::error::{DashboardError, Result};
use crate::features::FeatureMatrix;
use crate::models::loader::LoadedModel;
use crate::models::Classifier;
use ort::memory::Allocator;
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, Tensor};
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, warn};

/// ONNX Runtime classifier. A session run needs exclusive access, so
/// concurrent callers are serialized on the mutex.
pub struct OnnxClassifier {
    name: String,
    model: Mutex<LoadedModel>,
}

impl OnnxClassifier {
    pub fn new(model: LoadedModel) -> Self {
        Self {
            name: model.name.clone(),
            model: Mutex::new(model),
        }
    }
}

impl Classifier for OnnxClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict_proba(&self, batch: &FeatureMatrix) -> Result<Vec<f64>> {
        let n_rows = batch.n_rows();
        if n_rows == 0 {
            return Ok(Vec::new());
        }
        let start = Instant::now();

        // Prepare input tensor - shape [n_rows, num_features]
        let shape = vec![n_rows as i64, batch.feature_count() as i64];
        let input_tensor = Tensor::from_array((shape, batch.values().to_vec()))
            .map_err(|e| DashboardError::Model(format!("Failed to create input tensor: {}", e)))?;

        let mut guard = self
            .model
            .lock()
            .map_err(|e| DashboardError::Model(format!("Lock error: {}", e)))?;
        let model: &mut LoadedModel = &mut guard;

        let outputs = model
            .session
            .run(ort::inputs![&model.input_name => input_tensor])
            .map_err(|e| DashboardError::Model(e.to_string()))?;

        let probabilities = extract_probabilities(&outputs, &model.output_name, n_rows)?;

        debug!(
            model = %self.name,
            rows = n_rows,
            elapsed_us = start.elapsed().as_micros() as u64,
            "Batch inference complete"
        );

        Ok(probabilities)
    }
}

/// Extract class-1 probabilities for every row.
///
/// Handles tensor outputs (XGBoost, Random Forest) and seq(map) outputs
/// (CatBoost, LightGBM).
fn extract_probabilities(
    outputs: &ort::session::SessionOutputs,
    output_name: &str,
    n_rows: usize,
) -> Result<Vec<f64>> {
    if let Some(output) = outputs.get(output_name) {
        let dtype = output.dtype();

        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            return probabilities_from_tensor(&shape, data, n_rows);
        }

        if DynSequenceValueType::can_downcast(&dtype) {
            return probabilities_from_sequence_map(output, n_rows);
        }
    }

    // Fallback: iterate all outputs and try extraction
    for (name, output) in outputs.iter() {
        if name.contains("label") {
            continue;
        }

        let dtype = output.dtype();

        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            debug!(output = %name, "Extracting probabilities from fallback output");
            return probabilities_from_tensor(&shape, data, n_rows);
        }

        if DynSequenceValueType::can_downcast(&dtype) {
            if let Ok(probs) = probabilities_from_sequence_map(&output, n_rows) {
                return Ok(probs);
            }
        }
    }

    warn!(output = %output_name, "No usable probability output");
    Err(DashboardError::Model(format!(
        "model produced no probability output named '{}'",
        output_name
    )))
}

/// Read fraud probabilities from a `[n, classes]`, `[n, 1]` or `[n]` tensor.
fn probabilities_from_tensor(
    shape: &ort::tensor::Shape,
    data: &[f32],
    n_rows: usize,
) -> Result<Vec<f64>> {
    let dims: Vec<i64> = shape.iter().copied().collect();
    probabilities_from_dims(&dims, data, n_rows)
}

fn probabilities_from_dims(dims: &[i64], data: &[f32], n_rows: usize) -> Result<Vec<f64>> {
    let shape_error = || {
        DashboardError::Model(format!(
            "unexpected output shape {:?} for {} rows",
            dims, n_rows
        ))
    };

    match dims {
        [rows, classes] if *rows as usize == n_rows && *classes >= 1 => {
            let classes = *classes as usize;
            if data.len() < n_rows * classes {
                return Err(shape_error());
            }
            // [batch, num_classes] - fraud class is index 1
            let column = if classes >= 2 { 1 } else { 0 };
            Ok((0..n_rows)
                .map(|i| data[i * classes + column] as f64)
                .collect())
        }
        [rows] if *rows as usize == n_rows && data.len() >= n_rows => {
            Ok(data[..n_rows].iter().map(|&v| v as f64).collect())
        }
        _ => Err(shape_error()),
    }
}

/// Extract probabilities from seq(map(int64, float)), one map per row
fn probabilities_from_sequence_map(
    output: &ort::value::DynValue,
    n_rows: usize,
) -> Result<Vec<f64>> {
    let allocator = Allocator::default();

    let sequence = output
        .downcast_ref::<DynSequenceValueType>()
        .map_err(|e| DashboardError::Model(format!("Failed to downcast to sequence: {}", e)))?;

    let maps = sequence
        .try_extract_sequence::<DynMapValueType>(&allocator)
        .map_err(|e| DashboardError::Model(e.to_string()))?;

    if maps.len() != n_rows {
        return Err(DashboardError::Model(format!(
            "sequence output has {} entries for {} rows",
            maps.len(),
            n_rows
        )));
    }

    maps.iter()
        .map(|map_value| {
            let kv_pairs = map_value
                .try_extract_key_values::<i64, f32>()
                .map_err(|e| DashboardError::Model(e.to_string()))?;
            class_one_probability(&kv_pairs)
        })
        .collect()
}

fn class_one_probability(kv_pairs: &[(i64, f32)]) -> Result<f64> {
    if let Some((_, prob)) = kv_pairs.iter().find(|(class_id, _)| *class_id == 1) {
        return Ok(*prob as f64);
    }
    // binary model that only reported class 0
    if let Some((_, prob)) = kv_pairs.iter().find(|(class_id, _)| *class_id == 0) {
        return Ok(1.0 - *prob as f64);
    }
    Err(DashboardError::Model(
        "No probability found in map".to_string(),
    ))
}
