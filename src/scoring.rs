//! Scoring step: align an upload with its processed features and attach
//! model output.

use crate::config::{JoinStrategy, ScoringConfig};
use crate::error::{DashboardError, Result};
use crate::features::{FeatureMatrix, ProcessedFeatures};
use crate::models::Classifier;
use crate::types::{RawTable, ScoredBatch, ScoredTable};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{info, warn};

/// Raw and processed rows paired up, ready for inference
#[derive(Debug)]
pub struct AlignedRows {
    pub raw: RawTable,
    pub features: FeatureMatrix,
    /// Raw rows with no processed partner
    pub dropped_rows: usize,
}

/// Pair raw rows with processed feature rows.
pub fn align(
    raw: &RawTable,
    processed: &ProcessedFeatures,
    config: &ScoringConfig,
) -> Result<AlignedRows> {
    match config.join {
        JoinStrategy::Positional => align_positional(raw, &processed.matrix),
        JoinStrategy::Key => {
            let key = config.join_key.as_deref().ok_or_else(|| {
                DashboardError::Schema("key join configured without a join key".to_string())
            })?;
            let keys = processed.keys.as_deref().ok_or_else(|| {
                DashboardError::Schema(format!(
                    "feature file was loaded without the '{}' key column",
                    key
                ))
            })?;
            align_by_key(raw, &processed.matrix, keys, key)
        }
    }
}

/// Processed row i pairs with raw row i. Raw rows past the end of the
/// feature file are dropped; a shorter upload cannot be aligned.
fn align_positional(raw: &RawTable, features: &FeatureMatrix) -> Result<AlignedRows> {
    let n = features.n_rows();
    if raw.len() < n {
        return Err(DashboardError::Alignment(format!(
            "upload has {} rows but the feature file has {}; rows {}..{} have no listing",
            raw.len(),
            n,
            raw.len(),
            n
        )));
    }

    let indices: Vec<usize> = (0..n).collect();
    Ok(AlignedRows {
        raw: raw.select_rows(&indices)?,
        features: features.clone(),
        dropped_rows: raw.len() - n,
    })
}

/// Pair rows by key value, keeping upload order.
fn align_by_key(
    raw: &RawTable,
    features: &FeatureMatrix,
    keys: &[String],
    key_column: &str,
) -> Result<AlignedRows> {
    let raw_key = raw.column_index(key_column).ok_or_else(|| {
        DashboardError::Schema(format!(
            "join key column '{}' is missing from the upload",
            key_column
        ))
    })?;

    let mut by_key: HashMap<&str, usize> = HashMap::with_capacity(keys.len());
    for (i, key) in keys.iter().enumerate() {
        if by_key.insert(key.as_str(), i).is_some() {
            return Err(DashboardError::Schema(format!(
                "duplicate key '{}' in feature file",
                key
            )));
        }
    }

    let mut raw_rows = Vec::with_capacity(raw.len());
    let mut feature_rows = Vec::with_capacity(raw.len());
    for i in 0..raw.len() {
        if let Some(&f) = by_key.get(raw.cell(i, raw_key).trim()) {
            raw_rows.push(i);
            feature_rows.push(f);
        }
    }

    Ok(AlignedRows {
        raw: raw.select_rows(&raw_rows)?,
        features: features.select_rows(&feature_rows)?,
        dropped_rows: raw.len() - raw_rows.len(),
    })
}

/// Score an upload end to end: validate, align, infer, label.
pub fn score_upload(
    source_name: &str,
    raw: RawTable,
    processed: &ProcessedFeatures,
    classifier: &dyn Classifier,
    config: &ScoringConfig,
) -> Result<ScoredBatch> {
    let start = Instant::now();
    let columns = raw.listing_columns()?;
    let aligned = align(&raw, processed, config)?;

    if aligned.dropped_rows > 0 {
        warn!(
            source = %source_name,
            dropped = aligned.dropped_rows,
            uploaded = raw.len(),
            join = ?config.join,
            "Uploaded rows without processed features were dropped"
        );
    }

    let probabilities = classifier.predict_proba(&aligned.features)?;
    if probabilities.len() != aligned.raw.len() {
        return Err(DashboardError::Model(format!(
            "classifier returned {} probabilities for {} rows",
            probabilities.len(),
            aligned.raw.len()
        )));
    }
    if let Some(bad) = probabilities.iter().find(|p| !(0.0..=1.0).contains(*p)) {
        return Err(DashboardError::Model(format!(
            "classifier returned probability {} outside [0, 1]",
            bad
        )));
    }

    let table = ScoredTable::new(aligned.raw, columns, probabilities, config.threshold);
    let batch = ScoredBatch::new(
        source_name.to_string(),
        table,
        aligned.features,
        aligned.dropped_rows,
        config.threshold,
    );

    info!(
        batch_id = %batch.id,
        source = %source_name,
        model = %classifier.name(),
        rows = batch.table.len(),
        dropped = batch.dropped_rows,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Upload scored"
    );

    Ok(batch)
}
