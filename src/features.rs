//! Processed feature matrix consumed by the classifier.
//!
//! The feature file is engineered outside this service. Every column is a
//! numeric model input, in the exact order the model expects; this module
//! only parses it into a dense row-major `f32` matrix.

use crate::error::{DashboardError, Result};
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Dense row-major feature matrix with named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    names: Vec<String>,
    values: Vec<f32>,
    n_rows: usize,
}

/// Feature file contents, with join keys when a key column was requested.
#[derive(Debug, Clone)]
pub struct ProcessedFeatures {
    pub matrix: FeatureMatrix,
    pub keys: Option<Vec<String>>,
}

impl FeatureMatrix {
    /// Build a matrix from column names and row-major values.
    pub fn new(names: Vec<String>, values: Vec<f32>) -> Result<Self> {
        if names.is_empty() {
            if values.is_empty() {
                return Ok(Self {
                    names,
                    values,
                    n_rows: 0,
                });
            }
            return Err(DashboardError::Schema(
                "feature matrix has values but no columns".to_string(),
            ));
        }
        if values.len() % names.len() != 0 {
            return Err(DashboardError::Schema(format!(
                "{} values do not fill rows of {} features",
                values.len(),
                names.len()
            )));
        }
        let n_rows = values.len() / names.len();
        Ok(Self {
            names,
            values,
            n_rows,
        })
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of features per row.
    pub fn feature_count(&self) -> usize {
        self.names.len()
    }

    /// Feature names in model input order.
    pub fn feature_names(&self) -> &[String] {
        &self.names
    }

    /// Row-major values.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn row(&self, index: usize) -> Option<&[f32]> {
        if index >= self.n_rows {
            return None;
        }
        let width = self.feature_count();
        Some(&self.values[index * width..(index + 1) * width])
    }

    /// Copy the given rows, in the given order, into a new matrix.
    pub fn select_rows(&self, indices: &[usize]) -> Result<Self> {
        let mut values = Vec::with_capacity(indices.len() * self.feature_count());
        for &i in indices {
            let row = self.row(i).ok_or_else(|| {
                DashboardError::Alignment(format!(
                    "row {} requested from a feature matrix of {} rows",
                    i, self.n_rows
                ))
            })?;
            values.extend_from_slice(row);
        }
        Self::new(self.names.clone(), values)
    }

    /// Per-column mean over non-missing values; all-missing columns yield 0.
    pub fn column_means(&self) -> Vec<f32> {
        let width = self.feature_count();
        let mut sums = vec![0.0f64; width];
        let mut counts = vec![0usize; width];
        for row in self.values.chunks(width.max(1)) {
            for (j, &v) in row.iter().enumerate() {
                if !v.is_nan() {
                    sums[j] += v as f64;
                    counts[j] += 1;
                }
            }
        }
        sums.iter()
            .zip(&counts)
            .map(|(&s, &c)| if c > 0 { (s / c as f64) as f32 } else { 0.0 })
            .collect()
    }
}

impl ProcessedFeatures {
    /// Load the feature file from disk.
    pub fn from_path<P: AsRef<Path>>(path: P, key_column: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            DashboardError::parse(&path.display().to_string(), format!("cannot open: {}", e))
        })?;
        Self::from_reader(file, &path.display().to_string(), key_column)
    }

    /// Parse a feature CSV. A `key_column`, when given, is split off as join
    /// keys and is not a model input.
    pub fn from_reader<R: Read>(
        reader: R,
        source_name: &str,
        key_column: Option<&str>,
    ) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let headers = rdr
            .headers()
            .map_err(|e| DashboardError::parse(source_name, e))?
            .clone();

        let key_index = match key_column {
            Some(key) => Some(headers.iter().position(|h| h == key).ok_or_else(|| {
                DashboardError::Schema(format!(
                    "join key column '{}' not found in {}",
                    key, source_name
                ))
            })?),
            None => None,
        };

        let names: Vec<String> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != key_index)
            .map(|(_, h)| h.to_string())
            .collect();
        if names.is_empty() {
            return Err(DashboardError::Schema(format!(
                "{} has no feature columns",
                source_name
            )));
        }

        let mut values = Vec::new();
        let mut keys = key_index.map(|_| Vec::new());

        for (row_idx, record) in rdr.records().enumerate() {
            let record = record.map_err(|e| DashboardError::parse(source_name, e))?;
            for (col_idx, cell) in record.iter().enumerate() {
                if Some(col_idx) == key_index {
                    if let Some(keys) = keys.as_mut() {
                        keys.push(cell.trim().to_string());
                    }
                    continue;
                }
                let value = parse_feature(cell).ok_or_else(|| {
                    DashboardError::Schema(format!(
                        "non-numeric value '{}' in feature '{}' at row {}",
                        cell, &headers[col_idx], row_idx
                    ))
                })?;
                values.push(value);
            }
        }

        let matrix = FeatureMatrix::new(names, values)?;
        debug!(
            source = %source_name,
            rows = matrix.n_rows(),
            features = matrix.feature_count(),
            "Feature file parsed"
        );

        Ok(Self { matrix, keys })
    }
}

/// Parse one feature cell. Empty and NaN-like cells are missing values;
/// boolean dummies map to 0/1.
fn parse_feature(cell: &str) -> Option<f32> {
    let cell = cell.trim();
    match cell {
        "" | "nan" | "NaN" | "NA" | "null" => Some(f32::NAN),
        "True" | "true" => Some(1.0),
        "False" | "false" => Some(0.0),
        _ => cell.parse::<f32>().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_feature_file() {
        let csv = "a,b,c\n1,2.5,True\n0,,False\n";
        let features = ProcessedFeatures::from_reader(csv.as_bytes(), "x.csv", None).unwrap();
        let m = &features.matrix;

        assert_eq!(m.n_rows(), 2);
        assert_eq!(m.feature_count(), 3);
        assert_eq!(m.row(0).unwrap(), &[1.0, 2.5, 1.0]);
        assert!(m.row(1).unwrap()[1].is_nan());
        assert!(m.row(2).is_none());
        assert!(features.keys.is_none());
    }

    #[test]
    fn test_key_column_is_not_a_feature() {
        let csv = "job_id,a,b\n17,1,2\n4,3,4\n";
        let features =
            ProcessedFeatures::from_reader(csv.as_bytes(), "x.csv", Some("job_id")).unwrap();

        assert_eq!(features.matrix.feature_names(), &["a", "b"]);
        assert_eq!(features.keys.unwrap(), vec!["17", "4"]);
        assert_eq!(features.matrix.row(1).unwrap(), &[3.0, 4.0]);
    }

    #[test]
    fn test_non_numeric_feature_is_schema_error() {
        let csv = "a,b\n1,hello\n";
        let err = ProcessedFeatures::from_reader(csv.as_bytes(), "x.csv", None).unwrap_err();
        assert!(matches!(err, DashboardError::Schema(_)));
    }

    #[test]
    fn test_missing_key_column() {
        let csv = "a,b\n1,2\n";
        let err =
            ProcessedFeatures::from_reader(csv.as_bytes(), "x.csv", Some("job_id")).unwrap_err();
        assert!(matches!(err, DashboardError::Schema(_)));
    }

    #[test]
    fn test_column_means_skip_missing() {
        let m = FeatureMatrix::new(
            vec!["a".into(), "b".into()],
            vec![1.0, f32::NAN, 3.0, 4.0],
        )
        .unwrap();
        assert_eq!(m.column_means(), vec![2.0, 4.0]);
    }

    #[test]
    fn test_select_rows() {
        let m = FeatureMatrix::new(vec!["a".into()], vec![1.0, 2.0, 3.0]).unwrap();
        let s = m.select_rows(&[2, 0]).unwrap();
        assert_eq!(s.values(), &[3.0, 1.0]);
        assert!(m.select_rows(&[3]).is_err());
    }
}
