//! Classifier loading, inference and attribution

pub mod explainer;
pub mod inference;
pub mod linear;
pub mod loader;

pub use explainer::{Explanation, FeatureContribution, PermutationExplainer};
pub use inference::OnnxClassifier;
pub use linear::LinearClassifier;
pub use loader::ModelLoader;

use crate::config::ModelConfig;
use crate::error::Result;
use crate::features::FeatureMatrix;
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// A binary classifier scoring feature rows for fraud.
pub trait Classifier: Send + Sync {
    /// Display name used in logs and on the page
    fn name(&self) -> &str;

    /// Probability of the fraud class, one value per input row.
    fn predict_proba(&self, batch: &FeatureMatrix) -> Result<Vec<f64>>;
}

/// One-time holder for the loaded classifier.
///
/// The first successful load is kept for the lifetime of the cache; later
/// calls return the same handle without touching the artifact again.
pub struct ModelCache {
    cell: OnceCell<Arc<dyn Classifier>>,
}

impl ModelCache {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    pub fn get_or_load(&self, config: &ModelConfig) -> anyhow::Result<Arc<dyn Classifier>> {
        self.cell
            .get_or_try_init(|| {
                ModelLoader::with_threads(config.onnx_threads).load_classifier(config)
            })
            .cloned()
    }

    pub fn get(&self) -> Option<Arc<dyn Classifier>> {
        self.cell.get().cloned()
    }
}

impl Default for ModelCache {
    fn default() -> Self {
        Self::new()
    }
}

static SHARED_MODEL: ModelCache = ModelCache::new();

/// Process-wide classifier, loaded on first use.
pub fn shared_model(config: &ModelConfig) -> anyhow::Result<Arc<dyn Classifier>> {
    SHARED_MODEL.get_or_load(config)
}
