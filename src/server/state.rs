//! Shared application state
//!
//! Holds the loaded classifier and the scored batches that row selection and
//! downloads refer back to.

use crate::config::AppConfig;
use crate::metrics::DashboardMetrics;
use crate::models::Classifier;
use crate::types::ScoredBatch;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use tracing::debug;
use uuid::Uuid;

/// State handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub classifier: Arc<dyn Classifier>,
    pub batches: Arc<BatchStore>,
    pub metrics: Arc<DashboardMetrics>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        classifier: Arc<dyn Classifier>,
        metrics: Arc<DashboardMetrics>,
    ) -> Self {
        let batches = Arc::new(BatchStore::new(config.server.max_batches));
        Self {
            config: Arc::new(config),
            classifier,
            batches,
            metrics,
        }
    }
}

/// Bounded in-memory store of scored batches, oldest evicted first
pub struct BatchStore {
    capacity: usize,
    inner: RwLock<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    batches: HashMap<Uuid, Arc<ScoredBatch>>,
    order: VecDeque<Uuid>,
}

impl BatchStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: RwLock::new(StoreInner::default()),
        }
    }

    /// Store a batch and return its shared handle.
    pub fn insert(&self, batch: ScoredBatch) -> Arc<ScoredBatch> {
        let batch = Arc::new(batch);
        // A poisoned lock only means another handler panicked mid-insert
        let mut inner = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        while inner.order.len() >= self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.batches.remove(&oldest);
                debug!(batch_id = %oldest, "Evicted scored batch");
            }
        }

        inner.order.push_back(batch.id);
        inner.batches.insert(batch.id, batch.clone());
        batch
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<ScoredBatch>> {
        let inner = match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        inner.batches.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.order.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
