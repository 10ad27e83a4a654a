//! Job Fraud Dashboard Library
//!
//! Scores uploaded job-listing CSVs with a pre-trained classifier and serves
//! an HTML dashboard with summary panels, charts, per-listing feature
//! attributions and a predictions export.

pub mod charts;
pub mod config;
pub mod error;
pub mod export;
pub mod features;
pub mod metrics;
pub mod models;
pub mod report;
pub mod scoring;
pub mod server;
pub mod types;

pub use config::AppConfig;
pub use error::{DashboardError, Result};
pub use features::{FeatureMatrix, ProcessedFeatures};
pub use models::{shared_model, Classifier, LinearClassifier, OnnxClassifier};
pub use server::{AppState, DashboardServer};
pub use types::{PredictedLabel, RawTable, ScoredBatch, ScoredTable};
