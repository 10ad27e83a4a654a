//! Configuration management for the fraud dashboard

use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;

/// How uploaded raw rows are lined up with processed feature rows
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum JoinStrategy {
    /// Row i of the upload pairs with row i of the feature file
    #[default]
    Positional,
    /// Rows pair by the value of `scoring.join_key` in both files
    Key,
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub data: DataConfig,
    pub scoring: ScoringConfig,
    pub explain: ExplainConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the dashboard listens on
    pub bind_address: SocketAddr,
    /// Number of scored batches kept for row selection and download
    pub max_batches: usize,
    /// Maximum accepted upload size
    pub upload_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8501)),
            max_batches: 16,
            upload_limit_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Classifier artifact configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to the ONNX classifier
    pub path: String,
    /// Display name used in logs and on the page
    pub name: String,
    /// Number of threads for ONNX inference
    pub onnx_threads: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: "models/xgboost_model.onnx".to_string(),
            name: "xgboost".to_string(),
            onnx_threads: 1,
        }
    }
}

/// Location of the pre-engineered feature file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub processed_features_path: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            processed_features_path: "data/X_test_processed.csv".to_string(),
        }
    }
}

/// Scoring configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Probability at or above which a listing is labeled fraud
    pub threshold: f64,
    /// Row alignment between upload and feature file
    pub join: JoinStrategy,
    /// Column shared by both files when `join = "key"`
    pub join_key: Option<String>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            join: JoinStrategy::Positional,
            join_key: None,
        }
    }
}

/// Feature attribution configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExplainConfig {
    /// Random feature orderings sampled per explanation
    pub permutations: usize,
    /// Background rows drawn from the feature file
    pub background_rows: usize,
    /// Seed for permutation and background sampling
    pub seed: u64,
    /// Largest attributions shown in the chart
    pub max_features_shown: usize,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            permutations: 16,
            background_rows: 32,
            seed: 42,
            max_features_shown: 15,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Periodic metrics summary configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Seconds between summaries; 0 disables the reporter
    pub report_interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: 300,
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        let app: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        app.validate()?;
        Ok(app)
    }

    /// Reject combinations the scoring step cannot honor
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.scoring.threshold) {
            anyhow::bail!(
                "scoring.threshold must be within [0, 1], got {}",
                self.scoring.threshold
            );
        }
        if self.scoring.join == JoinStrategy::Key && self.scoring.join_key.is_none() {
            anyhow::bail!("scoring.join = \"key\" requires scoring.join_key");
        }
        if self.server.max_batches == 0 {
            anyhow::bail!("server.max_batches must be at least 1");
        }
        Ok(())
    }
}
