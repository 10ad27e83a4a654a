//! Job Fraud Dashboard - Main Entry Point
//!
//! Loads the classifier once, then serves the upload and dashboard pages.
//! Usage: `job_fraud_dashboard [config.toml]`

use anyhow::{Context, Result};
use job_fraud_dashboard::{
    config::{AppConfig, LoggingConfig},
    metrics::{DashboardMetrics, MetricsReporter},
    models::shared_model,
    server::{AppState, DashboardServer},
};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1);
    let (config, source) = match config_path.as_deref() {
        Some(path) => (
            AppConfig::load_from_path(path)
                .with_context(|| format!("Failed to load configuration from {}", path))?,
            path.to_string(),
        ),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            (AppConfig::load()?, DEFAULT_CONFIG_PATH.to_string())
        }
        None => (AppConfig::default(), "built-in defaults".to_string()),
    };

    init_logging(&config.logging)?;

    info!("Starting Job Fraud Dashboard");
    info!("Configuration loaded from {}", source);
    info!(
        "Threshold: {:.2}, join: {:?}, processed features: {}",
        config.scoring.threshold, config.scoring.join, config.data.processed_features_path
    );
    if !Path::new(&config.data.processed_features_path).exists() {
        warn!(
            path = %config.data.processed_features_path,
            "Processed feature file not found; uploads will fail until it exists"
        );
    }

    // Any load failure is fatal before the server binds
    let classifier = shared_model(&config.model)
        .with_context(|| format!("Failed to load model artifact {}", config.model.path))?;
    info!("Classifier '{}' ready", classifier.name());

    let metrics = Arc::new(DashboardMetrics::new());
    let reporter = MetricsReporter::new(metrics.clone(), config.metrics.report_interval_secs);
    tokio::spawn(reporter.start());

    let server = DashboardServer::new(AppState::new(config, classifier, metrics.clone()));
    let result = server.run().await;

    info!("Dashboard shutting down...");
    metrics.print_summary();

    result
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("job_fraud_dashboard={}", logging.level).parse()?)
        .add_directive(format!("tower_http={}", logging.level).parse()?);

    if logging.format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}
