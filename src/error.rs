//! Error types for scoring and explaining uploaded listings

use thiserror::Error;

/// Errors raised while turning an upload into a scored batch.
#[derive(Debug, Error)]
pub enum DashboardError {
    /// The upload or feature file could not be parsed as CSV
    #[error("could not parse {source_name}: {message}")]
    Parse {
        source_name: String,
        message: String,
    },

    /// A required column is missing or a value has the wrong shape
    #[error("schema mismatch: {0}")]
    Schema(String),

    /// Raw and processed tables cannot be lined up
    #[error("alignment failed: {0}")]
    Alignment(String),

    /// The classifier rejected the input or returned an unusable output
    #[error("model inference failed: {0}")]
    Model(String),

    /// Feature attribution could not be computed
    #[error("{0}")]
    Attribution(String),

    /// A chart could not be drawn
    #[error("chart rendering failed: {0}")]
    Chart(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DashboardError {
    pub fn parse(source_name: &str, err: impl std::fmt::Display) -> Self {
        Self::Parse {
            source_name: source_name.to_string(),
            message: err.to_string(),
        }
    }

    /// Whether the error was caused by the uploaded data rather than the server.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. } | Self::Schema(_) | Self::Alignment(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;
