//! Page-level errors and their HTTP rendering

use super::templates::IndexTemplate;
use crate::error::DashboardError;
use askama::Template;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Dashboard(#[from] DashboardError),

    #[error("{0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Dashboard(e) if e.is_input_error() => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Dashboard(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<tokio::task::JoinError> for ServerError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("worker task failed: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

/// Render a template, falling back to a plain 500 if rendering fails.
pub fn render<T: Template>(status: StatusCode, template: &T) -> Response {
    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            error!(error = %e, "Template rendering failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "template rendering failed").into_response()
        }
    }
}

/// Failures render the upload page with a single `Error:` message.
pub struct ErrorPage {
    pub model_name: String,
    pub error: ServerError,
}

impl IntoResponse for ErrorPage {
    fn into_response(self) -> Response {
        let status = self.error.status();
        let page = IndexTemplate {
            model_name: self.model_name,
            error: Some(format!("Error: {}", self.error)),
        };
        render(status, &page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let input = ServerError::from(DashboardError::Schema("missing title".into()));
        assert_eq!(input.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let model = ServerError::from(DashboardError::Model("bad output".into()));
        assert_eq!(model.status(), StatusCode::INTERNAL_SERVER_ERROR);

        assert_eq!(
            ServerError::NotFound("batch".into()).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_error_message_passes_through() {
        let err = ServerError::from(DashboardError::Alignment("too short".into()));
        assert_eq!(err.to_string(), "alignment failed: too short");
    }
}
