//! HTTP dashboard: router setup and server loop

pub mod error;
pub mod handlers;
pub mod state;
pub mod templates;

pub use error::{ErrorPage, ServerError};
pub use state::{AppState, BatchStore};

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Dashboard server bound to one application state
pub struct DashboardServer {
    state: AppState,
}

impl DashboardServer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router
    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    /// Bind and serve until the process exits.
    pub async fn run(&self) -> anyhow::Result<()> {
        let addr: SocketAddr = self.state.config.server.bind_address;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Dashboard listening on http://{}", addr);

        axum::serve(listener, self.router()).await?;
        Ok(())
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }
}

pub fn router(state: AppState) -> Router {
    let upload_limit = state.config.server.upload_limit_bytes;

    Router::new()
        .route("/", get(handlers::index))
        .route("/upload", post(handlers::upload))
        .route("/batches/:id", get(handlers::dashboard))
        .route("/batches/:id/predictions.csv", get(handlers::download))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(upload_limit))
        .layer(TraceLayer::new_for_http())
}
