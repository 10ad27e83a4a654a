//! HTTP request handlers, one per dashboard interaction

use super::error::{render, ErrorPage, Result, ServerError};
use super::state::AppState;
use super::templates::{BatchView, DashboardTemplate, ExplanationView, IndexTemplate, RankedRow};
use crate::charts::{attribution_chart, DashboardCharts};
use crate::config::{AppConfig, JoinStrategy};
use crate::error::DashboardError;
use crate::export::{to_csv, EXPORT_FILE_NAME};
use crate::features::ProcessedFeatures;
use crate::models::{Classifier, PermutationExplainer};
use crate::report::{top_suspicious, Summary, TOP_N};
use crate::scoring::score_upload;
use crate::types::{RawTable, ScoredBatch};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

const DEFAULT_SOURCE_NAME: &str = "upload.csv";

/// Landing page with the upload prompt
pub async fn index(State(state): State<AppState>) -> Response {
    let page = IndexTemplate {
        model_name: state.classifier.name().to_string(),
        error: None,
    };
    render(StatusCode::OK, &page)
}

/// Score an uploaded CSV and redirect to its dashboard.
pub async fn upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> std::result::Result<Redirect, ErrorPage> {
    match score_multipart(&state, multipart).await {
        Ok(id) => Ok(Redirect::to(&format!("/batches/{}", id))),
        Err(error) => {
            state.metrics.record_upload_failure();
            warn!(error = %error, "Upload rejected");
            Err(ErrorPage {
                model_name: state.classifier.name().to_string(),
                error,
            })
        }
    }
}

async fn score_multipart(state: &AppState, mut multipart: Multipart) -> Result<Uuid> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("could not read upload: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let source_name = field
            .file_name()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_SOURCE_NAME)
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(format!("could not read upload: {}", e)))?;

        info!(source = %source_name, bytes = data.len(), "Received upload");

        let config = state.config.clone();
        let classifier = state.classifier.clone();
        let start = Instant::now();
        let batch = tokio::task::spawn_blocking(move || {
            score_bytes(&source_name, &data, &config, classifier.as_ref())
        })
        .await??;

        let flagged = batch.table.labels().iter().filter(|l| l.is_fraud()).count();
        state
            .metrics
            .record_upload(start.elapsed(), batch.table.probabilities(), flagged);

        let batch = state.batches.insert(batch);
        return Ok(batch.id);
    }

    Err(ServerError::BadRequest("no file uploaded".to_string()))
}

/// Parse, align and score one upload. The feature file is read fresh each
/// time so it can be regenerated without a restart.
fn score_bytes(
    source_name: &str,
    data: &[u8],
    config: &AppConfig,
    classifier: &dyn Classifier,
) -> std::result::Result<ScoredBatch, DashboardError> {
    let raw = RawTable::from_reader(data, source_name)?;
    let key_column = match config.scoring.join {
        JoinStrategy::Positional => None,
        JoinStrategy::Key => config.scoring.join_key.as_deref(),
    };
    let processed = ProcessedFeatures::from_path(&config.data.processed_features_path, key_column)?;
    score_upload(source_name, raw, &processed, classifier, &config.scoring)
}

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub row: Option<String>,
}

/// Dashboard for one scored batch, with an optional row explanation.
pub async fn dashboard(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DashboardQuery>,
) -> std::result::Result<Response, ErrorPage> {
    let model_name = state.classifier.name().to_string();
    let page = build_dashboard(&state, &id, query.row)
        .await
        .map_err(|error| ErrorPage {
            model_name: model_name.clone(),
            error,
        })?;
    Ok(render(StatusCode::OK, &page))
}

async fn build_dashboard(
    state: &AppState,
    id: &str,
    row: Option<String>,
) -> Result<DashboardTemplate> {
    let batch = lookup(state, id)?;
    let row = row.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());

    let worker_batch = batch.clone();
    let classifier = state.classifier.clone();
    let config = state.config.clone();
    let metrics = state.metrics.clone();
    let requested = row.clone();

    let (charts, explained) = tokio::task::spawn_blocking(move || {
        let charts = DashboardCharts::render(&worker_batch.table);
        let explained = requested.map(|r| {
            let start = Instant::now();
            let result = explain_row(&worker_batch, classifier.as_ref(), &config, &r);
            metrics.record_explanation(start.elapsed(), result.is_ok());
            result
        });
        (charts, explained)
    })
    .await?;

    let (explanation, shap_error) = match explained {
        Some(Ok(view)) => (Some(view), None),
        Some(Err(e)) => {
            warn!(batch_id = %batch.id, error = %e, "Attribution failed");
            (None, Some(format!("SHAP Error: {}", e)))
        }
        None => (None, None),
    };

    let summary = Summary::from_table(&batch.table);
    Ok(DashboardTemplate {
        model_name: state.classifier.name().to_string(),
        batch: BatchView::from(batch.as_ref()),
        fraud_pct: format!("{:.2}", summary.fraud_pct),
        summary,
        top: top_suspicious(&batch.table, TOP_N)
            .into_iter()
            .map(RankedRow::from)
            .collect(),
        charts: charts?,
        row_value: row.unwrap_or_default(),
        max_row: batch.table.len().saturating_sub(1),
        explanation,
        shap_error,
    })
}

fn explain_row(
    batch: &ScoredBatch,
    classifier: &dyn Classifier,
    config: &AppConfig,
    row: &str,
) -> std::result::Result<ExplanationView, DashboardError> {
    let row: usize = row
        .parse()
        .map_err(|_| DashboardError::Attribution(format!("'{}' is not a row index", row)))?;

    let explanation =
        PermutationExplainer::new(classifier, &config.explain).explain(&batch.features, row)?;
    let chart = attribution_chart(&explanation, config.explain.max_features_shown)?;
    let title = batch
        .table
        .row(row)
        .map(|r| r.title().to_string())
        .unwrap_or_default();

    Ok(ExplanationView::new(
        &explanation,
        &title,
        chart,
        config.explain.max_features_shown,
    ))
}

/// The scored table as a CSV attachment
pub async fn download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> std::result::Result<Response, ErrorPage> {
    let model_name = state.classifier.name().to_string();
    let to_page = |error: ServerError| ErrorPage {
        model_name: model_name.clone(),
        error,
    };

    let batch = lookup(&state, &id).map_err(to_page)?;
    let body = to_csv(&batch.table).map_err(|e| to_page(e.into()))?;

    info!(
        batch_id = %batch.id,
        rows = batch.table.len(),
        bytes = body.len(),
        "Predictions exported"
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", EXPORT_FILE_NAME),
            ),
        ],
        body,
    )
        .into_response())
}

/// Liveness and usage counters
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "model": state.classifier.name(),
        "batches": state.batches.len(),
        "metrics": state.metrics.snapshot(),
    }))
}

fn lookup(state: &AppState, id: &str) -> Result<Arc<ScoredBatch>> {
    Uuid::parse_str(id)
        .ok()
        .and_then(|id| state.batches.get(&id))
        .ok_or_else(|| {
            ServerError::NotFound(format!("batch {} not found; upload the file again", id))
        })
}
