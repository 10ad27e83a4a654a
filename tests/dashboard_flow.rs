//! End-to-end flows through the HTTP router: upload, dashboard, explain,
//! download.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use job_fraud_dashboard::config::AppConfig;
use job_fraud_dashboard::metrics::DashboardMetrics;
use job_fraud_dashboard::models::LinearClassifier;
use job_fraud_dashboard::server::{router, AppState};
use job_fraud_dashboard::RawTable;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tower::ServiceExt;

const BOUNDARY: &str = "dashboard-test-boundary";

const LISTINGS: &str = "job_id,title,location,description,telecommuting,has_company_logo\n\
    1,Accountant,\"US, NY, New York\",Monthly close and reporting,0,1\n\
    2,Data Entry URGENT,\"US, TX, Houston\",Earn fast from home,1,0\n\
    3,Mystery Shopper,\"US, TX, Houston\",Wire funds weekly,1,0\n";

struct Harness {
    app: Router,
    _features: NamedTempFile,
}

/// Router over a linear model with `logit = x`, so x = 0 scores exactly 0.5.
fn harness(feature_values: &[f32]) -> Harness {
    let mut features = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(features, "x,unused").unwrap();
    for v in feature_values {
        writeln!(features, "{},1", v).unwrap();
    }
    features.flush().unwrap();

    let mut config = AppConfig::default();
    config.data.processed_features_path = features.path().display().to_string();
    config.explain.permutations = 8;
    config.explain.background_rows = 8;

    let mut weights = HashMap::new();
    weights.insert("x".to_string(), 1.0);
    let classifier = Arc::new(LinearClassifier::new("linear-test", 0.0, weights));

    let state = AppState::new(config, classifier, Arc::new(DashboardMetrics::new()));
    Harness {
        app: router(state),
        _features: features,
    }
}

fn upload_request(file_name: &str, contents: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: text/csv\r\n\r\n");
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn get(app: &Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

async fn health(app: &Router) -> serde_json::Value {
    let (status, body) = get(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    serde_json::from_str(&body).unwrap()
}

/// Upload and return the dashboard path from the redirect
async fn upload(app: &Router, contents: &str) -> String {
    let response = app
        .clone()
        .oneshot(upload_request("listings.csv", contents.as_bytes()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_upload_score_and_download() {
    let h = harness(&[-3.0, 0.0, 2.5]);
    let location = upload(&h.app, LISTINGS).await;
    assert!(location.starts_with("/batches/"));

    let (status, page) = get(&h.app, &location).await;
    assert_eq!(status, StatusCode::OK);
    assert!(page.contains("Prediction Summary"));
    assert!(page.contains("Top 10 Most Suspicious Listings"));
    assert!(page.contains("<svg"));
    assert!(!page.contains("SHAP Error:"));

    let stats = health(&h.app).await;
    assert_eq!(stats["batches"], 1);
    assert_eq!(stats["metrics"]["uploads_scored"], 1);
    assert_eq!(stats["metrics"]["rows_scored"], 3);
    // x = 0 sits exactly on the threshold and counts as fraud
    assert_eq!(stats["metrics"]["rows_flagged"], 2);

    let response = h
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("{}/predictions.csv", location))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"predictions.csv\""
    );

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(!body.is_empty());

    let exported = RawTable::from_reader(body.as_ref(), "predictions.csv").unwrap();
    assert_eq!(exported.len(), 3);
    assert_eq!(exported.headers().len(), 6 + 3);

    let label = exported.column_index("predicted_label").unwrap();
    let prob = exported.column_index("fraud_probability").unwrap();
    let labels: Vec<&str> = (0..3).map(|i| exported.cell(i, label)).collect();
    assert_eq!(labels, vec!["0", "1", "1"]);
    assert_eq!(exported.cell(1, prob), "0.5");
}

#[tokio::test]
async fn test_malformed_upload_single_error_no_batch() {
    let h = harness(&[0.0, 1.0]);

    let response = h
        .app
        .clone()
        .oneshot(upload_request("broken.csv", b"a,b\n1,2,3\n"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let page = String::from_utf8(body.to_vec()).unwrap();
    assert_eq!(page.matches("class=\"error\"").count(), 1);
    assert!(page.contains("Error: could not parse broken.csv"));
    assert!(!page.contains("Prediction Summary"));

    let stats = health(&h.app).await;
    assert_eq!(stats["batches"], 0);
    assert_eq!(stats["metrics"]["uploads_failed"], 1);
    assert_eq!(stats["metrics"]["rows_scored"], 0);
}

#[tokio::test]
async fn test_missing_columns_rejected() {
    let h = harness(&[0.0]);
    let response = h
        .app
        .clone()
        .oneshot(upload_request("listings.csv", b"title,location\nClerk,US\n"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(health(&h.app).await["batches"], 0);
}

#[tokio::test]
async fn test_upload_shorter_than_features_rejected() {
    let h = harness(&[0.0, 1.0, 2.0, 3.0, 4.0]);
    let response = h
        .app
        .clone()
        .oneshot(upload_request("listings.csv", LISTINGS.as_bytes()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_extra_rows_dropped_and_reported() {
    let h = harness(&[1.0, -1.0]);
    let location = upload(&h.app, LISTINGS).await;

    let (status, page) = get(&h.app, &location).await;
    assert_eq!(status, StatusCode::OK);
    assert!(page.contains("1 uploaded rows had no processed features"));
    assert_eq!(health(&h.app).await["metrics"]["rows_scored"], 2);
}

#[tokio::test]
async fn test_explain_row_in_and_out_of_range() {
    let h = harness(&[-3.0, 0.0, 2.5]);
    let location = upload(&h.app, LISTINGS).await;

    let (status, page) = get(&h.app, &format!("{}?row=2", location)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(page.contains("Row 2: Mystery Shopper"));
    assert!(!page.contains("SHAP Error:"));

    // Failure stays inline; the rest of the page still renders
    let (status, page) = get(&h.app, &format!("{}?row=7", location)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(page.contains("SHAP Error: row index 7 is out of range"));
    assert!(page.contains("Prediction Summary"));

    let (_, page) = get(&h.app, &format!("{}?row=abc", location)).await;
    assert!(page.contains("SHAP Error:"));

    let stats = health(&h.app).await;
    assert_eq!(stats["metrics"]["explanations"], 1);
    assert_eq!(stats["metrics"]["explanation_errors"], 2);
}

#[tokio::test]
async fn test_unknown_batch_download_not_found() {
    let h = harness(&[0.0]);
    let uri = format!("/batches/{}/predictions.csv", uuid::Uuid::new_v4());
    let (status, page) = get(&h.app, &uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(page.contains("Error: batch"));
}
