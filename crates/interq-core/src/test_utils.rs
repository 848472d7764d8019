//! Test utilities for interq-core
//!
//! A mock advisory server speaking the same HTTP contract as the real
//! service, for integration tests and offline development.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Form, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::sync::oneshot;

#[derive(Debug, Default)]
struct MockState {
    next_id: u64,
    files: Vec<MockFile>,
    reports: Vec<MockReport>,
    generate_status: Option<u16>,
    fail_reports: bool,
    fail_metadata: HashSet<String>,
    generate_calls: Vec<String>,
}

#[derive(Debug, Clone)]
struct MockFile {
    id: String,
    name: String,
    brand: String,
    downgraded: u64,
    timestamp: String,
}

#[derive(Debug, Clone)]
struct MockReport {
    id: String,
    source_file_id: String,
    timestamp: String,
}

type Shared = Arc<Mutex<MockState>>;

/// Mock advisory server for testing and development
pub struct MockInterqServer {
    addr: SocketAddr,
    state: Shared,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockInterqServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        let state: Shared = Arc::default();
        let app = Router::new()
            .route("/files/upload", post(handle_upload))
            .route("/files/all", get(handle_list_files))
            .route("/files/:id", get(handle_file_metadata))
            .route("/reports", get(handle_list_reports))
            .route("/reports/generate/:id", post(handle_generate))
            .route("/reports/:id", get(handle_report_detail))
            .route("/api/compliance/check", post(handle_compliance))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Register a file as if it had been uploaded; returns its id
    pub fn add_file(&self, name: &str, brand: &str, downgraded: u64, timestamp: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = next_id(&mut state, "file");
        state.files.push(MockFile {
            id: id.clone(),
            name: name.to_string(),
            brand: brand.to_string(),
            downgraded,
            timestamp: timestamp.to_string(),
        });
        id
    }

    /// Register a generated report; returns its id
    pub fn add_report(&self, source_file_id: &str, timestamp: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = next_id(&mut state, "report");
        state.reports.push(MockReport {
            id: id.clone(),
            source_file_id: source_file_id.to_string(),
            timestamp: timestamp.to_string(),
        });
        id
    }

    /// Make `POST /reports/generate/{id}` answer with this status
    pub fn set_generate_status(&self, status: Option<u16>) {
        self.state.lock().unwrap().generate_status = status;
    }

    /// Make `GET /reports` fail with 503
    pub fn set_fail_reports(&self, fail: bool) {
        self.state.lock().unwrap().fail_reports = fail;
    }

    /// Make `GET /files/{id}` fail for one file
    pub fn fail_metadata_for(&self, file_id: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_metadata
            .insert(file_id.to_string());
    }

    /// File ids generation was requested for, in order
    pub fn generate_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().generate_calls.clone()
    }

    pub fn report_count(&self) -> usize {
        self.state.lock().unwrap().reports.len()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockInterqServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn next_id(state: &mut MockState, kind: &str) -> String {
    state.next_id += 1;
    format!("{}-{}", kind, state.next_id)
}

fn now() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

/// Brand from the first column's prefix, the way the service detects it
fn detect_brand(csv: &str) -> Option<&'static str> {
    let first = csv.lines().next()?.split(',').next()?.trim().to_lowercase();
    if first.starts_with("visa_") {
        Some("visa")
    } else if first.starts_with("mc_") {
        Some("mastercard")
    } else {
        None
    }
}

/// Rows whose `downgraded` column is truthy
fn count_downgraded(csv: &str) -> u64 {
    let mut lines = csv.lines();
    let Some(header) = lines.next() else {
        return 0;
    };
    let Some(col) = header
        .split(',')
        .position(|c| c.trim().eq_ignore_ascii_case("downgraded"))
    else {
        return 0;
    };
    lines
        .filter(|line| {
            line.split(',')
                .nth(col)
                .map(|v| matches!(v.trim(), "1" | "true" | "True"))
                .unwrap_or(false)
        })
        .count() as u64
}

async fn handle_upload(State(state): State<Shared>, mut multipart: Multipart) -> Response {
    let mut upload: Option<(String, String)> = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or("upload.csv").to_string();
        let Ok(bytes) = field.bytes().await else {
            return detail(StatusCode::BAD_REQUEST, "Could not read upload");
        };
        upload = Some((name, String::from_utf8_lossy(&bytes).into_owned()));
    }

    let Some((name, content)) = upload else {
        return detail(StatusCode::UNPROCESSABLE_ENTITY, "No file part in request");
    };
    let Some(brand) = detect_brand(&content) else {
        return detail(
            StatusCode::BAD_REQUEST,
            "Cannot detect brand: first column must start with visa_ or mc_",
        );
    };
    let downgraded = count_downgraded(&content);

    let mut state = state.lock().unwrap();
    let id = next_id(&mut state, "file");
    state.files.push(MockFile {
        id: id.clone(),
        name: name.clone(),
        brand: brand.to_string(),
        downgraded,
        timestamp: now(),
    });

    Json(json!({
        "message": "File uploaded successfully",
        "file_id": id,
        "path": format!("uploads/{}", name),
        "brand": brand,
        "downgraded_transaction": downgraded,
    }))
    .into_response()
}

async fn handle_list_files(State(state): State<Shared>) -> Json<Value> {
    let state = state.lock().unwrap();
    let files: Vec<Value> = state
        .files
        .iter()
        .map(|f| json!({ "id": f.id, "name": f.name, "timestamp": f.timestamp }))
        .collect();
    Json(json!({ "files": files }))
}

async fn handle_file_metadata(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let state = state.lock().unwrap();
    if state.fail_metadata.contains(&id) {
        return detail(StatusCode::INTERNAL_SERVER_ERROR, "Metadata unavailable");
    }
    match state.files.iter().find(|f| f.id == id) {
        // camelCase on purpose: the service has sent both spellings
        Some(f) => Json(json!({
            "id": f.id,
            "brand": f.brand,
            "downgradedTransaction": f.downgraded,
        }))
        .into_response(),
        None => detail(StatusCode::NOT_FOUND, "File not found"),
    }
}

async fn handle_list_reports(State(state): State<Shared>) -> Response {
    let state = state.lock().unwrap();
    if state.fail_reports {
        return (StatusCode::SERVICE_UNAVAILABLE, "unavailable").into_response();
    }
    let reports: Vec<Value> = state
        .reports
        .iter()
        .map(|r| json!({ "id": r.id, "source_file": r.source_file_id, "timestamp": r.timestamp }))
        .collect();
    Json(json!({ "reports": reports })).into_response()
}

async fn handle_generate(State(state): State<Shared>, Path(file_id): Path<String>) -> Response {
    let mut state = state.lock().unwrap();
    state.generate_calls.push(file_id.clone());

    if let Some(code) = state.generate_status {
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            return (status, "Internal Server Error").into_response();
        }
        return detail(status, "Report generation is not available for this file");
    }
    if !state.files.iter().any(|f| f.id == file_id) {
        return detail(StatusCode::NOT_FOUND, "File not found");
    }

    let id = next_id(&mut state, "report");
    state.reports.push(MockReport {
        id: id.clone(),
        source_file_id: file_id,
        timestamp: now(),
    });
    Json(json!({ "message": "Report generated", "report_id": id })).into_response()
}

async fn handle_report_detail(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let state = state.lock().unwrap();
    if !state.reports.iter().any(|r| r.id == id) {
        return detail(StatusCode::NOT_FOUND, "Report not found");
    }
    Json(sample_report_detail()).into_response()
}

/// Report payload with two transactions; numbers arrive as strings on purpose
pub fn sample_report_detail() -> Value {
    json!({
        "overall": {
            "features": [
                {"feature_name": "mc_channel_type", "feature_reason": "Card-not-present channel", "importance_normalized": 0.55},
                {"feature_name": "mc_eci_indicator", "feature_reason": "Missing 3DS authentication", "importance_normalized": "0.30"},
                {"feature_name": "mc_cvv2_result_code", "feature_reason": "CVV2 not matched", "importance_normalized": 0.145},
                {"feature_name": "mc_avs_result_code", "feature_reason": "AVS unavailable", "importance_normalized": 0.005}
            ]
        },
        "per_transaction": [
            {
                "transaction_index": 0,
                "predicted_fee": "1.65",
                "actual_fee": "2.10",
                "downgrade": true,
                "transaction_features": [
                    {"feature_name": "mc_channel_type", "feature_value": "ecommerce_non3ds", "feature_reason": "CNP", "importance_normalized": 0.6},
                    {"feature_name": "mc_eci_indicator", "feature_value": "7", "feature_reason": "No 3DS", "importance_normalized": 0.4}
                ]
            },
            {
                "transaction_index": "1",
                "predicted_fee": 0.9,
                "actual_fee": "0.90",
                "downgrade": "False",
                "transaction_features": []
            }
        ]
    })
}

async fn handle_compliance(
    State(state): State<Shared>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let state = state.lock().unwrap();
    let Some(file_id) = form.get("file_id") else {
        return detail(StatusCode::UNPROCESSABLE_ENTITY, "file_id is required");
    };
    let Some(file) = state.files.iter().find(|f| &f.id == file_id) else {
        return detail(StatusCode::NOT_FOUND, "File not found");
    };

    let severity = form
        .get("min_fail_severity")
        .map(|s| s.to_uppercase())
        .unwrap_or_else(|| "MEDIUM".to_string());
    let return_csv = form.get("return_csv").map(|v| v == "true").unwrap_or(false);

    // HIGH only flags the high finding, anything lower flags both
    let mut results = vec![json!({
        "id": "tx-1",
        "riskLevel": "HIGH",
        "findings": [
            {"rule_id": "ECI_MISSING", "severity": "HIGH", "message": "E-commerce without 3DS authentication"}
        ]
    })];
    if severity != "HIGH" {
        results.push(json!({
            "id": "tx-2",
            "riskLevel": "Medium",
            "findings": ["AVS result unavailable"]
        }));
    }
    let flagged = results.len() as u64;
    let rows = file.downgraded.max(flagged) + 2;

    Json(json!({
        "rows": rows,
        "non_compliant": flagged,
        "compliance_rate": (rows - flagged) as f64 / rows as f64,
        "total_estimated_impact": 4.25,
        "rule_counts": { "ECI_MISSING": 1, "AVS_UNAVAILABLE": flagged - 1 },
        "download": if return_csv { Value::String(format!("/downloads/{}_compliance.csv", file.id)) } else { Value::Null },
        "results": results,
    }))
    .into_response()
}
