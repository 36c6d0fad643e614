#![allow(dead_code)]

use async_trait::async_trait;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use chart_agent_api::client::ChartService;
use chart_agent_api::errors::ChartError;
use chart_agent_api::model::{ChartType, MetadataPatch, TabularData};
use chart_agent_api::resolver::{self, SpreadsheetSource};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const STUB_TOKEN: &str = "test-token";

pub fn sample_table() -> TabularData {
    TabularData::new(vec![
        vec!["city".into(), "population".into()],
        vec!["Seattle".into(), "737015".into()],
        vec!["Bellevue".into(), "151854".into()],
    ])
}

pub fn sheet_url(id: &str) -> String {
    format!("https://docs.google.com/spreadsheets/d/{id}/edit?usp=sharing")
}

// ---------------------------------------------------------------------------
// In-memory fakes for orchestrator-level tests
// ---------------------------------------------------------------------------

/// Serves a fixed table for any valid share URL; counts resolutions.
pub struct FakeSource {
    pub table: TabularData,
    pub calls: AtomicUsize,
}

impl FakeSource {
    pub fn new(table: TabularData) -> Self {
        Self {
            table,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SpreadsheetSource for FakeSource {
    async fn resolve(&self, source_url: &str) -> Result<TabularData, ChartError> {
        resolver::parse_sheet_url(source_url)?;
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.table.clone())
    }
}

/// Records every remote call; failures are switched on per operation.
#[derive(Default)]
pub struct FakeChartService {
    pub ops: Mutex<Vec<String>>,
    pub uploaded: Mutex<Option<TabularData>>,
    pub patches: Mutex<Vec<MetadataPatch>>,
    pub published: AtomicUsize,
    pub fail_upload: bool,
    pub fail_metadata: bool,
    /// Fail this many publish calls before succeeding.
    pub fail_publish_times: AtomicUsize,
}

impl FakeChartService {
    pub fn op_log(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    pub fn remote_calls(&self) -> usize {
        self.ops.lock().unwrap().len()
    }

    fn record(&self, op: &str) {
        self.ops.lock().unwrap().push(op.to_string());
    }
}

#[async_trait]
impl ChartService for FakeChartService {
    async fn create_chart(
        &self,
        _chart_type: ChartType,
        _title: &str,
    ) -> Result<String, ChartError> {
        self.record("create");
        Ok("q1w2e".to_string())
    }

    async fn upload_data(&self, _chart_id: &str, data: &TabularData) -> Result<(), ChartError> {
        self.record("upload");
        if self.fail_upload {
            return Err(ChartError::RemoteService("upload exploded".into()));
        }
        *self.uploaded.lock().unwrap() = Some(data.clone());
        Ok(())
    }

    async fn read_data(&self, _chart_id: &str) -> Result<TabularData, ChartError> {
        self.record("read_data");
        match self.uploaded.lock().unwrap().clone() {
            Some(data) => Ok(data),
            None => Err(ChartError::RemoteService("no data uploaded".into())),
        }
    }

    async fn apply_metadata(
        &self,
        chart_id: &str,
        patch: &MetadataPatch,
    ) -> Result<(), ChartError> {
        self.record("metadata");
        if chart_id == "missing" {
            return Err(ChartError::ChartNotFound(chart_id.to_string()));
        }
        if self.fail_metadata {
            return Err(ChartError::RemoteService("metadata exploded".into()));
        }
        self.patches.lock().unwrap().push(patch.clone());
        Ok(())
    }

    async fn publish(&self, _chart_id: &str) -> Result<(), ChartError> {
        self.record("publish");
        let remaining = self.fail_publish_times.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_publish_times.store(remaining - 1, Ordering::SeqCst);
            return Err(ChartError::PublishFailed("not publishable yet".into()));
        }
        self.published.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn public_url(&self, chart_id: &str) -> String {
        format!("https://www.datawrapper.de/_/{chart_id}/")
    }
}

// ---------------------------------------------------------------------------
// Stub upstream servers for wire-level tests
// ---------------------------------------------------------------------------

pub async fn spawn(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub server");
    });
    addr
}

/// Stub for the Sheets CSV export endpoint. Sheet id `private` answers with
/// an HTML sign-in page the way Google does for non-public sheets.
pub async fn spawn_sheet_export(sheets: HashMap<String, String>) -> SocketAddr {
    async fn export(
        State(sheets): State<Arc<HashMap<String, String>>>,
        Path(sheet_id): Path<String>,
        Query(params): Query<HashMap<String, String>>,
    ) -> impl IntoResponse {
        if params.get("format").map(String::as_str) != Some("csv") {
            return (StatusCode::BAD_REQUEST, "unsupported format".to_string()).into_response();
        }
        if sheet_id == "private" {
            return (
                StatusCode::OK,
                "<html><body>Sign in to continue</body></html>".to_string(),
            )
                .into_response();
        }
        match sheets.get(&sheet_id) {
            Some(csv) => (StatusCode::OK, csv.clone()).into_response(),
            None => (StatusCode::NOT_FOUND, "no such sheet".to_string()).into_response(),
        }
    }

    let app = Router::new()
        .route("/spreadsheets/d/{sheet_id}/export", get(export))
        .with_state(Arc::new(sheets));
    spawn(app).await
}

#[derive(Debug, Default, Clone)]
pub struct StubChart {
    pub chart_type: String,
    pub title: String,
    pub data: Option<String>,
    pub patches: Vec<serde_json::Value>,
    pub publishes: usize,
}

#[derive(Default)]
pub struct StubDatawrapper {
    pub charts: Mutex<HashMap<String, StubChart>>,
    counter: AtomicUsize,
}

impl StubDatawrapper {
    pub fn chart(&self, id: &str) -> Option<StubChart> {
        self.charts.lock().unwrap().get(id).cloned()
    }

    pub fn chart_count(&self) -> usize {
        self.charts.lock().unwrap().len()
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {STUB_TOKEN}"))
}

/// Stub for the Datawrapper v3 chart endpoints, mounted under `/v3`.
pub async fn spawn_datawrapper(stub: Arc<StubDatawrapper>) -> SocketAddr {
    async fn create(
        State(stub): State<Arc<StubDatawrapper>>,
        headers: HeaderMap,
        Json(body): Json<serde_json::Value>,
    ) -> impl IntoResponse {
        if !authorized(&headers) {
            return (StatusCode::UNAUTHORIZED, Json(serde_json::json!({}))).into_response();
        }
        let n = stub.counter.fetch_add(1, Ordering::SeqCst);
        let id = format!("ch{n:03}");
        stub.charts.lock().unwrap().insert(
            id.clone(),
            StubChart {
                chart_type: body["type"].as_str().unwrap_or_default().to_string(),
                title: body["title"].as_str().unwrap_or_default().to_string(),
                ..StubChart::default()
            },
        );
        (StatusCode::CREATED, Json(serde_json::json!({ "id": id }))).into_response()
    }

    async fn upload(
        State(stub): State<Arc<StubDatawrapper>>,
        Path(id): Path<String>,
        headers: HeaderMap,
        body: String,
    ) -> impl IntoResponse {
        if !authorized(&headers) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        match stub.charts.lock().unwrap().get_mut(&id) {
            Some(chart) => {
                chart.data = Some(body);
                StatusCode::NO_CONTENT.into_response()
            }
            None => StatusCode::NOT_FOUND.into_response(),
        }
    }

    async fn read(
        State(stub): State<Arc<StubDatawrapper>>,
        Path(id): Path<String>,
        headers: HeaderMap,
    ) -> impl IntoResponse {
        if !authorized(&headers) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        match stub.charts.lock().unwrap().get(&id) {
            Some(chart) => (
                StatusCode::OK,
                chart.data.clone().unwrap_or_default(),
            )
                .into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        }
    }

    async fn apply_patch(
        State(stub): State<Arc<StubDatawrapper>>,
        Path(id): Path<String>,
        headers: HeaderMap,
        Json(body): Json<serde_json::Value>,
    ) -> impl IntoResponse {
        if !authorized(&headers) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        match stub.charts.lock().unwrap().get_mut(&id) {
            Some(chart) => {
                chart.patches.push(body);
                StatusCode::OK.into_response()
            }
            None => StatusCode::NOT_FOUND.into_response(),
        }
    }

    async fn publish(
        State(stub): State<Arc<StubDatawrapper>>,
        Path(id): Path<String>,
        headers: HeaderMap,
    ) -> impl IntoResponse {
        if !authorized(&headers) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        match stub.charts.lock().unwrap().get_mut(&id) {
            Some(chart) if chart.data.is_some() => {
                chart.publishes += 1;
                StatusCode::OK.into_response()
            }
            Some(_) => (StatusCode::CONFLICT, "no data uploaded").into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        }
    }

    let app = Router::new()
        .route("/v3/charts", post(create))
        .route("/v3/charts/{id}/data", put(upload).get(read))
        .route("/v3/charts/{id}", patch(apply_patch))
        .route("/v3/charts/{id}/publish", post(publish))
        .with_state(stub);
    spawn(app).await
}
