//! HTTP boundary: the two chart operations plus a service banner, and the
//! mapping from the error taxonomy to response status codes and bodies.

use crate::errors::ChartError;
use crate::model::{ChartMetadataUpdate, CreateChartRequest};
use crate::state::AppState;
use anyhow::Result;
use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::Serialize;
use std::sync::Arc;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(service_info))
        .route("/create_chart_id", post(create_chart_id))
        .route("/update_chart", post(update_chart))
        .with_state(state)
}

pub async fn serve(state: Arc<AppState>) -> Result<()> {
    let addr = state.config().http_bind_address;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "failed to install ctrl-c handler");
        return;
    }
    tracing::info!("shutdown requested");
}

#[derive(Debug, Serialize)]
struct ServiceInfo {
    message: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct CreateChartIdResponse {
    status: &'static str,
    chart_id: String,
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct UpdateChartResponse {
    status: &'static str,
    chart_id: String,
    chart_url: String,
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    status: &'static str,
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    chart_id: Option<String>,
}

/// Boundary failure: either the caller credential was rejected here, or the
/// operation failed with a taxonomy error.
enum ApiError {
    Unauthorized,
    Chart(ChartError),
}

impl From<ChartError> for ApiError {
    fn from(error: ChartError) -> Self {
        Self::Chart(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    status: "error",
                    error: "unauthorized",
                    message: "missing or invalid x-api-key header".into(),
                    chart_id: None,
                },
            ),
            Self::Chart(error) => {
                let status = StatusCode::from_u16(error.http_status())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                if status.is_server_error() {
                    tracing::error!(code = error.kind(), %error, "operation failed");
                } else {
                    tracing::info!(code = error.kind(), %error, "request rejected");
                }
                (
                    status,
                    ErrorBody {
                        status: "error",
                        error: error.kind(),
                        chart_id: error.chart_id().map(str::to_string),
                        message: error.to_string(),
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

fn require_api_key(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.config().api_key.clone() else {
        return Ok(());
    };
    let presented = headers.get("x-api-key").and_then(|v| v.to_str().ok());
    if presented == Some(expected.as_str()) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}

async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        message: "Chart agent API",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn create_chart_id(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<CreateChartRequest>,
) -> Result<Json<CreateChartIdResponse>, ApiError> {
    require_api_key(&state, &headers)?;
    tracing::info!("create_chart_id requested");

    let session = state.orchestrator().create_chart_id(&request).await?;
    Ok(Json(CreateChartIdResponse {
        status: "success",
        chart_id: session.chart_id,
        message: "Chart created and data uploaded successfully",
    }))
}

async fn update_chart(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(update): Json<ChartMetadataUpdate>,
) -> Result<Json<UpdateChartResponse>, ApiError> {
    require_api_key(&state, &headers)?;
    tracing::info!("update_chart requested");

    let outcome = state.orchestrator().update_chart(&update).await?;
    Ok(Json(UpdateChartResponse {
        status: "success",
        chart_id: outcome.chart_id,
        chart_url: outcome.chart_url,
        message: "Chart metadata updated and published successfully",
    }))
}
