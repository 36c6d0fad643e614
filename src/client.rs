//! Thin protocol adapter to the Datawrapper v3 API. One remote call per
//! operation; each operation owns its failure mapping. Sequencing across
//! calls lives in the orchestrator, never here.

use crate::config::ServerConfig;
use crate::errors::ChartError;
use crate::model::{ChartType, MetadataPatch, TabularData};
use crate::table;
use async_trait::async_trait;

#[async_trait]
pub trait ChartService: Send + Sync {
    /// Create an empty chart, returning the service-issued opaque id.
    async fn create_chart(&self, chart_type: ChartType, title: &str) -> Result<String, ChartError>;

    /// Replace the chart's dataset with the given table.
    async fn upload_data(&self, chart_id: &str, data: &TabularData) -> Result<(), ChartError>;

    /// Read back the chart's current dataset.
    async fn read_data(&self, chart_id: &str) -> Result<TabularData, ChartError>;

    /// Apply a metadata patch. Only fields present on the patch are sent.
    async fn apply_metadata(&self, chart_id: &str, patch: &MetadataPatch)
    -> Result<(), ChartError>;

    /// Publish the chart so its public URL goes live.
    async fn publish(&self, chart_id: &str) -> Result<(), ChartError>;

    /// The deterministic public URL: fixed base, chart id, trailing slash.
    fn public_url(&self, chart_id: &str) -> String;
}

pub struct DatawrapperClient {
    http: reqwest::Client,
    api_base: String,
    public_base: String,
    token: Option<String>,
}

impl DatawrapperClient {
    pub fn new(config: &ServerConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            public_base: config.public_base.trim_end_matches('/').to_string(),
            token: config.datawrapper_token.clone(),
        }
    }

    fn token(&self) -> Result<&str, ChartError> {
        self.token
            .as_deref()
            .ok_or_else(|| ChartError::RemoteAuth("Datawrapper API token not configured".into()))
    }

    fn charts_url(&self, suffix: &str) -> String {
        format!("{}/charts{suffix}", self.api_base)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ChartError> {
        let token = self.token()?;
        request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ChartError::RemoteService(e.to_string()))
    }
}

#[async_trait]
impl ChartService for DatawrapperClient {
    async fn create_chart(&self, chart_type: ChartType, title: &str) -> Result<String, ChartError> {
        let response = self
            .send(self.http.post(self.charts_url("")).json(
                &serde_json::json!({ "type": chart_type.as_str(), "title": title }),
            ))
            .await?;

        let response = check_remote(response, None).await?;
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ChartError::RemoteService(format!("unreadable create response: {e}")))?;

        match body.get("id").and_then(|v| v.as_str()) {
            Some(id) if !id.is_empty() => {
                tracing::info!(chart_id = id, chart_type = %chart_type, "chart created");
                Ok(id.to_string())
            }
            _ => Err(ChartError::RemoteService(
                "create response carried no chart id".into(),
            )),
        }
    }

    async fn upload_data(&self, chart_id: &str, data: &TabularData) -> Result<(), ChartError> {
        let csv = table::to_csv(data);
        let response = self
            .send(
                self.http
                    .put(self.charts_url(&format!("/{chart_id}/data")))
                    .header(reqwest::header::CONTENT_TYPE, "text/csv")
                    .body(csv),
            )
            .await?;

        check_remote(response, Some(chart_id)).await?;
        tracing::info!(chart_id, rows = data.rows.len(), "dataset uploaded");
        Ok(())
    }

    async fn read_data(&self, chart_id: &str) -> Result<TabularData, ChartError> {
        let response = self
            .send(self.http.get(self.charts_url(&format!("/{chart_id}/data"))))
            .await?;

        let response = check_remote(response, Some(chart_id)).await?;
        let body = response
            .text()
            .await
            .map_err(|e| ChartError::RemoteService(e.to_string()))?;

        table::to_canonical_table(&body)
            .map_err(|e| ChartError::RemoteService(format!("chart data was not parseable: {e}")))
    }

    async fn apply_metadata(
        &self,
        chart_id: &str,
        patch: &MetadataPatch,
    ) -> Result<(), ChartError> {
        let response = self
            .send(
                self.http
                    .patch(self.charts_url(&format!("/{chart_id}")))
                    .json(&patch.to_payload()),
            )
            .await?;

        check_remote(response, Some(chart_id)).await?;
        tracing::info!(chart_id, "metadata applied");
        Ok(())
    }

    async fn publish(&self, chart_id: &str) -> Result<(), ChartError> {
        let response = self
            .send(self.http.post(self.charts_url(&format!("/{chart_id}/publish"))))
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(chart_id, "chart published");
            return Ok(());
        }
        match status.as_u16() {
            401 | 403 => Err(ChartError::RemoteAuth(format!(
                "publish rejected with {status}"
            ))),
            404 => Err(ChartError::ChartNotFound(chart_id.to_string())),
            _ => Err(ChartError::PublishFailed(
                error_detail(status, response).await,
            )),
        }
    }

    fn public_url(&self, chart_id: &str) -> String {
        format!("{}/_/{chart_id}/", self.public_base)
    }
}

/// Shared non-2xx mapping for create/upload/read/metadata calls.
async fn check_remote(
    response: reqwest::Response,
    chart_id: Option<&str>,
) -> Result<reqwest::Response, ChartError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match (status.as_u16(), chart_id) {
        (401 | 403, _) => Err(ChartError::RemoteAuth(format!(
            "service rejected the configured token ({status})"
        ))),
        (404, Some(id)) => Err(ChartError::ChartNotFound(id.to_string())),
        _ => Err(ChartError::RemoteService(
            error_detail(status, response).await,
        )),
    }
}

async fn error_detail(status: reqwest::StatusCode, response: reqwest::Response) -> String {
    let body = response.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(200).collect();
    if snippet.is_empty() {
        format!("{status}")
    } else {
        format!("{status}: {snippet}")
    }
}
