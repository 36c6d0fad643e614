//! The two operations at the service boundary and their sequencing rules.
//!
//! Both operations are stateless request/response units: the chart id is the
//! only session token and the caller holds it between calls. Validation runs
//! first and never touches the network; remote failures surface with enough
//! detail (including any already-issued chart id) for the caller to retry the
//! failed step instead of starting over.

use crate::client::ChartService;
use crate::errors::ChartError;
use crate::model::{
    ChartCreationRequest, ChartMetadataUpdate, ChartSession, ChartType, CreateChartRequest,
    MetadataPatch, NormalizedColors,
};
use crate::resolver::SpreadsheetSource;
use indexmap::IndexMap;
use serde::Serialize;
use std::sync::Arc;

pub struct ChartSessionOrchestrator {
    source: Arc<dyn SpreadsheetSource>,
    charts: Arc<dyn ChartService>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartUpdateOutcome {
    pub chart_id: String,
    pub chart_url: String,
}

impl ChartSessionOrchestrator {
    pub fn new(source: Arc<dyn SpreadsheetSource>, charts: Arc<dyn ChartService>) -> Self {
        Self { source, charts }
    }

    /// Step 1 of the flow: resolve the sheet, create the chart, upload the
    /// data. Returns the fresh session the caller will hold.
    ///
    /// If the chart is created but the upload fails, the whole operation
    /// fails with `DataUpload` carrying the issued chart id — disclosure
    /// instead of rollback, so the caller can retry the upload alone and the
    /// remote chart is never blindly deleted.
    pub async fn create_chart_id(
        &self,
        request: &CreateChartRequest,
    ) -> Result<ChartSession, ChartError> {
        let request = validate_creation(request)?;

        let data = self.source.resolve(&request.source_url).await?;
        tracing::info!(
            rows = data.data_row_count(),
            columns = data.header().map(|h| h.len()).unwrap_or(0),
            "spreadsheet resolved"
        );

        let chart_id = self
            .charts
            .create_chart(request.chart_type, &request.title)
            .await?;

        if let Err(err) = self.charts.upload_data(&chart_id, &data).await {
            tracing::error!(chart_id, error = %err, "data upload failed after chart creation");
            return Err(ChartError::DataUpload {
                chart_id,
                detail: err.to_string(),
            });
        }

        Ok(ChartSession::new(chart_id))
    }

    /// Step 2 of the flow, repeatable: patch metadata, then publish.
    ///
    /// Publish is skipped when the patch fails. When publish fails after the
    /// patch succeeded, the metadata stays applied remotely and the caller
    /// retries the same call — re-sending identical fields is a no-op in
    /// effect, so the retry is idempotent.
    pub async fn update_chart(
        &self,
        update: &ChartMetadataUpdate,
    ) -> Result<ChartUpdateOutcome, ChartError> {
        let chart_id = match update.chart_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                return Err(ChartError::Validation {
                    fields: vec!["chart_id".into()],
                });
            }
        };

        // Color syntax is checked before any remote call.
        let colors = update
            .custom_colors
            .as_ref()
            .map(|c| c.normalized())
            .transpose()?;

        let patch = self.build_patch(&chart_id, update, colors).await?;

        if patch.is_empty() {
            tracing::info!(chart_id, "no metadata fields present, publishing only");
        } else {
            self.charts.apply_metadata(&chart_id, &patch).await?;
        }

        self.charts.publish(&chart_id).await?;

        Ok(ChartUpdateOutcome {
            chart_url: self.charts.public_url(&chart_id),
            chart_id,
        })
    }

    /// Assemble the canonical patch. A color *sequence* has no category
    /// names of its own, so it is zipped against the chart's category order
    /// (first data column of the uploaded dataset, first-appearance order).
    async fn build_patch(
        &self,
        chart_id: &str,
        update: &ChartMetadataUpdate,
        colors: Option<NormalizedColors>,
    ) -> Result<MetadataPatch, ChartError> {
        let custom_colors = match colors {
            None => None,
            Some(NormalizedColors::Mapping(map)) => Some(map),
            Some(NormalizedColors::Sequence(seq)) => {
                let data = self.charts.read_data(chart_id).await?;
                let categories = data.category_order();
                if seq.len() > categories.len() {
                    tracing::warn!(
                        chart_id,
                        colors = seq.len(),
                        categories = categories.len(),
                        "more colors than categories, surplus ignored"
                    );
                }
                let mut map = IndexMap::with_capacity(seq.len().min(categories.len()));
                for (category, color) in categories.into_iter().zip(seq) {
                    map.insert(category, color);
                }
                Some(map)
            }
        };

        Ok(MetadataPatch {
            intro: update.intro.clone(),
            byline: update.byline.clone(),
            source_name: update.source_name.clone(),
            source_url: update.source_url.clone(),
            custom_colors,
        })
    }
}

fn validate_creation(request: &CreateChartRequest) -> Result<ChartCreationRequest, ChartError> {
    fn present(value: &Option<String>) -> Option<&str> {
        value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    let mut missing = Vec::new();
    let source_url = present(&request.file_url);
    if source_url.is_none() {
        missing.push("file_url".to_string());
    }
    let chart_type = present(&request.chart_type);
    if chart_type.is_none() {
        missing.push("chart_type".to_string());
    }
    let title = present(&request.title);
    if title.is_none() {
        missing.push("title".to_string());
    }
    let (Some(source_url), Some(chart_type), Some(title)) = (source_url, chart_type, title)
    else {
        return Err(ChartError::Validation { fields: missing });
    };

    Ok(ChartCreationRequest {
        source_url: source_url.to_string(),
        chart_type: ChartType::parse(chart_type)?,
        title: title.to_string(),
    })
}
