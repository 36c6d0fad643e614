use thiserror::Error;

/// Caller-facing failure taxonomy for the two chart operations.
///
/// Every variant maps to a stable wire code (`kind`) and an HTTP status
/// (`http_status`). Validation, chart-type, and color errors are raised
/// before any network call; source and remote errors map 1:1 to the failed
/// step so the caller can retry that step instead of restarting from scratch.
#[derive(Debug, Error)]
pub enum ChartError {
    #[error("missing or empty required field(s): {}", fields.join(", "))]
    Validation { fields: Vec<String> },

    #[error("invalid file URL '{0}': expected a Google Sheets share link")]
    InvalidSourceUrl(String),

    #[error("spreadsheet is not publicly accessible: {0}")]
    SourceNotPublic(String),

    #[error("failed to fetch spreadsheet: {0}")]
    SourceUnreachable(String),

    #[error("spreadsheet contains no data rows")]
    SourceEmpty,

    #[error("could not parse spreadsheet export as tabular text: {0}")]
    MalformedTabularContent(String),

    #[error("unsupported chart type '{got}' (valid: {valid})")]
    UnsupportedChartType { got: String, valid: String },

    #[error("invalid custom_colors: {0}")]
    InvalidColorSpec(String),

    #[error("charting service credential rejected or missing: {0}")]
    RemoteAuth(String),

    #[error("chart '{0}' not found on the charting service")]
    ChartNotFound(String),

    #[error("charting service error: {0}")]
    RemoteService(String),

    #[error("chart '{chart_id}' was created but the data upload failed: {detail}")]
    DataUpload { chart_id: String, detail: String },

    #[error("chart could not be published: {0}")]
    PublishFailed(String),
}

impl ChartError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::InvalidSourceUrl(_) => "invalid_source_url",
            Self::SourceNotPublic(_) => "source_not_public",
            Self::SourceUnreachable(_) => "source_unreachable",
            Self::SourceEmpty => "source_empty",
            Self::MalformedTabularContent(_) => "malformed_tabular_content",
            Self::UnsupportedChartType { .. } => "unsupported_chart_type",
            Self::InvalidColorSpec(_) => "invalid_color_spec",
            Self::RemoteAuth(_) => "remote_auth_error",
            Self::ChartNotFound(_) => "chart_not_found",
            Self::RemoteService(_) => "remote_service_error",
            Self::DataUpload { .. } => "data_upload_failed",
            Self::PublishFailed(_) => "publish_failed",
        }
    }

    /// HTTP status for the boundary layer. Chart-not-found gets a distinct
    /// 404 so callers can tell a stale chart id from a malformed request.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation { .. }
            | Self::InvalidSourceUrl(_)
            | Self::SourceNotPublic(_)
            | Self::SourceUnreachable(_)
            | Self::SourceEmpty
            | Self::MalformedTabularContent(_)
            | Self::UnsupportedChartType { .. }
            | Self::InvalidColorSpec(_) => 400,
            Self::ChartNotFound(_) => 404,
            Self::RemoteAuth(_)
            | Self::RemoteService(_)
            | Self::DataUpload { .. }
            | Self::PublishFailed(_) => 500,
        }
    }

    /// The already-issued chart id, when one exists for a failed operation.
    /// Disclosed so the caller is not left with an orphaned chart.
    pub fn chart_id(&self) -> Option<&str> {
        match self {
            Self::DataUpload { chart_id, .. } => Some(chart_id),
            Self::ChartNotFound(chart_id) => Some(chart_id),
            _ => None,
        }
    }
}
