//! Resolving a spreadsheet share link into canonical tabular data.
//!
//! Only publicly shared Google Sheets links are supported. The share URL is
//! validated and rewritten to the sheet's CSV export endpoint before any
//! network I/O; fetch failures are mapped to the source-error taxonomy. No
//! retries happen at this layer — retry policy belongs to the caller.

use crate::config::ServerConfig;
use crate::errors::ChartError;
use crate::model::TabularData;
use crate::table;
use async_trait::async_trait;
use {once_cell::sync::Lazy, regex::Regex};

static SHEET_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https://docs\.google\.com/spreadsheets/d/([A-Za-z0-9_-]+)").unwrap()
});

static GID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[?#&]gid=(\d+)").unwrap());

/// A validated reference to one worksheet of a shared spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRef {
    pub sheet_id: String,
    pub gid: u64,
}

/// Validate the share-URL shape and extract the sheet id plus the worksheet
/// gid (`#gid=N` or `?gid=N`, first worksheet when absent). Pure; performs
/// no I/O, so bad URLs are rejected before any network call.
pub fn parse_sheet_url(url: &str) -> Result<SheetRef, ChartError> {
    let caps = SHEET_URL_RE
        .captures(url.trim())
        .ok_or_else(|| ChartError::InvalidSourceUrl(url.to_string()))?;

    let gid = GID_RE
        .captures(url)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0);

    Ok(SheetRef {
        sheet_id: caps[1].to_string(),
        gid,
    })
}

pub fn export_url(export_base: &str, sheet: &SheetRef) -> String {
    format!(
        "{}/spreadsheets/d/{}/export?format=csv&gid={}",
        export_base.trim_end_matches('/'),
        sheet.sheet_id,
        sheet.gid
    )
}

#[async_trait]
pub trait SpreadsheetSource: Send + Sync {
    async fn resolve(&self, source_url: &str) -> Result<TabularData, ChartError>;
}

pub struct GoogleSheetResolver {
    http: reqwest::Client,
    export_base: String,
}

impl GoogleSheetResolver {
    pub fn new(config: &ServerConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            export_base: config.sheet_export_base.clone(),
        }
    }
}

#[async_trait]
impl SpreadsheetSource for GoogleSheetResolver {
    async fn resolve(&self, source_url: &str) -> Result<TabularData, ChartError> {
        let sheet = parse_sheet_url(source_url)?;
        let url = export_url(&self.export_base, &sheet);
        tracing::info!(sheet_id = %sheet.sheet_id, gid = sheet.gid, "fetching sheet export");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ChartError::SourceUnreachable(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ChartError::SourceNotPublic(format!(
                "export endpoint answered {status}"
            )));
        }
        // A private sheet redirects to the Google sign-in page instead of
        // failing outright.
        if response
            .url()
            .host_str()
            .is_some_and(|h| h.contains("accounts.google"))
        {
            return Err(ChartError::SourceNotPublic(
                "export redirected to a sign-in page".into(),
            ));
        }
        if !status.is_success() {
            return Err(ChartError::SourceUnreachable(format!(
                "export endpoint answered {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ChartError::SourceUnreachable(e.to_string()))?;

        if body.trim_start().starts_with('<') {
            return Err(ChartError::SourceNotPublic(
                "export returned an HTML page instead of tabular data".into(),
            ));
        }

        let data = table::to_canonical_table(&body)?;
        if data.data_row_count() == 0 {
            return Err(ChartError::SourceEmpty);
        }
        Ok(data)
    }
}
