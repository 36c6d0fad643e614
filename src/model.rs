use crate::errors::ChartError;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize, de};
use strum::{EnumIter, IntoEnumIterator};
use {once_cell::sync::Lazy, regex::Regex};

static HEX_COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#?([0-9a-fA-F]{6}|[0-9a-fA-F]{3})$").unwrap());

/// The fixed allow-list of chart kinds the service will create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum ChartType {
    Bars,
    StackedBars,
    GroupedBars,
    HorizontalBars,
    Line,
    MultipleLines,
    Pie,
    Scatter,
    ChoroplethMap,
    SymbolMap,
}

impl ChartType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bars => "d3-bars",
            Self::StackedBars => "d3-bars-stacked",
            Self::GroupedBars => "d3-bars-grouped",
            Self::HorizontalBars => "d3-bars-horizontal",
            Self::Line => "d3-lines",
            Self::MultipleLines => "d3-multiple-lines",
            Self::Pie => "d3-pies",
            Self::Scatter => "d3-scatter-plot",
            Self::ChoroplethMap => "d3-maps-choropleth",
            Self::SymbolMap => "d3-maps-symbols",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ChartError> {
        let wanted = value.trim().to_ascii_lowercase();
        ChartType::iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| ChartError::UnsupportedChartType {
                got: value.to_string(),
                valid: Self::valid_list(),
            })
    }

    pub fn valid_list() -> String {
        ChartType::iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl std::fmt::Display for ChartType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ChartType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ChartType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ChartType::parse(&s).map_err(|_| {
            de::Error::custom(format!(
                "unknown chart type '{s}', expected one of: {}",
                ChartType::valid_list()
            ))
        })
    }
}

/// Wire shape of `POST /create_chart_id`. Fields stay optional so validation
/// can name every offending field instead of failing on the first.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateChartRequest {
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub chart_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// A creation request that passed validation. Immutable once accepted.
#[derive(Debug, Clone)]
pub struct ChartCreationRequest {
    pub source_url: String,
    pub chart_type: ChartType,
    pub title: String,
}

/// Wire shape of `POST /update_chart`. Everything except `chart_id` is
/// optional; omitted fields leave prior remote values untouched. Omission
/// and empty string are distinct on purpose.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChartMetadataUpdate {
    #[serde(default)]
    pub chart_id: Option<String>,
    pub intro: Option<String>,
    pub byline: Option<String>,
    pub source_name: Option<String>,
    pub source_url: Option<String>,
    pub custom_colors: Option<CustomColors>,
}

/// Dual-input color spec: a category-name→hex mapping, or an ordered color
/// sequence that gets assigned to the data's category order. Anything else
/// that parses as JSON lands in `Other` and is rejected during validation
/// with `InvalidColorSpec` rather than a generic deserialization error.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CustomColors {
    Mapping(IndexMap<String, String>),
    Sequence(Vec<String>),
    Other(serde_json::Value),
}

impl CustomColors {
    /// Validate hex syntax and normalize every color to lowercase `#`-form,
    /// keeping the mapping-vs-sequence distinction. No network involved.
    pub fn normalized(&self) -> Result<NormalizedColors, ChartError> {
        match self {
            Self::Mapping(map) => {
                let mut out = IndexMap::with_capacity(map.len());
                for (category, color) in map {
                    out.insert(category.clone(), normalize_hex_color(category, color)?);
                }
                Ok(NormalizedColors::Mapping(out))
            }
            Self::Sequence(colors) => {
                let mut out = Vec::with_capacity(colors.len());
                for (idx, color) in colors.iter().enumerate() {
                    out.push(normalize_hex_color(&format!("index {idx}"), color)?);
                }
                Ok(NormalizedColors::Sequence(out))
            }
            Self::Other(value) => Err(ChartError::InvalidColorSpec(format!(
                "expected a name-to-hex mapping or a list of hex strings, got {}",
                json_type_name(value)
            ))),
        }
    }
}

/// Syntax-checked colors, still awaiting category assignment when a sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedColors {
    Mapping(IndexMap<String, String>),
    Sequence(Vec<String>),
}

fn normalize_hex_color(key: &str, color: &str) -> Result<String, ChartError> {
    let trimmed = color.trim();
    if !HEX_COLOR_RE.is_match(trimmed) {
        return Err(ChartError::InvalidColorSpec(format!(
            "'{color}' (for {key}) is not a hex color like #005c7a"
        )));
    }
    let digits = trimmed.trim_start_matches('#').to_ascii_lowercase();
    Ok(format!("#{digits}"))
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Canonical row/column table. First row is the header. Cell text is kept
/// verbatim; the charting service does its own type inference. Ragged rows
/// are tolerated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TabularData {
    pub rows: Vec<Vec<String>>,
}

impl TabularData {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    pub fn header(&self) -> Option<&[String]> {
        self.rows.first().map(|r| r.as_slice())
    }

    pub fn data_rows(&self) -> &[Vec<String>] {
        if self.rows.len() > 1 { &self.rows[1..] } else { &[] }
    }

    pub fn data_row_count(&self) -> usize {
        self.rows.len().saturating_sub(1)
    }

    /// Distinct first-column values of the data rows, in first-appearance
    /// order. This is the category order a color sequence is assigned to.
    pub fn category_order(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for row in self.data_rows() {
            let Some(first) = row.first() else { continue };
            if !first.is_empty() && !seen.iter().any(|s| s == first) {
                seen.push(first.clone());
            }
        }
        seen
    }
}

/// The caller-held association between one remote chart id and the edits
/// applied to it. The server never stores one; `finalized` is a client-side
/// convention signaling "stop reusing this id", not a remote state.
#[derive(Debug, Clone, Serialize)]
pub struct ChartSession {
    pub chart_id: String,
    pub created_at: DateTime<Utc>,
    pub finalized: bool,
}

impl ChartSession {
    pub fn new(chart_id: String) -> Self {
        Self {
            chart_id,
            created_at: Utc::now(),
            finalized: false,
        }
    }
}

/// The canonical metadata payload sent to the charting service. Holds only
/// the fields present on the originating update; an omitted field is never
/// sent, so it can never overwrite a prior remote value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataPatch {
    pub intro: Option<String>,
    pub byline: Option<String>,
    pub source_name: Option<String>,
    pub source_url: Option<String>,
    pub custom_colors: Option<IndexMap<String, String>>,
}

impl MetadataPatch {
    pub fn is_empty(&self) -> bool {
        self.intro.is_none()
            && self.byline.is_none()
            && self.source_name.is_none()
            && self.source_url.is_none()
            && self.custom_colors.is_none()
    }

    /// Datawrapper PATCH body: `metadata.describe.*` plus
    /// `metadata.visualize.custom-colors`, present fields only.
    pub fn to_payload(&self) -> serde_json::Value {
        let mut describe = serde_json::Map::new();
        if let Some(intro) = &self.intro {
            describe.insert("intro".into(), intro.clone().into());
        }
        if let Some(byline) = &self.byline {
            describe.insert("byline".into(), byline.clone().into());
        }
        if let Some(source_name) = &self.source_name {
            describe.insert("source-name".into(), source_name.clone().into());
        }
        if let Some(source_url) = &self.source_url {
            describe.insert("source-url".into(), source_url.clone().into());
        }

        let mut metadata = serde_json::Map::new();
        if !describe.is_empty() {
            metadata.insert("describe".into(), describe.into());
        }
        if let Some(colors) = &self.custom_colors {
            metadata.insert(
                "visualize".into(),
                serde_json::json!({ "custom-colors": colors }),
            );
        }

        serde_json::json!({ "metadata": metadata })
    }
}
