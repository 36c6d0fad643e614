use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_HTTP_BIND: &str = "127.0.0.1:8080";
const DEFAULT_API_BASE: &str = "https://api.datawrapper.de/v3";
const DEFAULT_PUBLIC_BASE: &str = "https://www.datawrapper.de";
const DEFAULT_EXPORT_BASE: &str = "https://docs.google.com";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub http_bind_address: SocketAddr,
    /// Datawrapper API token. Optional at startup so the binary can boot in
    /// environments that inject it later; enforced per remote call.
    pub datawrapper_token: Option<String>,
    pub api_base: String,
    pub public_base: String,
    /// Base for the sheet CSV export endpoint. Share-URL validation is fixed
    /// to docs.google.com; only the fetch target is rebindable.
    pub sheet_export_base: String,
    pub request_timeout_ms: Option<u64>,
    /// When set, requests must carry this value in the `x-api-key` header.
    pub api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_bind_address: DEFAULT_HTTP_BIND.parse().expect("default bind address valid"),
            datawrapper_token: None,
            api_base: DEFAULT_API_BASE.to_string(),
            public_base: DEFAULT_PUBLIC_BASE.to_string(),
            sheet_export_base: DEFAULT_EXPORT_BASE.to_string(),
            request_timeout_ms: Some(DEFAULT_REQUEST_TIMEOUT_MS),
            api_key: None,
        }
    }
}

impl ServerConfig {
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let CliArgs {
            config,
            http_bind: cli_http_bind,
            datawrapper_token: cli_token,
            api_base: cli_api_base,
            public_base: cli_public_base,
            sheet_export_base: cli_export_base,
            request_timeout_ms: cli_timeout,
            api_key: cli_api_key,
        } = args;

        let file_config = if let Some(path) = config.as_ref() {
            load_config_file(path)?
        } else {
            PartialConfig::default()
        };

        let PartialConfig {
            http_bind: file_http_bind,
            datawrapper_token: file_token,
            api_base: file_api_base,
            public_base: file_public_base,
            sheet_export_base: file_export_base,
            request_timeout_ms: file_timeout,
            api_key: file_api_key,
        } = file_config;

        let http_bind_address = cli_http_bind.or(file_http_bind).unwrap_or_else(|| {
            DEFAULT_HTTP_BIND
                .parse()
                .expect("default bind address valid")
        });

        let datawrapper_token = cli_token
            .or(file_token)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let api_base = normalize_base(
            cli_api_base
                .or(file_api_base)
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        )?;
        let public_base = normalize_base(
            cli_public_base
                .or(file_public_base)
                .unwrap_or_else(|| DEFAULT_PUBLIC_BASE.to_string()),
        )?;
        let sheet_export_base = normalize_base(
            cli_export_base
                .or(file_export_base)
                .unwrap_or_else(|| DEFAULT_EXPORT_BASE.to_string()),
        )?;

        let request_timeout_ms = cli_timeout
            .or(file_timeout)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS);
        let request_timeout_ms = if request_timeout_ms == 0 {
            None
        } else {
            Some(request_timeout_ms)
        };

        let api_key = cli_api_key.or(file_api_key).filter(|k| !k.is_empty());

        Ok(Self {
            http_bind_address,
            datawrapper_token,
            api_base,
            public_base,
            sheet_export_base,
            request_timeout_ms,
            api_key,
        })
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

fn normalize_base(base: String) -> Result<String> {
    let trimmed = base.trim().trim_end_matches('/').to_string();
    anyhow::ensure!(
        trimmed.starts_with("http://") || trimmed.starts_with("https://"),
        "base URL '{base}' must start with http:// or https://"
    );
    Ok(trimmed)
}

#[derive(Parser, Debug, Default, Clone)]
#[command(
    name = "chart-agent-api",
    about = "Chart publishing API for conversational agents",
    version
)]
pub struct CliArgs {
    #[arg(
        long,
        value_name = "FILE",
        help = "Path to a configuration file (YAML or JSON)",
        global = true
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        env = "CHART_AGENT_HTTP_BIND",
        value_name = "ADDR",
        help = "HTTP bind address"
    )]
    pub http_bind: Option<SocketAddr>,

    #[arg(
        long,
        env = "DATAWRAPPER_TOKEN",
        value_name = "TOKEN",
        hide_env_values = true,
        help = "Datawrapper API token"
    )]
    pub datawrapper_token: Option<String>,

    #[arg(
        long,
        env = "CHART_AGENT_API_BASE",
        value_name = "URL",
        help = "Datawrapper API base URL"
    )]
    pub api_base: Option<String>,

    #[arg(
        long,
        env = "CHART_AGENT_PUBLIC_BASE",
        value_name = "URL",
        help = "Base URL for published chart links"
    )]
    pub public_base: Option<String>,

    #[arg(
        long,
        env = "CHART_AGENT_SHEET_EXPORT_BASE",
        value_name = "URL",
        help = "Base URL for the spreadsheet CSV export endpoint"
    )]
    pub sheet_export_base: Option<String>,

    #[arg(
        long,
        env = "CHART_AGENT_REQUEST_TIMEOUT_MS",
        value_name = "MS",
        help = "Timeout for remote calls in milliseconds (default: 30000; 0 disables)",
        value_parser = clap::value_parser!(u64)
    )]
    pub request_timeout_ms: Option<u64>,

    #[arg(
        long,
        env = "CHART_AGENT_API_KEY",
        value_name = "KEY",
        hide_env_values = true,
        help = "Require this value in the x-api-key header of every request"
    )]
    pub api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    http_bind: Option<SocketAddr>,
    datawrapper_token: Option<String>,
    api_base: Option<String>,
    public_base: Option<String>,
    sheet_export_base: Option<String>,
    request_timeout_ms: Option<u64>,
    api_key: Option<String>,
}

fn load_config_file(path: &Path) -> Result<PartialConfig> {
    if !path.exists() {
        anyhow::bail!("config file {:?} does not exist", path);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    let ext = path
        .extension()
        .and_then(|os| os.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let parsed = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse YAML config {:?}", path))?,
        "json" => serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse JSON config {:?}", path))?,
        other => anyhow::bail!("unsupported config extension: {other}"),
    };
    Ok(parsed)
}
