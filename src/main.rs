use anyhow::Result;
use chart_agent_api::config::{CliArgs, ServerConfig};
use chart_agent_api::server;
use chart_agent_api::state::AppState;
use clap::Parser;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let args = CliArgs::parse();
    let config = Arc::new(ServerConfig::from_args(args)?);

    if config.datawrapper_token.is_none() {
        tracing::warn!("no Datawrapper token configured, chart operations will fail");
    }
    if config.api_key.is_none() {
        tracing::warn!("no api key configured, requests are unauthenticated");
    }

    let state = Arc::new(AppState::new(config)?);
    server::serve(state).await
}
