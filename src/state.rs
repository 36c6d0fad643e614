use crate::client::{ChartService, DatawrapperClient};
use crate::config::ServerConfig;
use crate::orchestrator::ChartSessionOrchestrator;
use crate::resolver::{GoogleSheetResolver, SpreadsheetSource};
use anyhow::Result;
use std::sync::Arc;

pub struct AppState {
    config: Arc<ServerConfig>,
    orchestrator: ChartSessionOrchestrator,
}

impl AppState {
    /// Wire the real resolver and Datawrapper client over one shared
    /// connection pool with the configured timeout.
    pub fn new(config: Arc<ServerConfig>) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("chart-agent-api/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        let source: Arc<dyn SpreadsheetSource> =
            Arc::new(GoogleSheetResolver::new(&config, http.clone()));
        let charts: Arc<dyn ChartService> = Arc::new(DatawrapperClient::new(&config, http));

        Ok(Self::with_services(config, source, charts))
    }

    /// Assemble state from explicit collaborators. Tests use this to swap in
    /// in-memory fakes.
    pub fn with_services(
        config: Arc<ServerConfig>,
        source: Arc<dyn SpreadsheetSource>,
        charts: Arc<dyn ChartService>,
    ) -> Self {
        Self {
            config,
            orchestrator: ChartSessionOrchestrator::new(source, charts),
        }
    }

    pub fn config(&self) -> Arc<ServerConfig> {
        self.config.clone()
    }

    pub fn orchestrator(&self) -> &ChartSessionOrchestrator {
        &self.orchestrator
    }
}
