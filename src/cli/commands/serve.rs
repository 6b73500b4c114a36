//! `mender serve` - start the HTTP surface.

use std::sync::Arc;

use tracing::info;

use crate::api;
use crate::application::Orchestrator;
use crate::domain::models::config::Config;

pub async fn execute(mut config: Config, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }

    let orchestrator = Arc::new(Orchestrator::from_config(&config)?);
    info!(
        workspace = %config.workspace.root,
        default_retries = config.retry.default_limit,
        "starting server"
    );
    api::serve(&config.server, orchestrator).await
}
