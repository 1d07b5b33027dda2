//! SystaComfort Bridge - Main Entry Point

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use api::{config_path, init_logging, run_server, AppConfig};
use metrics_exporter_prometheus::PrometheusBuilder;
use status_service::StatusService;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = config_path();
    let config = AppConfig::load(Path::new(&path))
        .with_context(|| format!("Failed to load configuration from {}", path))?;
    init_logging(&config.log_level)?;

    info!("=== SystaComfort Bridge v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", path);

    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    let service = Arc::new(StatusService::new(config.service.clone())?);
    if config.service.autostart {
        service.start().await?;
    } else {
        info!("Receiver autostart disabled, waiting for POST /systarest/start");
    }

    run_server(&config, service, metrics).await
}
