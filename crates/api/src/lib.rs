//! SystaComfort Bridge API Server
//!
//! Thin axum layer over the status service: decoded status, raw data,
//! water heater view, receiver and logging control, plus health and
//! Prometheus metrics.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use status_service::StatusService;
use tower_governor::GovernorLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

mod config;
mod error;
mod rate_limit;
mod routes;

pub use config::{config_path, AppConfig, ServerConfig, DEFAULT_CONFIG_FILE};
pub use error::ApiError;
pub use rate_limit::{create_governor_config, RateLimitConfig};

use routes::{control, status};

/// Application state shared across handlers
pub struct AppState {
    pub service: Arc<StatusService>,
    pub version: String,
    pub start_time: std::time::Instant,
    /// Renders the Prometheus exposition text
    pub metrics: PrometheusHandle,
}

impl AppState {
    pub fn new(service: Arc<StatusService>, metrics: PrometheusHandle) -> Self {
        Self {
            service,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
            metrics,
        }
    }
}

/// Health response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: i64,
    pub version: String,
    pub uptime_seconds: u64,
    pub receiver_running: bool,
    pub connected: bool,
}

/// Create the application router
///
/// Control routes are rate limited per peer IP.
pub fn create_router(
    state: Arc<AppState>,
    rate_limit: &RateLimitConfig,
) -> Result<Router, ApiError> {
    let governor = create_governor_config(rate_limit)?;

    let control_routes = Router::new()
        .route("/start", post(control::start))
        .route("/stop", post(control::stop))
        .route("/enablelogging", put(control::enable_logging))
        .route("/disablelogging", put(control::disable_logging))
        .route("/deletealllogs", delete(control::delete_all_logs))
        .layer(GovernorLayer { config: governor });

    let read_routes = Router::new()
        .route("/servicestatus", get(status::get_service_status))
        .route("/rawdata", get(status::get_raw_data))
        .route("/waterheater", get(status::get_water_heater))
        .route("/status", get(status::get_status))
        .route("/findsystacomfort", get(status::find_systa_comfort))
        .route("/logs", get(status::get_logs));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Ok(Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .nest("/systarest", control_routes.merge(read_routes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state))
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: chrono::Utc::now().timestamp(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        receiver_running: state.service.is_running().await,
        connected: state.service.context().is_connected(),
    })
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Initialize logging at the given level
pub fn init_logging(level: &str) -> anyhow::Result<()> {
    let level: Level = level
        .parse()
        .with_context(|| format!("Invalid log level {:?}", level))?;
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Serve HTTP until Ctrl-C, then stop logging and the receiver
pub async fn run_server(
    config: &AppConfig,
    service: Arc<StatusService>,
    metrics: PrometheusHandle,
) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(Arc::clone(&service), metrics));
    let app = create_router(state, &config.rate_limit)?;

    let addr = config.server.bind_addr();
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("API server stopped, shutting down service");
    service.shutdown().await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
