//! Control Routes
//!
//! Start and stop the receiver, manage logging sessions and log files.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use data_logger::{LoggerStatus, LoggingSettings};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{ApiError, AppState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiverResponse {
    pub running: bool,
    /// False when the receiver already was in the requested state
    pub changed: bool,
}

/// Query parameters for enabling logging, missing ones use the defaults
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnableLoggingQuery {
    pub file_prefix: Option<String>,
    pub log_entry_delimiter: Option<String>,
    pub entries_per_file: Option<usize>,
}

impl EnableLoggingQuery {
    fn into_settings(self, defaults: LoggingSettings) -> LoggingSettings {
        LoggingSettings {
            file_prefix: self.file_prefix.unwrap_or(defaults.file_prefix),
            delimiter: self.log_entry_delimiter.unwrap_or(defaults.delimiter),
            entries_per_file: self.entries_per_file.unwrap_or(defaults.entries_per_file),
            root_path: defaults.root_path,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteLogsResponse {
    pub deleted: usize,
}

pub async fn start(State(state): State<Arc<AppState>>) -> Result<Json<ReceiverResponse>, ApiError> {
    let changed = state.service.start().await?;
    Ok(Json(ReceiverResponse {
        running: true,
        changed,
    }))
}

pub async fn stop(State(state): State<Arc<AppState>>) -> Result<Json<ReceiverResponse>, ApiError> {
    let changed = state.service.stop().await?;
    Ok(Json(ReceiverResponse {
        running: false,
        changed,
    }))
}

pub async fn enable_logging(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EnableLoggingQuery>,
) -> Result<Json<LoggerStatus>, ApiError> {
    let settings = params.into_settings(state.service.default_logging_settings());
    state.service.enable_logging(settings).await?;
    Ok(Json(state.service.logger_status().await))
}

pub async fn disable_logging(
    State(state): State<Arc<AppState>>,
) -> Result<Json<LoggerStatus>, ApiError> {
    if !state.service.disable_logging().await? {
        info!("Disable requested while no logging session was active");
    }
    Ok(Json(state.service.logger_status().await))
}

pub async fn delete_all_logs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DeleteLogsResponse>, ApiError> {
    let deleted = state.service.delete_logs().await?;
    Ok(Json(DeleteLogsResponse { deleted }))
}
