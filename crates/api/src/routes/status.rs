//! Read-only Routes

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use data_logger::LogFileInfo;
use serde::Deserialize;
use serde_json::{json, Value};
use status_service::{RawDataEntry, ServiceStatus};

use crate::{ApiError, AppState};

/// Query parameters for the raw data endpoint
#[derive(Debug, Deserialize)]
pub struct RawDataQuery {
    /// Number of newest records to return
    #[serde(default = "default_count")]
    pub count: usize,
}

fn default_count() -> usize {
    1
}

/// Decoded status, `{}` before the first datagram
pub async fn get_status(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let snapshot = state.service.status();
    Ok(Json(serde_json::to_value(&*snapshot)?))
}

pub async fn get_raw_data(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RawDataQuery>,
) -> Json<Vec<RawDataEntry>> {
    Json(state.service.raw_data(params.count))
}

/// Water heater view, `{}` until a primary block was decoded
pub async fn get_water_heater(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    match state.service.water_heater() {
        Some(heater) => Ok(Json(serde_json::to_value(heater)?)),
        None => Ok(Json(json!({}))),
    }
}

pub async fn get_service_status(State(state): State<Arc<AppState>>) -> Json<ServiceStatus> {
    Json(state.service.service_status().await)
}

/// Broadcast search for a unit, `{}` if none answered
pub async fn find_systa_comfort(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    match state.service.find_device().await? {
        Some(device) => Ok(Json(serde_json::to_value(device)?)),
        None => Ok(Json(json!({}))),
    }
}

pub async fn get_logs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<LogFileInfo>>, ApiError> {
    Ok(Json(state.service.list_logs().await?))
}
