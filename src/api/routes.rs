// src/api/routes.rs
//
// HTTP handlers for the read/control surface (spec.md §4.9): snapshots,
// device-enable map, tank list, log query/listing/download, and alarm
// thresholds.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use axum::extract::{Path as AxumPath, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::logquery;
use super::state::AppState;
use crate::alarms::Bounds;
use crate::cache;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("not found")]
    NotFound,
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

pub async fn healthz() -> &'static str {
    "ok"
}

#[derive(Serialize)]
struct FamilySummary {
    id: crate::types::FamilyId,
    device_prefix: &'static str,
    device_count: usize,
}

pub async fn list_families(State(state): State<Arc<AppState>>) -> Json<Vec<FamilySummary>> {
    let families = state.families.current().await;
    Json(
        families
            .iter()
            .map(|f| FamilySummary {
                id: f.id,
                device_prefix: f.device_prefix,
                device_count: f.devices.len(),
            })
            .collect(),
    )
}

pub async fn snapshots_all() -> Json<HashMap<String, crate::types::LiveSnapshot>> {
    Json(cache::get_all())
}

pub async fn snapshots_by_tank(AxumPath(tank_id): AxumPath<String>) -> Result<Json<crate::types::LiveSnapshot>, ApiError> {
    cache::get(&tank_id).map(Json).ok_or(ApiError::NotFound)
}

#[derive(Serialize)]
struct TankEntry {
    tank_id: String,
    family: crate::types::FamilyId,
    ip: String,
    enabled: bool,
}

pub async fn list_tanks(State(state): State<Arc<AppState>>) -> Result<Json<Vec<TankEntry>>, ApiError> {
    let enable_map = read_enable_map(&state.config.config_dir).unwrap_or_default();
    let families = state.families.current().await;
    let entries = families
        .iter()
        .flat_map(|f| {
            f.devices.iter().map(move |d| TankEntry {
                tank_id: d.tank_id.clone(),
                family: f.id,
                ip: d.ip.clone(),
                enabled: *enable_map.get(&d.tank_id).unwrap_or(&true),
            })
        })
        .collect();
    Ok(Json(entries))
}

fn enable_map_path(config_dir: &Path) -> std::path::PathBuf {
    config_dir.join("enableMap.json")
}

fn read_enable_map(config_dir: &Path) -> std::io::Result<HashMap<String, bool>> {
    match std::fs::read_to_string(enable_map_path(config_dir)) {
        Ok(text) => serde_json::from_str(&text)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
        Err(e) => Err(e),
    }
}

fn save_json_atomic<T: Serialize>(path: &Path, value: &T) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, serde_json::to_string_pretty(value)?)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

pub async fn get_enable_map(State(state): State<Arc<AppState>>) -> Result<Json<HashMap<String, bool>>, ApiError> {
    read_enable_map(&state.config.config_dir)
        .map(Json)
        .map_err(|e| ApiError::Internal(e.to_string()))
}

pub async fn set_enable_map(
    State(state): State<Arc<AppState>>,
    Json(updates): Json<HashMap<String, bool>>,
) -> Result<Json<HashMap<String, bool>>, ApiError> {
    let path = enable_map_path(&state.config.config_dir);
    let mut current = read_enable_map(&state.config.config_dir).unwrap_or_default();
    current.extend(updates);
    save_json_atomic(&path, &current).map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(current))
}

#[derive(Deserialize)]
pub struct LogQueryParams {
    tank_id: String,
    field: String,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    family: Option<String>,
}

pub async fn query_logs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LogQueryParams>,
) -> Result<Json<Vec<logquery::LogPoint>>, ApiError> {
    if params.from > params.to {
        return Err(ApiError::BadRequest("from must not be after to".to_string()));
    }
    logquery::query(
        &state.config.log_dir,
        &params.tank_id,
        &params.field,
        params.from,
        params.to,
        params.family.as_deref(),
    )
    .map(Json)
    .map_err(|e| ApiError::Internal(e.to_string()))
}

pub async fn list_logs(State(state): State<Arc<AppState>>) -> Result<Json<Vec<String>>, ApiError> {
    logquery::list_log_files(&state.config.log_dir)
        .map(Json)
        .map_err(|e| ApiError::Internal(e.to_string()))
}

pub async fn download_log(
    State(state): State<Arc<AppState>>,
    AxumPath(filename): AxumPath<String>,
) -> Result<Response, ApiError> {
    let path = logquery::resolve_log_path(&state.config.log_dir, &filename)
        .ok_or_else(|| ApiError::BadRequest("invalid log filename".to_string()))?;
    let body = std::fs::read_to_string(&path).map_err(|e| ApiError::Internal(e.to_string()))?;
    axum::http::Response::builder()
        .header(axum::http::header::CONTENT_TYPE, "application/x-ndjson")
        .body(axum::body::Body::from(body))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

#[derive(Serialize)]
pub struct ThresholdsBody {
    ph: Bounds,
    temp: Bounds,
    connectivity: ConnectivityBody,
}

#[derive(Serialize, Deserialize)]
pub struct ConnectivityBody {
    #[serde(rename = "qcAlarmsEnabled")]
    qc_alarms_enabled: bool,
}

pub async fn get_thresholds(State(state): State<Arc<AppState>>) -> Json<ThresholdsBody> {
    let config = state.alarm_engine.get_thresholds();
    Json(ThresholdsBody {
        ph: config.ph,
        temp: config.temp,
        connectivity: ConnectivityBody {
            qc_alarms_enabled: config.connectivity.qc_alarms_enabled,
        },
    })
}

#[derive(Deserialize)]
pub struct SetThresholdsBody {
    ph: Bounds,
    temp: Bounds,
    connectivity: ConnectivityBody,
}

pub async fn set_thresholds(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SetThresholdsBody>,
) -> Result<Json<ThresholdsBody>, ApiError> {
    state
        .alarm_engine
        .set_thresholds(body.ph, body.temp, body.connectivity.qc_alarms_enabled)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let config = state.alarm_engine.get_thresholds();
    Ok(Json(ThresholdsBody {
        ph: config.ph,
        temp: config.temp,
        connectivity: ConnectivityBody {
            qc_alarms_enabled: config.connectivity.qc_alarms_enabled,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enable_map_round_trips_through_atomic_save() {
        let dir = tempfile::tempdir().unwrap();
        let mut map = HashMap::new();
        map.insert("T1".to_string(), true);
        save_json_atomic(&enable_map_path(dir.path()), &map).unwrap();
        let reloaded = read_enable_map(dir.path()).unwrap();
        assert_eq!(reloaded.get("T1"), Some(&true));
    }

    #[test]
    fn missing_enable_map_yields_empty() {
        let dir = tempfile::tempdir().unwrap();
        let map = read_enable_map(dir.path()).unwrap();
        assert!(map.is_empty());
    }
}
