use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::{
    db::models::DeviceRecord,
    error::Result,
    presence::PresenceSummary,
    query::DevicePresence,
    AppState,
};

/// GET /api/devices
pub async fn list_devices(State(state): State<Arc<AppState>>) -> Result<Json<Vec<DeviceRecord>>> {
    Ok(Json(state.devices.list_devices().await?))
}

/// GET /api/devices/summary
pub async fn presence_summary(State(state): State<Arc<AppState>>) -> Result<Json<PresenceSummary>> {
    Ok(Json(state.devices.summary().await?))
}

/// GET /api/device/:uuid
pub async fn get_device(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<String>,
) -> Result<Json<DeviceRecord>> {
    Ok(Json(state.devices.get_device(&uuid).await?))
}

/// GET /api/device/:uuid/presence
pub async fn device_presence(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<String>,
) -> Result<Json<DevicePresence>> {
    Ok(Json(state.devices.presence(&uuid).await?))
}

/// DELETE /api/device/:uuid
pub async fn delete_device(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<String>,
) -> Result<Json<serde_json::Value>> {
    state.devices.delete_device(&uuid).await?;
    Ok(Json(
        serde_json::json!({ "message": "Device deleted successfully" }),
    ))
}
