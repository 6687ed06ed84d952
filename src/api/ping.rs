use axum::{body::Bytes, extract::State, Json};
use std::sync::Arc;

use crate::{
    error::{AppError, Result},
    ping::{DevicePing, PingAck},
    AppState,
};

/// POST /api/device-ping
///
/// The body is decoded as JSON whatever `Content-Type` the client sent.
pub async fn device_ping(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<PingAck>> {
    let ping: DevicePing = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("Invalid request body: {}", e)))?;
    let ack = state.pings.record_ping(&ping).await?;
    Ok(Json(ack))
}
