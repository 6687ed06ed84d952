use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::clock::Clock;
use crate::db::{models::DeviceRecord, queries};
use crate::error::{AppError, Result};
use crate::presence::{Presence, PresenceSummary};

/// Presence of one device as of the request
#[derive(Debug, Clone, Serialize)]
pub struct DevicePresence {
    pub uuid: String,
    pub status: Presence,
    pub last_seen: DateTime<Utc>,
}

/// Read and delete side of the registry
pub struct DeviceQueryService {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl DeviceQueryService {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        DeviceQueryService { pool, clock }
    }

    /// Full scan, most recently seen first. No paging.
    pub async fn list_devices(&self) -> Result<Vec<DeviceRecord>> {
        queries::list_devices(&self.pool).await
    }

    pub async fn get_device(&self, uuid: &str) -> Result<DeviceRecord> {
        queries::find_device_by_uuid(&self.pool, uuid)
            .await?
            .ok_or_else(|| AppError::NotFound("Device not found".to_string()))
    }

    pub async fn delete_device(&self, uuid: &str) -> Result<()> {
        if queries::delete_device_by_uuid(&self.pool, uuid).await? == 0 {
            return Err(AppError::NotFound("Device not found".to_string()));
        }
        tracing::info!("Device deleted: {}", uuid);
        Ok(())
    }

    pub async fn presence(&self, uuid: &str) -> Result<DevicePresence> {
        let device = self.get_device(uuid).await?;
        let status = Presence::at(device.last_seen, self.clock.now());
        tracing::debug!("Presence of {}: {}", uuid, status.as_str());
        Ok(DevicePresence {
            uuid: device.uuid,
            status,
            last_seen: device.last_seen,
        })
    }

    pub async fn summary(&self) -> Result<PresenceSummary> {
        let devices = self.list_devices().await?;
        Ok(PresenceSummary::tally(&devices, self.clock.now()))
    }
}
