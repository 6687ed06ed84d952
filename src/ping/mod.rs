use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use std::{collections::HashMap, sync::Arc};

use crate::clock::Clock;
use crate::db::{
    models::{DeviceFields, DeviceRecord},
    queries,
};
use crate::error::{AppError, Result};

/// Lookup → insert/update cycles before a lost race is reported to the client
const MAX_RECONCILE_ATTEMPTS: usize = 3;

/// Widest uuid the registry accepts
const MAX_UUID_LEN: usize = 36;

// ─── Payload ─────────────────────────────────────────────────────────────────

/// Body of `POST /api/device-ping`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DevicePing {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub hostname: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub os: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub mac: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub public_ip: String,
    /// Free-form geo lookup result; only country/region/city are read
    #[serde(default)]
    pub geo: Option<HashMap<String, Value>>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub latitude: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub longitude: String,
}

impl DevicePing {
    /// The uuid, if it is present and well formed
    pub fn validated_uuid(&self) -> Result<&str> {
        let uuid = self
            .uuid
            .as_deref()
            .ok_or_else(|| AppError::Validation("uuid is required".to_string()))?;

        if uuid.is_empty() {
            return Err(AppError::Validation("uuid must not be empty".to_string()));
        }
        if uuid.len() > MAX_UUID_LEN {
            return Err(AppError::Validation(format!(
                "uuid must be at most {} characters",
                MAX_UUID_LEN
            )));
        }
        if !uuid
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
        {
            return Err(AppError::Validation(
                "uuid may only contain letters, digits, '-', '_', '.' and ':'".to_string(),
            ));
        }
        Ok(uuid)
    }

    /// Columns to persist. Geo names come from `geo`, coordinates from the
    /// top-level fields; the two are not cross-checked.
    pub fn device_fields(&self) -> DeviceFields {
        DeviceFields {
            hostname: self.hostname.clone(),
            os: self.os.clone(),
            mac: self.mac.clone(),
            public_ip: self.public_ip.clone(),
            country: self.geo_text("country"),
            region: self.geo_text("region"),
            city: self.geo_text("city"),
            latitude: self.latitude.clone(),
            longitude: self.longitude.clone(),
        }
    }

    fn geo_text(&self, key: &str) -> String {
        self.geo
            .as_ref()
            .and_then(|geo| geo.get(key))
            .map(value_text)
            .unwrap_or_default()
    }
}

fn value_text(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Accepts a string, number, bool or null and yields text ("" for null)
fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s),
        Some(v @ (Value::Number(_) | Value::Bool(_))) => Ok(v.to_string()),
        Some(other) => Err(de::Error::custom(format!(
            "expected a string, found {}",
            other
        ))),
    }
}

// ─── Acknowledgement ─────────────────────────────────────────────────────────

/// Same shape whether the ping created or updated the device
#[derive(Debug, Clone, Serialize)]
pub struct PingAck {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl PingAck {
    fn received(timestamp: DateTime<Utc>) -> Self {
        PingAck {
            status: "success".into(),
            message: "Device ping received successfully".into(),
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    Created { id: i64, seen_at: DateTime<Utc> },
    Updated { seen_at: DateTime<Utc> },
}

// ─── Service ─────────────────────────────────────────────────────────────────

/// Reconciliation engine: turns pings into device rows, keyed by uuid
pub struct PingService {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl PingService {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        PingService { pool, clock }
    }

    /// Upsert the pinging device.
    ///
    /// The uniqueness constraint on `uuid` decides concurrent first pings: the
    /// loser's insert fails, and the next pass finds the winner's row and
    /// updates it. A row deleted between lookup and update is re-inserted.
    pub async fn record_ping(&self, ping: &DevicePing) -> Result<PingAck> {
        let uuid = ping.validated_uuid()?;
        let fields = ping.device_fields();

        for attempt in 1..=MAX_RECONCILE_ATTEMPTS {
            let existing = queries::find_device_by_uuid(&self.pool, uuid).await?;
            let now = self.clock.now();

            match self.reconcile(uuid, &fields, existing.as_ref(), now).await {
                Ok(Reconciled::Created { id, seen_at }) => {
                    tracing::info!(
                        "New device registered: {} ({}) id={} at {},{}",
                        fields.hostname,
                        uuid,
                        id,
                        fields.latitude,
                        fields.longitude
                    );
                    return Ok(PingAck::received(seen_at));
                }
                Ok(Reconciled::Updated { seen_at }) => {
                    tracing::info!(
                        "Device updated: {} ({}) at {},{}",
                        fields.hostname,
                        uuid,
                        fields.latitude,
                        fields.longitude
                    );
                    return Ok(PingAck::received(seen_at));
                }
                Err(AppError::ConstraintViolation(_)) | Err(AppError::NotFound(_)) => {
                    tracing::debug!(
                        "Lost reconcile race for {} (attempt {}/{})",
                        uuid,
                        attempt,
                        MAX_RECONCILE_ATTEMPTS
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::ConstraintViolation(format!(
            "device {} changed concurrently {} times",
            uuid, MAX_RECONCILE_ATTEMPTS
        )))
    }

    /// One pass of the upsert given what the lookup returned.
    ///
    /// A stale `existing` surfaces as `ConstraintViolation` (row appeared)
    /// or `NotFound` (row vanished).
    pub async fn reconcile(
        &self,
        uuid: &str,
        fields: &DeviceFields,
        existing: Option<&DeviceRecord>,
        now: DateTime<Utc>,
    ) -> Result<Reconciled> {
        match existing {
            None => {
                let id = queries::insert_device(&self.pool, uuid, fields, now).await?;
                Ok(Reconciled::Created { id, seen_at: now })
            }
            Some(record) => {
                // last_seen/updated_at never move backwards, even if the clock does
                let seen_at = now.max(record.last_seen).max(record.updated_at);
                queries::update_device(&self.pool, uuid, fields, seen_at).await?;
                Ok(Reconciled::Updated { seen_at })
            }
        }
    }
}
