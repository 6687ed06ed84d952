use chrono::{DateTime, Utc};
use serde::Serialize;

// ─── Device ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct DeviceRecord {
    pub id: i64,
    pub uuid: String,
    pub hostname: String,
    pub os: String,
    pub mac: String,       // free text, not validated as a MAC
    pub public_ip: String, // free text, not validated as an address
    pub country: String,
    pub region: String,
    pub city: String,
    pub latitude: String,
    pub longitude: String,
    pub last_seen: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The columns a ping overwrites. Absent values are empty strings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceFields {
    pub hostname: String,
    pub os: String,
    pub mac: String,
    pub public_ip: String,
    pub country: String,
    pub region: String,
    pub city: String,
    pub latitude: String,
    pub longitude: String,
}
