use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::db::models::DeviceRecord;

/// A device that pinged within this many minutes counts as online.
pub const ONLINE_WINDOW_MINUTES: i64 = 10;

/// Derived at read time from `last_seen`; never stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Online,
    Offline,
}

impl Presence {
    pub fn at(last_seen: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if now - last_seen <= Duration::minutes(ONLINE_WINDOW_MINUTES) {
            Presence::Online
        } else {
            Presence::Offline
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Presence::Online => "online",
            Presence::Offline => "offline",
        }
    }
}

/// Counts shown in the dashboard header
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PresenceSummary {
    pub total: usize,
    pub online: usize,
    pub offline: usize,
}

impl PresenceSummary {
    pub fn tally(devices: &[DeviceRecord], now: DateTime<Utc>) -> Self {
        let online = devices
            .iter()
            .filter(|d| Presence::at(d.last_seen, now) == Presence::Online)
            .count();
        PresenceSummary {
            total: devices.len(),
            online,
            offline: devices.len() - online,
        }
    }
}
