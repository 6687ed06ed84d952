use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::models::{DeviceFields, DeviceRecord};
use crate::error::{AppError, Result};

const DEVICE_COLUMNS: &str = "id, uuid, hostname, os, mac, public_ip, country, region, city, \
     latitude, longitude, last_seen, created_at, updated_at";

// ─── Device queries ──────────────────────────────────────────────────────────

/// Every device, most recently seen first
pub async fn list_devices(pool: &SqlitePool) -> Result<Vec<DeviceRecord>> {
    let sql = format!(
        "SELECT {} FROM devices ORDER BY last_seen DESC, id DESC",
        DEVICE_COLUMNS
    );
    let devices = sqlx::query_as::<_, DeviceRecord>(&sql)
        .fetch_all(pool)
        .await?;
    Ok(devices)
}

pub async fn find_device_by_uuid(pool: &SqlitePool, uuid: &str) -> Result<Option<DeviceRecord>> {
    let sql = format!("SELECT {} FROM devices WHERE uuid = ?", DEVICE_COLUMNS);
    let device = sqlx::query_as::<_, DeviceRecord>(&sql)
        .bind(uuid)
        .fetch_optional(pool)
        .await?;
    Ok(device)
}

/// Insert a first-seen device and return its row id.
///
/// A duplicate `uuid` comes back as [`AppError::ConstraintViolation`] so the
/// caller can tell a lost race apart from a broken database.
pub async fn insert_device(
    pool: &SqlitePool,
    uuid: &str,
    f: &DeviceFields,
    seen_at: DateTime<Utc>,
) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO devices (uuid, hostname, os, mac, public_ip, country, region, city, latitude, longitude, last_seen, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(uuid)
    .bind(&f.hostname)
    .bind(&f.os)
    .bind(&f.mac)
    .bind(&f.public_ip)
    .bind(&f.country)
    .bind(&f.region)
    .bind(&f.city)
    .bind(&f.latitude)
    .bind(&f.longitude)
    .bind(seen_at)
    .bind(seen_at)
    .bind(seen_at)
    .execute(pool)
    .await;

    match result {
        Ok(done) => Ok(done.last_insert_rowid()),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
            AppError::ConstraintViolation(format!("device {} already exists", uuid)),
        ),
        Err(e) => Err(e.into()),
    }
}

/// Overwrite every mutable column of an existing device.
/// `id` and `created_at` are never touched.
pub async fn update_device(
    pool: &SqlitePool,
    uuid: &str,
    f: &DeviceFields,
    seen_at: DateTime<Utc>,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE devices
         SET hostname = ?, os = ?, mac = ?, public_ip = ?, country = ?, region = ?, city = ?,
             latitude = ?, longitude = ?, last_seen = ?, updated_at = ?
         WHERE uuid = ?",
    )
    .bind(&f.hostname)
    .bind(&f.os)
    .bind(&f.mac)
    .bind(&f.public_ip)
    .bind(&f.country)
    .bind(&f.region)
    .bind(&f.city)
    .bind(&f.latitude)
    .bind(&f.longitude)
    .bind(seen_at)
    .bind(seen_at)
    .bind(uuid)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("device {} not found", uuid)));
    }
    Ok(())
}

/// Hard delete. Returns the number of rows removed (0 when the uuid is unknown).
pub async fn delete_device_by_uuid(pool: &SqlitePool, uuid: &str) -> Result<u64> {
    let result = sqlx::query("DELETE FROM devices WHERE uuid = ?")
        .bind(uuid)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{memory_pool, t0};
    use chrono::Duration;

    fn fields(hostname: &str) -> DeviceFields {
        DeviceFields {
            hostname: hostname.into(),
            os: "linux".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn insert_then_find_round_trips_timestamps() {
        let pool = memory_pool().await;
        let id = insert_device(&pool, "dev-1", &fields("h1"), t0()).await.unwrap();

        let device = find_device_by_uuid(&pool, "dev-1").await.unwrap().unwrap();
        assert_eq!(device.id, id);
        assert_eq!(device.hostname, "h1");
        assert_eq!(device.country, "");
        assert_eq!(device.created_at, t0());
        assert_eq!(device.last_seen, device.created_at);
        assert_eq!(device.updated_at, device.created_at);
    }

    #[tokio::test]
    async fn find_unknown_uuid_is_none() {
        let pool = memory_pool().await;
        assert!(find_device_by_uuid(&pool, "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_insert_is_a_constraint_violation() {
        let pool = memory_pool().await;
        insert_device(&pool, "dev-1", &fields("h1"), t0()).await.unwrap();

        let err = insert_device(&pool, "dev-1", &fields("h2"), t0())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ConstraintViolation(_)));

        let all = list_devices(&pool).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].hostname, "h1");
    }

    #[tokio::test]
    async fn update_overwrites_fields_but_keeps_identity() {
        let pool = memory_pool().await;
        let id = insert_device(&pool, "dev-1", &fields("h1"), t0()).await.unwrap();

        let later = t0() + Duration::minutes(3);
        update_device(&pool, "dev-1", &fields("h2"), later).await.unwrap();

        let device = find_device_by_uuid(&pool, "dev-1").await.unwrap().unwrap();
        assert_eq!(device.id, id);
        assert_eq!(device.hostname, "h2");
        assert_eq!(device.created_at, t0());
        assert_eq!(device.last_seen, later);
        assert_eq!(device.updated_at, later);
    }

    #[tokio::test]
    async fn update_of_missing_uuid_is_not_found() {
        let pool = memory_pool().await;
        let err = update_device(&pool, "ghost", &fields("h"), t0())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_reports_rows_affected() {
        let pool = memory_pool().await;
        insert_device(&pool, "dev-1", &fields("h1"), t0()).await.unwrap();

        assert_eq!(delete_device_by_uuid(&pool, "dev-1").await.unwrap(), 1);
        assert_eq!(delete_device_by_uuid(&pool, "dev-1").await.unwrap(), 0);
        assert!(find_device_by_uuid(&pool, "dev-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_is_ordered_by_last_seen_descending() {
        let pool = memory_pool().await;
        insert_device(&pool, "old", &fields("a"), t0()).await.unwrap();
        insert_device(&pool, "new", &fields("b"), t0() + Duration::minutes(5))
            .await
            .unwrap();
        insert_device(&pool, "mid", &fields("c"), t0() + Duration::seconds(90))
            .await
            .unwrap();

        let uuids: Vec<String> = list_devices(&pool)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.uuid)
            .collect();
        assert_eq!(uuids, vec!["new", "mid", "old"]);
    }
}
