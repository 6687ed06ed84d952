pub mod models;
pub mod queries;

use anyhow::Result;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::{str::FromStr, time::Duration};

pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<SqlitePool> {
    // Parse the URL into connect options and enable file creation
    let connect_opts = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    let in_memory = is_in_memory(database_url);

    // Ensure the parent directory exists before sqlx tries to open the file
    if !in_memory {
        if let Some(filename) = connect_opts.clone().get_filename().to_str() {
            if let Some(parent) = std::path::Path::new(filename).parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
        }
    }

    // An in-memory database lives only as long as its connection
    let pool_opts = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
    } else {
        SqlitePoolOptions::new().max_connections(max_connections)
    };

    let pool = pool_opts.connect_with(connect_opts).await?;

    ensure_schema(&pool).await?;

    tracing::info!("Database initialized at {}", database_url);
    Ok(pool)
}

/// Create the devices table and its recency index. Safe to run on every start.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS devices (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid        TEXT NOT NULL UNIQUE,
            hostname    TEXT NOT NULL DEFAULT '',
            os          TEXT NOT NULL DEFAULT '',
            mac         TEXT NOT NULL DEFAULT '',
            public_ip   TEXT NOT NULL DEFAULT '',
            country     TEXT NOT NULL DEFAULT '',
            region      TEXT NOT NULL DEFAULT '',
            city        TEXT NOT NULL DEFAULT '',
            latitude    TEXT NOT NULL DEFAULT '',
            longitude   TEXT NOT NULL DEFAULT '',
            last_seen   TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_devices_last_seen ON devices (last_seen)")
        .execute(pool)
        .await?;

    tracing::debug!("Device table created/verified");
    Ok(())
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}
