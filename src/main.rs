mod api;
mod clock;
mod config;
mod db;
mod error;
mod ping;
mod presence;
mod query;
#[cfg(test)]
mod test_support;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::{path::Path, sync::Arc};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{clock::SystemClock, config::Config, ping::PingService, query::DeviceQueryService};

// ─── App State ───────────────────────────────────────────────────────────────

pub struct AppState {
    pub pings: Arc<PingService>,
    pub devices: Arc<DeviceQueryService>,
}

// ─── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ka_ping=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("=== Ka-Ping device registry starting ===");

    // Database: refuse to serve if it cannot be opened or the schema cannot be created
    let pool = db::init_pool(&config.database_url, config.max_connections).await?;
    tracing::info!("Database ready");

    let clock = Arc::new(SystemClock);
    let state = Arc::new(AppState {
        pings: Arc::new(PingService::new(pool.clone(), clock.clone())),
        devices: Arc::new(DeviceQueryService::new(pool, clock)),
    });

    let app = build_router(state, &config.static_dir);

    let addr = config.server_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("Dashboard: http://localhost:{}", config.port);

    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>, static_dir: &Path) -> Router {
    Router::new()
        // Check-ins
        .route("/api/device-ping", post(api::ping::device_ping))
        // Devices
        .route("/api/devices", get(api::devices::list_devices))
        .route("/api/devices/summary", get(api::devices::presence_summary))
        .route(
            "/api/device/:uuid",
            get(api::devices::get_device).delete(api::devices::delete_device),
        )
        .route("/api/device/:uuid/presence", get(api::devices::device_presence))
        // Dashboard
        .route("/", get(api::dashboard::index))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(api::middleware::cors_layer())
        .layer(axum::middleware::from_fn(api::middleware::preflight_no_content))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
