//! MNNR API
//!
//! Usage metering and API key management service for AI and agent workloads.
//! Customers mint `mnnr_live_` / `mnnr_test_` keys, meter billable events
//! through `/api/v1/track`, and read aggregates back out.

use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_actix_web::TracingLogger;

mod api;
mod cache;
mod config;
mod db;
mod maintenance;
mod retry;
mod telemetry;

use crate::api::middleware::{ApiMiddleware, ClassLimiters};
use crate::cache::MemoryCache;
use crate::config::Settings;
use crate::db::DbPool;
use crate::retry::{with_retry, RetryConfig};

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Settings,
    pub db_pool: DbPool,
    pub cache: Arc<MemoryCache>,
    pub started_at: Instant,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    telemetry::init_tracing();

    let settings = Settings::load().context("Failed to load configuration")?;
    let bind_addr = format!("{}:{}", settings.server.host, settings.server.port);

    info!(
        "Starting MNNR API v{} on {}",
        env!("CARGO_PKG_VERSION"),
        bind_addr
    );

    if settings.database.url.is_empty() {
        anyhow::bail!("DATABASE_URL is required (set MNNR_DATABASE__URL or config/local.toml)");
    }

    let db_pool = DbPool::new(&settings.database.url, settings.database.max_connections)
        .context("Failed to create database pool")?;

    // The database may still be coming up; probe with backoff before serving
    let probe_config = RetryConfig {
        max_attempts: 5,
        initial_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(8),
        backoff_multiplier: 2,
        timeout: Some(Duration::from_secs(10)),
    };
    with_retry(&probe_config, || db_pool.test_connection())
        .await
        .context("Database is unreachable")?;

    let cache = Arc::new(MemoryCache::new(
        settings.cache.max_capacity,
        Duration::from_secs(settings.cache.default_ttl_secs.max(1)),
    ));
    let limiters = Arc::new(ClassLimiters::new(&settings.rate_limit));

    maintenance::spawn_cleanup_task(db_pool.clone(), settings.retention.clone());

    let workers = settings
        .server
        .workers
        .unwrap_or_else(|| num_cpus::get() * 2);
    let default_rate_limit = settings.auth.default_rate_limit_per_minute;

    let middleware_pool = db_pool.clone();
    let app_state = web::Data::new(AppState {
        settings: settings.clone(),
        db_pool,
        cache,
        started_at: Instant::now(),
    });

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            // API middleware for auth, rate limiting, request logging
            .wrap(ApiMiddleware::new(
                middleware_pool.clone(),
                limiters.clone(),
                default_rate_limit,
            ))
            // Middleware (order matters - these wrap around ApiMiddleware)
            .wrap(TracingLogger::default())
            .wrap(middleware::Compress::default())
            .wrap(
                middleware::DefaultHeaders::new()
                    .add(("X-Service", "mnnr-api"))
                    .add(("X-Version", env!("CARGO_PKG_VERSION"))),
            )
            // Routes
            .configure(api::configure_routes)
    })
    .workers(workers)
    .bind(&bind_addr)
    .with_context(|| format!("Failed to bind {}", bind_addr))?
    .run()
    .await?;

    Ok(())
}
