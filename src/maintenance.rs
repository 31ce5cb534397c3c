//! Background maintenance loop
//!
//! Periodically prunes expired rate-limit windows and request logs past the
//! retention horizon.

use std::time::Duration;
use tracing::{info, warn};

use crate::config::RetentionSettings;
use crate::db::{DbPool, UsageRepository};

/// Spawn the cleanup task. Runs for the lifetime of the process.
pub fn spawn_cleanup_task(pool: DbPool, retention: RetentionSettings) {
    let interval = Duration::from_secs(retention.cleanup_interval_secs.max(30));
    let retention_days = retention.request_log_days;

    tokio::spawn(async move {
        let repo = UsageRepository::new(pool);
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so startup stays quiet
        ticker.tick().await;

        info!(
            interval_secs = interval.as_secs(),
            retention_days, "Maintenance task started"
        );

        loop {
            ticker.tick().await;

            if let Err(e) = repo.cleanup_rate_limits().await {
                warn!(error = %e, "Rate limit window cleanup failed");
            }

            if let Err(e) = repo.cleanup_request_logs(retention_days).await {
                warn!(error = %e, "Request log cleanup failed");
            }
        }
    });
}
