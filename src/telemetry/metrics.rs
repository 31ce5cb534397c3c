//! In-process operation metrics
//!
//! Lightweight per-operation counters surfaced on the public status endpoint.
//! Operations slower than one second are logged at warn level.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::warn;

/// Threshold above which an operation is considered slow
const SLOW_OP_THRESHOLD: Duration = Duration::from_secs(1);

/// Process-wide metrics registry
pub static METRICS: Lazy<MetricsRegistry> = Lazy::new(MetricsRegistry::new);

#[derive(Debug, Default, Clone)]
struct OpStats {
    count: u64,
    errors: u64,
    total_ms: u64,
    max_ms: u64,
}

/// Point-in-time view of one operation's counters
#[derive(Debug, Clone, Serialize)]
pub struct OpSnapshot {
    pub operation: String,
    pub count: u64,
    pub errors: u64,
    pub avg_ms: u64,
    pub max_ms: u64,
}

pub struct MetricsRegistry {
    ops: RwLock<HashMap<String, OpStats>>,
}

impl MetricsRegistry {
    fn new() -> Self {
        MetricsRegistry {
            ops: RwLock::new(HashMap::new()),
        }
    }

    /// Record one completed operation
    pub fn record(&self, operation: &str, duration: Duration, success: bool) {
        let elapsed_ms = duration.as_millis() as u64;

        if duration > SLOW_OP_THRESHOLD {
            warn!(operation, elapsed_ms, "Slow operation");
        }

        let mut ops = self.ops.write();
        let stats = ops.entry(operation.to_string()).or_default();
        stats.count += 1;
        if !success {
            stats.errors += 1;
        }
        stats.total_ms += elapsed_ms;
        stats.max_ms = stats.max_ms.max(elapsed_ms);
    }

    /// Snapshot all operations, sorted by name for stable output
    pub fn snapshot(&self) -> Vec<OpSnapshot> {
        let ops = self.ops.read();
        let mut out: Vec<OpSnapshot> = ops
            .iter()
            .map(|(name, stats)| OpSnapshot {
                operation: name.clone(),
                count: stats.count,
                errors: stats.errors,
                avg_ms: if stats.count > 0 { stats.total_ms / stats.count } else { 0 },
                max_ms: stats.max_ms,
            })
            .collect();
        out.sort_by(|a, b| a.operation.cmp(&b.operation));
        out
    }

    #[cfg(test)]
    fn reset(&self) {
        self.ops.write().clear();
    }
}

/// Time an async operation against the global registry.
/// Success is judged by the Result variant.
pub async fn time_operation<F, Fut, T, E>(operation: &str, op: F) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let start = Instant::now();
    let result = op().await;
    METRICS.record(operation, start.elapsed(), result.is_ok());
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_counts_and_errors() {
        let registry = MetricsRegistry::new();
        registry.record("db.track", Duration::from_millis(10), true);
        registry.record("db.track", Duration::from_millis(30), false);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        let op = &snapshot[0];
        assert_eq!(op.operation, "db.track");
        assert_eq!(op.count, 2);
        assert_eq!(op.errors, 1);
        assert_eq!(op.avg_ms, 20);
        assert_eq!(op.max_ms, 30);
    }

    #[test]
    fn snapshot_is_sorted_by_operation() {
        let registry = MetricsRegistry::new();
        registry.record("z.op", Duration::from_millis(1), true);
        registry.record("a.op", Duration::from_millis(1), true);

        let names: Vec<_> = registry.snapshot().into_iter().map(|s| s.operation).collect();
        assert_eq!(names, vec!["a.op", "z.op"]);
    }

    #[tokio::test]
    async fn time_operation_feeds_the_global_registry() {
        METRICS.reset();

        let ok: Result<u32, &str> = time_operation("test.op", || async { Ok(1) }).await;
        assert!(ok.is_ok());
        let err: Result<u32, &str> = time_operation("test.op", || async { Err("boom") }).await;
        assert!(err.is_err());

        let snapshot = METRICS.snapshot();
        let op = snapshot.iter().find(|s| s.operation == "test.op").expect("recorded");
        assert_eq!(op.count, 2);
        assert_eq!(op.errors, 1);
    }
}
