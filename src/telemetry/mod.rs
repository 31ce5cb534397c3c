//! Logging, redaction and in-process metrics

pub mod metrics;
pub mod redact;

pub use metrics::{time_operation, MetricsRegistry, OpSnapshot, METRICS};
pub use redact::redact_metadata;

/// Initialize the tracing subscriber for structured JSON logging
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mnnr_api=info".parse().expect("valid directive"))
                .add_directive("actix_web=info".parse().expect("valid directive")),
        )
        .json()
        .init();
}
