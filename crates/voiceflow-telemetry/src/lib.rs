pub mod metrics;

pub use metrics::{MetricsSnapshot, PipelineMetrics};

/// Initialize structured logging for a process.
///
/// Honors `RUST_LOG`; defaults to `info`. Safe to call more than once; the
/// second initialization is a no-op, so library tests can call it freely.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .ok();
}
