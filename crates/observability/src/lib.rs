//! # Observability
//!
//! Tracing + Prometheus metrics for the collar step service.
//!
//! ## Features
//!
//! - Tracing initialization (JSON / Pretty / Compact)
//! - Prometheus metrics export
//! - Per-chunk step metrics and run aggregation
//!
//! ## Example
//!
//! ```ignore
//! use observability::metrics;
//!
//! observability::init_with_config(&blueprint.observability)?;
//!
//! let outcome = engine.process_chunk(request).await?;
//! metrics::record_chunk_outcome(&outcome);
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use contracts::{LogFormat, ObservabilitySettings};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Re-exports
pub use crate::metrics::{
    record_behavior_deltas, record_chunk_failure, record_chunk_outcome, record_duplicate_samples,
    record_params_updated, record_sessions_evicted, set_active_sessions, MetricsSummary,
    RunningStats, StatsSummary, StepMetricsAggregator,
};

/// Initialize tracing and, when a port is configured, the Prometheus exporter
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_with_config(settings: &ObservabilitySettings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));

    match settings.log_format {
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
                .context("Failed to initialize tracing subscriber")?;
        }
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer().pretty();

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
                .context("Failed to initialize tracing subscriber")?;
        }
        LogFormat::Compact => {
            let fmt_layer = fmt::layer().compact();

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
                .context("Failed to initialize tracing subscriber")?;
        }
    }

    if let Some(port) = settings.metrics_port {
        init_metrics_only(port)?;
    }

    tracing::info!(
        log_format = ?settings.log_format,
        metrics_port = ?settings.metrics_port,
        "Observability initialized"
    );

    Ok(())
}

/// Install the Prometheus exporter only (tracing set up elsewhere)
pub fn init_metrics_only(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus recorder")?;

    tracing::info!(port = port, "Prometheus metrics endpoint initialized");
    Ok(())
}
