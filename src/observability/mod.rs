//! # Observability
//!
//! Structured logging and provider metrics.

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::{describe_metrics, MetricsSnapshot, ProviderMetrics};

use crate::config::ObservabilityConfig;
use crate::secrets::Result;

/// Initialize logging and, when enabled, register metric descriptions.
pub fn init_observability(config: &ObservabilityConfig) -> Result<()> {
    init_logging(config)?;

    if config.enable_metrics {
        describe_metrics();
    }

    tracing::info!(
        service_name = %config.service_name,
        metrics_enabled = config.enable_metrics,
        "Observability initialized"
    );
    Ok(())
}
