//! # Structured Logging
//!
//! Subscriber setup and span macros for the secure provider.
//!
//! Log lines never carry secret values or tokens. Secret names, key names,
//! operation names and error messages are fine.

use crate::config::ObservabilityConfig;
use crate::secrets::{Result, SecretsError};
use tracing_subscriber::EnvFilter;

/// Create a tracing span for a provider operation.
///
/// ```rust,ignore
/// let span = secret_span!("get_secret", "credentials001");
/// let span = secret_span!("store_secret", "credentials001", keys = 2);
/// ```
#[macro_export]
macro_rules! secret_span {
    ($operation:expr) => {
        tracing::debug_span!(
            "secret_operation",
            operation = %$operation,
            secret_name = tracing::field::Empty
        )
    };
    ($operation:expr, $secret_name:expr) => {
        tracing::debug_span!(
            "secret_operation",
            operation = %$operation,
            secret_name = %$secret_name
        )
    };
    ($operation:expr, $secret_name:expr, $($field:tt)*) => {
        tracing::debug_span!(
            "secret_operation",
            operation = %$operation,
            secret_name = %$secret_name,
            $($field)*
        )
    };
}

/// Install the global fmt subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. If a subscriber is
/// already installed (tests, embedding processes) this is a no-op.
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(_) => EnvFilter::from_default_env(),
        Err(_) => EnvFilter::try_new(&config.log_level).map_err(|e| {
            SecretsError::config_error(format!("invalid log level '{}': {}", config.log_level, e))
        })?,
    };

    let installed = if config.json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter).with_target(true).try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init()
    };

    if installed.is_err() {
        // Subscriber already set elsewhere; keep it.
        return Ok(());
    }

    tracing::debug!(
        service_name = %config.service_name,
        log_level = %config.log_level,
        json_logging = config.json_logging,
        "Logging initialized"
    );
    Ok(())
}
