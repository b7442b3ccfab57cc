//! # Configuration Settings
//!
//! Secret store and observability settings, read from the environment.

use crate::secrets::{Result, SecretsError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use validator::{Validate, ValidationError};

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct ProviderConfig {
    #[validate(nested)]
    pub secret_store: SecretStoreConfig,

    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

impl ProviderConfig {
    /// Read every section from the environment. Not validated; callers apply
    /// their overrides first and then call [`ProviderConfig::validate_all`].
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            secret_store: SecretStoreConfig::from_lookup(&lookup),
            observability: ObservabilityConfig::from_lookup(&lookup),
        }
    }

    /// Validate every section and map failures to a configuration error.
    pub fn validate_all(&self) -> Result<()> {
        self.secret_store.validate_all()?;
        self.validate()
            .map_err(|e| SecretStoreConfig::validation_error("configuration", e))
    }
}

/// Connection and file settings for the service's secret store
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SecretStoreConfig {
    /// Store implementation (vault, openbao)
    #[validate(custom(function = "validate_store_type"))]
    pub store_type: String,

    /// http or https
    #[validate(custom(function = "validate_protocol"))]
    pub protocol: String,

    #[validate(length(min = 1, message = "Secret store host cannot be empty"))]
    pub host: String,

    #[validate(range(min = 1, max = 65535, message = "Secret store port must be 1-65535"))]
    pub port: u32,

    /// Base KV path of the service's secrets, e.g. `secret/edgex/core-data`
    #[validate(length(min = 1, message = "Secret store path cannot be empty"))]
    pub store_path: String,

    /// File holding the service's access token
    pub token_file: PathBuf,

    /// Optional seeding document imported at startup
    pub secrets_file: Option<PathBuf>,

    /// Leave the seeding document untouched after import
    pub disable_scrub_secrets_file: bool,

    /// Optional namespace header (enterprise/OpenBao namespaces)
    pub namespace: Option<String>,

    #[validate(range(min = 1, max = 300000, message = "Timeout must be between 1ms and 300s"))]
    pub timeout_ms: u64,
}

impl Default for SecretStoreConfig {
    fn default() -> Self {
        Self {
            store_type: "vault".to_string(),
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 8200,
            store_path: "secret".to_string(),
            token_file: PathBuf::from("/tmp/secrets/secrets-token.json"),
            secrets_file: None,
            disable_scrub_secrets_file: false,
            namespace: None,
            timeout_ms: 5000,
        }
    }
}

fn validate_store_type(store_type: &str) -> std::result::Result<(), ValidationError> {
    match store_type {
        "vault" | "openbao" => Ok(()),
        _ => Err(ValidationError::new("invalid_store_type")),
    }
}

fn validate_protocol(protocol: &str) -> std::result::Result<(), ValidationError> {
    match protocol {
        "http" | "https" => Ok(()),
        _ => Err(ValidationError::new("invalid_protocol")),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_bool(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}

impl SecretStoreConfig {
    /// Read `SECRETSTORE_*` variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            store_type: lookup("SECRETSTORE_TYPE").unwrap_or(defaults.store_type),
            protocol: lookup("SECRETSTORE_PROTOCOL").unwrap_or(defaults.protocol),
            host: lookup("SECRETSTORE_HOST").unwrap_or(defaults.host),
            port: lookup("SECRETSTORE_PORT")
                .and_then(|s| s.parse::<u32>().ok())
                .unwrap_or(defaults.port),
            store_path: lookup("SECRETSTORE_PATH").unwrap_or(defaults.store_path),
            token_file: lookup("SECRETSTORE_TOKENFILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.token_file),
            secrets_file: non_empty(lookup("SECRETSTORE_SECRETSFILE")).map(PathBuf::from),
            disable_scrub_secrets_file: lookup("SECRETSTORE_DISABLESCRUBSECRETSFILE")
                .map(|s| parse_bool(&s))
                .unwrap_or(defaults.disable_scrub_secrets_file),
            namespace: non_empty(lookup("SECRETSTORE_NAMESPACE")),
            timeout_ms: lookup("SECRETSTORE_TIMEOUT_MS")
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(defaults.timeout_ms),
        }
    }

    /// Base URL of the store, e.g. `http://localhost:8200`
    pub fn address(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Validate and map failures to a configuration error.
    pub fn validate_all(&self) -> Result<()> {
        if self.token_file.as_os_str().is_empty() {
            return Err(SecretsError::config_error("Secret store token file cannot be empty"));
        }
        self.validate().map_err(|e| Self::validation_error("secret store", e))
    }

    fn validation_error(section: &str, e: validator::ValidationErrors) -> SecretsError {
        SecretsError::config_error(format!("invalid {} configuration: {}", section, e))
    }
}

/// Logging and metrics settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ObservabilityConfig {
    #[validate(length(min = 1, message = "Service name cannot be empty"))]
    pub service_name: String,

    /// Log level or filter directive (trace, debug, info, warn, error)
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    pub json_logging: bool,

    /// Register metric descriptions with the installed recorder
    pub enable_metrics: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "secure-provider".to_string(),
            log_level: "info".to_string(),
            json_logging: false,
            enable_metrics: true,
        }
    }
}

impl ObservabilityConfig {
    /// Read `SECURE_PROVIDER_*` variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            service_name: lookup("SECURE_PROVIDER_SERVICE_NAME").unwrap_or(defaults.service_name),
            log_level: lookup("SECURE_PROVIDER_LOG_LEVEL").unwrap_or(defaults.log_level),
            json_logging: lookup("SECURE_PROVIDER_JSON_LOGGING")
                .map(|s| parse_bool(&s))
                .unwrap_or(defaults.json_logging),
            enable_metrics: lookup("SECURE_PROVIDER_ENABLE_METRICS")
                .map(|s| parse_bool(&s))
                .unwrap_or(defaults.enable_metrics),
        }
    }
}
