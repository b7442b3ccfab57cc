//! Error types for secrets access operations.

use std::fmt;

use thiserror::Error;

/// Result type for secrets operations.
pub type Result<T> = std::result::Result<T, SecretsError>;

/// A single seeding entry that could not be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedFailure {
    pub secret_name: String,
    pub error: String,
}

impl fmt::Display for SeedFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to store secret for '{}': {}", self.secret_name, self.error)
    }
}

fn join_failures(failures: &[SeedFailure]) -> String {
    failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Errors that can occur while accessing the secret store.
#[derive(Error, Debug)]
pub enum SecretsError {
    /// No store client has been bound to the provider.
    #[error("Can't {operation}. Secure secret provider is not properly initialized")]
    NotInitialized { operation: String },

    /// The secret store has no secret at the requested secret name.
    #[error("No secret data found for secret name '{secret_name}'")]
    SecretNameNotFound { secret_name: String },

    /// The secret name exists but some requested keys are missing.
    #[error("No value for the keys {keys:?} exists at secret name '{secret_name}'")]
    KeysNotFound { secret_name: String, keys: Vec<String> },

    /// The store rejected the current access token.
    #[error("Authentication expired: {message}")]
    AuthenticationExpired { message: String },

    /// Credentials could not be loaded or were rejected outright.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// Unsupported access token type.
    #[error("Invalid access token type '{token_type}'")]
    InvalidTokenType { token_type: String },

    /// A callback already exists for the secret name.
    #[error("There is a callback already registered for secret name '{secret_name}'")]
    CallbackAlreadyRegistered { secret_name: String },

    /// One or more seeding entries failed to store.
    #[error("Seeding secrets failed for {} secret(s): {}", .failures.len(), join_failures(.failures))]
    Seeding { failures: Vec<SeedFailure> },

    /// The seeding document or token file is malformed.
    #[error("Invalid document: {reason}")]
    InvalidDocument { reason: String },

    /// Failed to connect to the secret store.
    #[error("Backend connection failed: {message}")]
    ConnectionFailed { message: String },

    /// Store-specific error.
    #[error("Backend error: {message}")]
    BackendError { message: String },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// File I/O error with the path or step that failed.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl SecretsError {
    /// Create a not initialized error.
    pub fn not_initialized(operation: impl Into<String>) -> Self {
        Self::NotInitialized { operation: operation.into() }
    }

    /// Create a secret name not found error.
    pub fn secret_name_not_found(secret_name: impl Into<String>) -> Self {
        Self::SecretNameNotFound { secret_name: secret_name.into() }
    }

    /// Create a keys not found error.
    pub fn keys_not_found(secret_name: impl Into<String>, keys: Vec<String>) -> Self {
        Self::KeysNotFound { secret_name: secret_name.into(), keys }
    }

    /// Create an authentication expired error.
    pub fn authentication_expired(message: impl Into<String>) -> Self {
        Self::AuthenticationExpired { message: message.into() }
    }

    /// Create an authentication failed error.
    pub fn authentication_failed(message: impl Into<String>) -> Self {
        Self::AuthenticationFailed { message: message.into() }
    }

    /// Create an invalid token type error.
    pub fn invalid_token_type(token_type: impl Into<String>) -> Self {
        Self::InvalidTokenType { token_type: token_type.into() }
    }

    /// Create a callback already registered error.
    pub fn callback_already_registered(secret_name: impl Into<String>) -> Self {
        Self::CallbackAlreadyRegistered { secret_name: secret_name.into() }
    }

    /// Create an invalid document error.
    pub fn invalid_document(reason: impl Into<String>) -> Self {
        Self::InvalidDocument { reason: reason.into() }
    }

    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed { message: message.into() }
    }

    /// Create a backend error.
    pub fn backend_error(message: impl Into<String>) -> Self {
        Self::BackendError { message: message.into() }
    }

    /// Create a config error.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError { message: message.into() }
    }

    /// Create an I/O error carrying the failed step.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { context: context.into(), source }
    }

    /// True when this is the "secret name does not exist" kind.
    pub fn is_secret_name_not_found(&self) -> bool {
        matches!(self, Self::SecretNameNotFound { .. })
    }
}
