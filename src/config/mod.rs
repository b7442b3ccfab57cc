//! # Configuration Management
//!
//! Environment-driven settings for the secret store connection and for
//! observability. The binary loads a `.env` file first, if present.

pub mod settings;

pub use settings::{ObservabilityConfig, ProviderConfig, SecretStoreConfig};
