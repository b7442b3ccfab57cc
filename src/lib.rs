//! # Secure Provider
//!
//! Secrets-access facade for a service runtime. Every read and write of a
//! service's sensitive key/value data goes through [`SecureProvider`], which
//! re-authenticates transparently when the secret store rejects a stale
//! token, caches what it reads and notifies subscribers when a secret
//! changes.
//!
//! ## Architecture
//!
//! ```text
//! caller → SecureProvider → AuthRetry → SecretStoreClient → Vault / OpenBao
//!              ↓   ↓                        ↑
//!   SecretsCache   CallbackRegistry   AuthTokenLoader (token file)
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use secure_provider::{FileTokenLoader, SecretStoreConfig, SecureProvider, VaultStoreClient};
//!
//! #[tokio::main]
//! async fn main() -> secure_provider::Result<()> {
//!     let config = SecretStoreConfig::from_env();
//!     let client = Arc::new(VaultStoreClient::new(&config)?);
//!     let provider = SecureProvider::new(config, Arc::new(FileTokenLoader::new()), "core-data")
//!         .with_client(client);
//!
//!     let names = provider.list_secret_names().await?;
//!     println!("{names:?}");
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod observability;
pub mod secrets;

// Re-export commonly used types and traits
pub use config::{ObservabilityConfig, ProviderConfig, SecretStoreConfig};
pub use secrets::{
    AuthTokenLoader, FileTokenLoader, Result, RuntimeTokenProvider, SecretData, SecretStoreClient,
    SecretString, SecretsError, SecureProvider, VaultStoreClient,
};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
