//! Secrets access for a service runtime.
//!
//! All reads and writes of a service's secrets go through [`SecureProvider`].
//! It talks to the secret store through a [`SecretStoreClient`], reloads the
//! access token from the token file when the store answers 403 and retries
//! once, caches what it reads and notifies registered callbacks on writes.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use secure_provider::config::SecretStoreConfig;
//! use secure_provider::secrets::{FileTokenLoader, SecureProvider, VaultStoreClient};
//!
//! let config = SecretStoreConfig::from_env();
//! let client = Arc::new(VaultStoreClient::new(&config)?);
//! let provider = SecureProvider::new(config, Arc::new(FileTokenLoader::new()), "core-data")
//!     .with_client(client);
//!
//! provider.register_secret_updated_callback("credentials001", |name| {
//!     tracing::info!(secret_name = %name, "credentials rotated");
//! })?;
//!
//! let creds = provider.get_secret("credentials001", &["username", "password"]).await?;
//! ```
//!
//! # Security
//!
//! Secret values and tokens are never logged. Tokens are held as
//! [`SecretString`], which redacts itself and zeroes its memory on drop.

pub mod cache;
pub mod callbacks;
pub mod client;
pub mod error;
pub mod provider;
pub mod retry;
pub mod seed;
pub mod token;
pub mod types;
pub mod vault;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::SecretsCache;
pub use callbacks::{CallbackRegistry, SecretUpdatedCallback};
pub use client::SecretStoreClient;
pub use error::{Result, SecretsError, SeedFailure};
pub use provider::SecureProvider;
pub use retry::{is_auth_failure, AuthRetry, ACCESS_TOKEN_AUTH_ERROR, SECRETS_AUTH_ERROR};
pub use seed::{SecretDataKeyValue, SeedReport, ServiceSecret, ServiceSecrets};
pub use token::{AuthTokenLoader, FileTokenLoader, RuntimeTokenProvider};
pub use types::{SecretData, SecretString, TokenType};
pub use vault::VaultStoreClient;
