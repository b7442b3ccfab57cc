//! Access token sources.
//!
//! [`AuthTokenLoader`] re-reads the service token from its token file whenever
//! the store rejects the current one. [`RuntimeTokenProvider`] covers services
//! that obtain their token at runtime instead of from a file.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::error::{Result, SecretsError};
use super::types::SecretString;

/// Loads the current access token from a token file.
#[async_trait]
pub trait AuthTokenLoader: Send + Sync {
    async fn load(&self, token_file: &Path) -> Result<SecretString>;
}

/// Obtains a fresh access token for a service at runtime.
#[async_trait]
pub trait RuntimeTokenProvider: Send + Sync {
    async fn get_raw_token(&self, service_key: &str) -> Result<SecretString>;
}

#[derive(Debug, Deserialize)]
struct TokenFile {
    #[serde(default)]
    auth: Option<TokenAuth>,
    #[serde(default)]
    root_token: Option<SecretString>,
}

#[derive(Debug, Deserialize)]
struct TokenAuth {
    client_token: SecretString,
}

/// Reads tokens written by the secret store's token issuer.
///
/// Two layouts are accepted: the issued-token form
/// `{"auth": {"client_token": "..."}}` and the bootstrap form
/// `{"root_token": "..."}`. The `auth` form wins when both are present.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTokenLoader;

impl FileTokenLoader {
    pub fn new() -> Self {
        Self
    }

    fn parse(token_file: &Path, contents: &[u8]) -> Result<SecretString> {
        let parsed: TokenFile = serde_json::from_slice(contents).map_err(|e| {
            SecretsError::invalid_document(format!(
                "unable to parse token file '{}': {}",
                token_file.display(),
                e
            ))
        })?;

        let token = parsed
            .auth
            .map(|auth| auth.client_token)
            .or(parsed.root_token)
            .filter(|token| !token.is_empty());

        token.ok_or_else(|| {
            SecretsError::authentication_failed(format!(
                "no token found in token file '{}'",
                token_file.display()
            ))
        })
    }
}

#[async_trait]
impl AuthTokenLoader for FileTokenLoader {
    async fn load(&self, token_file: &Path) -> Result<SecretString> {
        let contents = tokio::fs::read(token_file).await.map_err(|e| {
            SecretsError::io(format!("unable to read token file '{}'", token_file.display()), e)
        })?;

        let token = Self::parse(token_file, &contents)?;
        debug!(token_file = %token_file.display(), "Loaded access token from token file");
        Ok(token)
    }
}
