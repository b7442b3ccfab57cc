//! One-shot token reload and retry around store operations.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use super::client::SecretStoreClient;
use super::error::{Result, SecretsError};
use super::token::AuthTokenLoader;

/// Marker the HTTP layer of a store client uses for a 403 on token requests.
pub const ACCESS_TOKEN_AUTH_ERROR: &str = "HTTP response with status code 403";

/// Marker the store client uses for a 403 on secret requests.
pub const SECRETS_AUTH_ERROR: &str = "Received a '403' response";

/// True when `err` means the store rejected the current access token.
pub fn is_auth_failure(err: &SecretsError) -> bool {
    if matches!(err, SecretsError::AuthenticationExpired { .. }) {
        return true;
    }

    let message = err.to_string();
    message.contains(SECRETS_AUTH_ERROR) || message.contains(ACCESS_TOKEN_AUTH_ERROR)
}

/// Wraps store calls with the reload-token-and-retry-once protocol.
///
/// When an operation fails with an authentication failure the token is
/// re-read from `token_file`, pushed to the client and the operation is run a
/// second time. The second result is returned as is, whatever it is.
pub struct AuthRetry {
    loader: Arc<dyn AuthTokenLoader>,
    token_file: PathBuf,
}

impl AuthRetry {
    pub fn new(loader: Arc<dyn AuthTokenLoader>, token_file: impl Into<PathBuf>) -> Self {
        Self { loader, token_file: token_file.into() }
    }

    pub fn token_file(&self) -> &Path {
        &self.token_file
    }

    pub fn loader(&self) -> &Arc<dyn AuthTokenLoader> {
        &self.loader
    }

    /// Run `op`, reloading the token and retrying once on an auth failure.
    ///
    /// Errors from the token loader or from `set_auth_token` are returned
    /// instead of retrying.
    pub async fn execute<T, F, Fut>(
        &self,
        client: &dyn SecretStoreClient,
        operation: &'static str,
        mut op: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) if !is_auth_failure(&err) => return Err(err),
            Err(err) => err,
        };

        warn!(
            operation,
            token_file = %self.token_file.display(),
            error = %err,
            "Secret store rejected access token, reloading token"
        );

        let token = self.loader.load(&self.token_file).await?;
        client.set_auth_token(&token).await?;

        debug!(operation, "Retrying secret store call with reloaded token");
        op().await
    }
}

impl std::fmt::Debug for AuthRetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthRetry").field("token_file", &self.token_file).finish_non_exhaustive()
    }
}
