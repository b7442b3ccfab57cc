//! Store client capability consumed by the secure provider.

use async_trait::async_trait;

use super::error::Result;
use super::types::{SecretData, SecretString};

/// Authenticated operations against the backing secret store.
///
/// Implementations own their wire protocol and authentication mechanics.
/// The provider treats them as shared, read-only collaborators and only
/// relies on the error contract below.
///
/// # Authentication failures
///
/// A request rejected because the access token is stale MUST surface as an
/// error whose display string contains `"Received a '403' response"` or
/// `"HTTP response with status code 403"`, or as
/// [`SecretsError::AuthenticationExpired`](super::SecretsError::AuthenticationExpired).
/// The provider reloads the token and retries once when it sees one of those.
///
/// # Security
///
/// Implementations MUST NOT log secret values or tokens.
#[async_trait]
pub trait SecretStoreClient: Send + Sync {
    /// Fetch the values stored under `secret_name`.
    ///
    /// When `keys` is empty every key of the secret is returned. Otherwise
    /// only the requested keys are returned and any missing key is an error.
    ///
    /// # Errors
    ///
    /// - [`SecretsError::SecretNameNotFound`](super::SecretsError::SecretNameNotFound)
    ///   if nothing is stored under `secret_name`
    /// - [`SecretsError::KeysNotFound`](super::SecretsError::KeysNotFound)
    ///   if some requested keys are absent
    async fn get_secrets(&self, secret_name: &str, keys: &[String]) -> Result<SecretData>;

    /// Store `secrets` under `secret_name`, replacing the previous contents.
    async fn store_secrets(&self, secret_name: &str, secrets: &SecretData) -> Result<()>;

    /// List every secret name visible to the service.
    async fn list_secret_names(&self) -> Result<Vec<String>>;

    /// Replace the access token used for subsequent requests.
    async fn set_auth_token(&self, token: &SecretString) -> Result<()>;

    /// Issue a cluster-coordination (Consul) token for `service_key`.
    async fn generate_consul_token(&self, service_key: &str) -> Result<SecretString>;

    /// Fetch a JWT identifying `service_key`.
    async fn get_self_jwt(&self, service_key: &str) -> Result<String>;

    /// Ask the store whether `jwt` is currently valid.
    async fn is_jwt_valid(&self, jwt: &str) -> Result<bool>;
}
