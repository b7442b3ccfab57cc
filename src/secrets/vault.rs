//! Vault / OpenBao HTTP store client.
//!
//! Speaks the KV v1 style API rooted at the service's store path:
//!
//! | Operation | Request |
//! |---|---|
//! | get | `GET /v1/{store_path}/{secret_name}` |
//! | store | `POST /v1/{store_path}/{secret_name}` |
//! | list | `GET /v1/{store_path}?list=true` |
//! | consul token | `GET /v1/consul/creds/{service_key}` |
//! | self JWT | `GET /v1/identity/oidc/token/{service_key}` |
//! | JWT check | `POST /v1/identity/oidc/introspect` |
//!
//! A 403 is reported as [`SecretsError::AuthenticationExpired`] with the
//! `"Received a '403' response"` marker so the provider can reload its token.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::client::SecretStoreClient;
use super::error::{Result, SecretsError};
use super::retry::SECRETS_AUTH_ERROR;
use super::types::{SecretData, SecretString};
use crate::config::SecretStoreConfig;

const TOKEN_HEADER: &str = "X-Vault-Token";
const NAMESPACE_HEADER: &str = "X-Vault-Namespace";

/// Vault response envelope.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct ListData {
    #[serde(default)]
    keys: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TokenData {
    token: SecretString,
}

#[derive(Debug, Deserialize)]
struct IntrospectResponse {
    #[serde(default)]
    active: bool,
}

/// HTTP client for a Vault or OpenBao secret store.
pub struct VaultStoreClient {
    http: Client,
    address: String,
    store_path: String,
    namespace: Option<String>,
    token: RwLock<Option<SecretString>>,
}

impl VaultStoreClient {
    /// Build a client for the store described by `config`. No request is made.
    pub fn new(config: &SecretStoreConfig) -> Result<Self> {
        let http = ClientBuilder::new()
            .timeout(config.timeout())
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| SecretsError::connection_failed(format!("failed to build HTTP client: {}", e)))?;

        let client = Self {
            http,
            address: config.address().trim_end_matches('/').to_string(),
            store_path: config.store_path.trim_matches('/').to_string(),
            namespace: config.namespace.clone(),
            token: RwLock::new(None),
        };

        info!(address = %client.address, store_path = %client.store_path, "Secret store client created");
        Ok(client)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.address, path.trim_start_matches('/'))
    }

    fn secret_path(&self, secret_name: &str) -> String {
        format!("{}/{}", self.store_path, secret_name.trim_start_matches('/'))
    }

    async fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut request = self.http.request(method, self.url(path));

        if let Some(token) = self.token.read().await.as_ref() {
            request = request.header(TOKEN_HEADER, token.expose_secret());
        }
        if let Some(namespace) = &self.namespace {
            request = request.header(NAMESPACE_HEADER, namespace);
        }
        request
    }

    /// Send `request`; `Ok(None)` means 404.
    async fn send(&self, request: RequestBuilder, action: &str) -> Result<Option<Response>> {
        let response = request.send().await.map_err(|e| {
            SecretsError::connection_failed(format!("request to {} failed: {}", action, e))
        })?;

        match response.status() {
            status if status.is_success() => Ok(Some(response)),
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::FORBIDDEN => Err(SecretsError::authentication_expired(format!(
                "{} from the secret store while trying to {}",
                SECRETS_AUTH_ERROR, action
            ))),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(SecretsError::backend_error(format!(
                    "unable to {}: status {}: {}",
                    action,
                    status,
                    body.trim()
                )))
            }
        }
    }

    async fn json<T: DeserializeOwned>(response: Response, action: &str) -> Result<T> {
        response.json::<T>().await.map_err(|e| {
            SecretsError::backend_error(format!("unable to parse response to {}: {}", action, e))
        })
    }
}

fn into_secret_value(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

#[async_trait]
impl SecretStoreClient for VaultStoreClient {
    async fn get_secrets(&self, secret_name: &str, keys: &[String]) -> Result<SecretData> {
        let action = format!("get secret '{}'", secret_name);
        let request = self.request(Method::GET, &self.secret_path(secret_name)).await;

        let Some(response) = self.send(request, &action).await? else {
            return Err(SecretsError::secret_name_not_found(secret_name));
        };

        let body: ApiResponse<HashMap<String, serde_json::Value>> = Self::json(response, &action).await?;
        let mut stored: SecretData =
            body.data.into_iter().map(|(k, v)| (k, into_secret_value(v))).collect();

        if keys.is_empty() {
            return Ok(stored);
        }

        let missing: Vec<String> = keys.iter().filter(|k| !stored.contains_key(*k)).cloned().collect();
        if !missing.is_empty() {
            return Err(SecretsError::keys_not_found(secret_name, missing));
        }

        Ok(keys.iter().filter_map(|k| stored.remove_entry(k)).collect())
    }

    async fn store_secrets(&self, secret_name: &str, secrets: &SecretData) -> Result<()> {
        let action = format!("store secret '{}'", secret_name);
        let request = self.request(Method::POST, &self.secret_path(secret_name)).await.json(secrets);

        match self.send(request, &action).await? {
            Some(_) => {
                debug!(secret_name = %secret_name, keys = secrets.len(), "Secret written to store");
                Ok(())
            }
            None => Err(SecretsError::backend_error(format!(
                "unable to {}: store path '{}' not found",
                action, self.store_path
            ))),
        }
    }

    async fn list_secret_names(&self) -> Result<Vec<String>> {
        let action = "list secret names";
        let request = self.request(Method::GET, &self.store_path).await.query(&[("list", "true")]);

        match self.send(request, action).await? {
            Some(response) => {
                let body: ApiResponse<ListData> = Self::json(response, action).await?;
                Ok(body.data.keys)
            }
            None => Ok(Vec::new()),
        }
    }

    async fn set_auth_token(&self, token: &SecretString) -> Result<()> {
        if token.is_empty() {
            return Err(SecretsError::authentication_failed("refusing to set an empty access token"));
        }
        *self.token.write().await = Some(token.clone());
        debug!("Secret store access token replaced");
        Ok(())
    }

    async fn generate_consul_token(&self, service_key: &str) -> Result<SecretString> {
        let action = format!("generate consul token for '{}'", service_key);
        let request = self.request(Method::GET, &format!("consul/creds/{}", service_key)).await;

        let Some(response) = self.send(request, &action).await? else {
            return Err(SecretsError::backend_error(format!(
                "unable to {}: no consul role for service",
                action
            )));
        };

        let body: ApiResponse<TokenData> = Self::json(response, &action).await?;
        Ok(body.data.token)
    }

    async fn get_self_jwt(&self, service_key: &str) -> Result<String> {
        let action = format!("get identity token for '{}'", service_key);
        let request = self.request(Method::GET, &format!("identity/oidc/token/{}", service_key)).await;

        let Some(response) = self.send(request, &action).await? else {
            return Err(SecretsError::backend_error(format!(
                "unable to {}: no identity role for service",
                action
            )));
        };

        let body: ApiResponse<TokenData> = Self::json(response, &action).await?;
        Ok(body.data.token.expose_secret().to_string())
    }

    async fn is_jwt_valid(&self, jwt: &str) -> Result<bool> {
        let action = "introspect identity token";
        let request = self
            .request(Method::POST, "identity/oidc/introspect")
            .await
            .json(&serde_json::json!({ "token": jwt }));

        match self.send(request, action).await? {
            Some(response) => {
                let body: IntrospectResponse = Self::json(response, action).await?;
                Ok(body.active)
            }
            None => Ok(false),
        }
    }
}

impl std::fmt::Debug for VaultStoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultStoreClient")
            .field("address", &self.address)
            .field("store_path", &self.store_path)
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}
