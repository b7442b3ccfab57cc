//! Secure secret provider.
//!
//! [`SecureProvider`] is the single entry point a service uses to read and
//! write its secrets. It layers three things over a [`SecretStoreClient`]:
//!
//! - a read-through cache that is cleared on every successful write
//! - a one-shot token reload and retry when the store answers 403
//! - per-secret-name callbacks fired after a secret is stored
//!
//! The provider never spawns tasks. All concurrency comes from callers
//! sharing one instance behind an `Arc`.

use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn, Instrument};

use super::cache::SecretsCache;
use super::callbacks::{CallbackRegistry, SecretUpdatedCallback};
use super::client::SecretStoreClient;
use super::error::{Result, SecretsError, SeedFailure};
use super::retry::AuthRetry;
use super::seed::{SeedReport, ServiceSecrets};
use super::token::{AuthTokenLoader, RuntimeTokenProvider};
use super::types::{SecretData, SecretString, TokenType};
use crate::config::SecretStoreConfig;
use crate::observability::metrics::ProviderMetrics;

/// Secrets access facade over a secret store client.
pub struct SecureProvider {
    client: RwLock<Option<Arc<dyn SecretStoreClient>>>,
    retry: AuthRetry,
    runtime_token_provider: Option<Arc<dyn RuntimeTokenProvider>>,
    service_key: String,
    config: SecretStoreConfig,
    cache: SecretsCache,
    callbacks: CallbackRegistry,
    /// Unix time in milliseconds of the last secret update.
    last_updated: AtomicI64,
    metrics: ProviderMetrics,
}

impl SecureProvider {
    /// Create a provider without a store client.
    ///
    /// Store operations fail with [`SecretsError::NotInitialized`] until
    /// [`SecureProvider::set_client`] is called.
    pub fn new(
        config: SecretStoreConfig,
        loader: Arc<dyn AuthTokenLoader>,
        service_key: impl Into<String>,
    ) -> Self {
        Self {
            client: RwLock::new(None),
            retry: AuthRetry::new(loader, config.token_file.clone()),
            runtime_token_provider: None,
            service_key: service_key.into(),
            config,
            cache: SecretsCache::new(),
            callbacks: CallbackRegistry::new(),
            last_updated: AtomicI64::new(Utc::now().timestamp_millis()),
            metrics: ProviderMetrics::new(),
        }
    }

    pub fn with_client(mut self, client: Arc<dyn SecretStoreClient>) -> Self {
        self.client = RwLock::new(Some(client));
        self
    }

    /// Token source for services that receive their token at runtime.
    pub fn with_runtime_token_provider(mut self, provider: Arc<dyn RuntimeTokenProvider>) -> Self {
        self.runtime_token_provider = Some(provider);
        self
    }

    /// Bind or replace the store client.
    pub async fn set_client(&self, client: Arc<dyn SecretStoreClient>) {
        *self.client.write().await = Some(client);
        debug!(service_key = %self.service_key, "Secret store client set");
    }

    pub fn service_key(&self) -> &str {
        &self.service_key
    }

    pub fn config(&self) -> &SecretStoreConfig {
        &self.config
    }

    pub fn metrics(&self) -> &ProviderMetrics {
        &self.metrics
    }

    async fn client(&self, operation: &str) -> Result<Arc<dyn SecretStoreClient>> {
        self.client.read().await.clone().ok_or_else(|| SecretsError::not_initialized(operation))
    }

    fn touch_last_updated(&self) {
        self.last_updated.store(Utc::now().timestamp_millis(), Ordering::SeqCst);
    }

    /// Get the values of `keys` stored at `secret_name`.
    ///
    /// An empty `keys` slice returns every key and is always served by the
    /// store. Otherwise the cache is consulted first and only a full match is
    /// returned from it. A store result is not cached if a write invalidated
    /// the cache while it was being read.
    ///
    /// # Errors
    ///
    /// - [`SecretsError::NotInitialized`] on a cache miss with no client bound
    /// - whatever the store returns after the auth retry, e.g.
    ///   [`SecretsError::SecretNameNotFound`]
    pub async fn get_secret(&self, secret_name: &str, keys: &[&str]) -> Result<SecretData> {
        let span = crate::secret_span!("get_secret", secret_name, keys = keys.len());

        async move {
            self.metrics.record_secret_requested();

            let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
            let generation = self.cache.generation().await;
            if let Some(cached) = self.cache.lookup(secret_name, &keys).await {
                return Ok(cached);
            }

            let client = self.client("get secrets").await?;
            let store: &dyn SecretStoreClient = client.as_ref();
            let requested = keys.as_slice();

            let secrets = self
                .retry
                .execute(store, "get_secret", move || store.get_secrets(secret_name, requested))
                .await?;

            self.cache.fill(secret_name, &secrets, generation).await;
            Ok(secrets)
        }
        .instrument(span)
        .await
    }

    /// Store `secrets` at `secret_name`.
    ///
    /// On success the registered callback for `secret_name` fires, the whole
    /// cache is cleared and the last updated time moves forward.
    pub async fn store_secret(&self, secret_name: &str, secrets: &SecretData) -> Result<()> {
        let span = crate::secret_span!("store_secret", secret_name, keys = secrets.len());

        async move {
            self.metrics.record_secret_stored();

            let client = self.client("store secrets").await?;
            let store: &dyn SecretStoreClient = client.as_ref();

            self.retry
                .execute(store, "store_secret", move || store.store_secrets(secret_name, secrets))
                .await?;

            self.secret_updated_at_secret_name(secret_name);
            self.cache.invalidate_all().await;
            self.touch_last_updated();

            info!(secret_name = %secret_name, keys = secrets.len(), "Secret stored");
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// List the secret names visible to this service.
    pub async fn list_secret_names(&self) -> Result<Vec<String>> {
        let span = crate::secret_span!("list_secret_names");

        async move {
            let client = self.client("get secret names").await?;
            let store: &dyn SecretStoreClient = client.as_ref();

            self.retry
                .execute(store, "list_secret_names", move || store.list_secret_names())
                .await
                .map_err(|e| SecretsError::backend_error(format!("unable to get secret names: {}", e)))
        }
        .instrument(span)
        .await
    }

    /// Whether anything is stored at `secret_name`.
    ///
    /// A missing secret name is `Ok(false)`; every other failure is an error.
    pub async fn has_secret(&self, secret_name: &str) -> Result<bool> {
        match self.get_secret(secret_name, &[]).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_secret_name_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Issue an access token of `token_type` for `service_key`.
    ///
    /// Only `"consul"` is supported. The request count and its duration are
    /// recorded whether or not the call succeeds.
    pub async fn get_access_token(&self, token_type: &str, service_key: &str) -> Result<SecretString> {
        let span = crate::secret_span!("get_access_token", service_key, token_type = %token_type);

        async move {
            self.metrics.record_consul_token_requested();
            let started = Instant::now();

            let result = self.generate_access_token(token_type, service_key).await;

            self.metrics.record_consul_token_duration(started.elapsed());
            if let Err(e) = &result {
                warn!(token_type = %token_type, error = %e, "Failed to issue access token");
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn generate_access_token(&self, token_type: &str, service_key: &str) -> Result<SecretString> {
        match token_type.parse::<TokenType>()? {
            TokenType::Consul => {
                let client = self.client("get access token").await?;
                let store: &dyn SecretStoreClient = client.as_ref();

                self.retry
                    .execute(store, "generate_consul_token", move || {
                        store.generate_consul_token(service_key)
                    })
                    .await
            }
        }
    }

    /// Import the seeding document at `path` into the secret store.
    ///
    /// With `scrub` set the document is rewritten with the imported entries'
    /// values removed. Per-entry failures are collected into
    /// [`SecretsError::Seeding`]; I/O and format errors abort the whole load.
    pub async fn load_service_secrets(&self, path: &Path, scrub: bool) -> Result<()> {
        self.load_service_secrets_with_report(path, scrub).await?.into_result()
    }

    /// Like [`SecureProvider::load_service_secrets`] but hands back the report.
    pub async fn load_service_secrets_with_report(&self, path: &Path, scrub: bool) -> Result<SeedReport> {
        let contents = tokio::fs::read(path).await.map_err(|e| {
            SecretsError::io(
                format!("seeding secrets failed: unable to read secrets file '{}'", path.display()),
                e,
            )
        })?;

        let report = self.seed_secrets(&contents).await?;

        if !scrub {
            info!(secrets_file = %path.display(), "Scrubbing of secrets file disabled");
            return Ok(report);
        }

        tokio::fs::write(path, &report.document).await.map_err(|e| {
            SecretsError::io(
                "seeding secrets failed: unable to overwrite file with secret data removed",
                e,
            )
        })?;

        info!(secrets_file = %path.display(), "Scrubbing of secrets file complete");
        Ok(report)
    }

    /// Import the configured secrets file, if any, honouring the scrub setting.
    pub async fn load_configured_secrets(&self) -> Result<()> {
        match &self.config.secrets_file {
            Some(path) => self.load_service_secrets(path, !self.config.disable_scrub_secrets_file).await,
            None => {
                debug!("No secrets file configured, skipping seeding");
                Ok(())
            }
        }
    }

    /// Store every pending entry of a seeding document.
    ///
    /// A failing entry does not stop the others. The returned report carries
    /// the re-serialized document with stored entries marked imported.
    pub async fn seed_secrets(&self, contents: &[u8]) -> Result<SeedReport> {
        let mut document = ServiceSecrets::from_json(contents)?;
        let mut report = SeedReport::default();

        info!(count = document.secrets.len(), pending = document.pending(), "Seeding service secrets");

        for secret in document.secrets.iter_mut() {
            if secret.imported {
                info!(secret_name = %secret.secret_name, "Secret already imported, skipping");
                report.skipped.push(secret.secret_name.clone());
                continue;
            }

            let (secret_name, data) = secret.prepare();
            match self.store_secret(&secret_name, &data).await {
                Ok(()) => {
                    info!(secret_name = %secret_name, "Secret successfully seeded");
                    secret.mark_imported();
                    report.stored.push(secret_name);
                }
                Err(e) => {
                    error!(secret_name = %secret.secret_name, error = %e, "Failed to seed secret");
                    report.failures.push(SeedFailure {
                        secret_name: secret.secret_name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        report.document = document.to_json().map_err(|e| {
            SecretsError::invalid_document(format!(
                "seeding secrets failed marshaling back to JSON to clear secrets: {}",
                e
            ))
        })?;

        if report.is_success() {
            info!(stored = report.stored.len(), skipped = report.skipped.len(), "Service secrets seeded");
        } else {
            warn!(
                stored = report.stored.len(),
                failed = report.failures.len(),
                "Service secrets seeded with failures"
            );
        }
        Ok(report)
    }

    /// Register `callback` to run after `secret_name` is stored.
    pub fn register_secret_updated_callback<F>(&self, secret_name: &str, callback: F) -> Result<()>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let callback: SecretUpdatedCallback = Arc::new(callback);
        self.callbacks.register(secret_name, callback)
    }

    pub fn deregister_secret_updated_callback(&self, secret_name: &str) {
        self.callbacks.deregister(secret_name);
    }

    /// Record an update of `secret_name` and run its callback, if any.
    pub fn secret_updated_at_secret_name(&self, secret_name: &str) {
        self.touch_last_updated();
        self.callbacks.notify(secret_name);
    }

    /// Nothing to do for secure secrets; updates are tracked on store.
    pub fn secrets_updated(&self) {}

    pub fn secrets_last_updated(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_updated.load(Ordering::SeqCst)).unwrap_or_default()
    }

    /// JWT identifying this service. No retry, no caching.
    pub async fn get_self_jwt(&self) -> Result<String> {
        let client = self.client("get self JWT").await?;
        client.get_self_jwt(&self.service_key).await
    }

    /// Whether `jwt` is valid according to the store. No retry, no caching.
    pub async fn is_jwt_valid(&self, jwt: &str) -> Result<bool> {
        let client = self.client("validate JWT").await?;
        client.is_jwt_valid(jwt).await
    }

    /// Re-read the token file after the store client saw `expired` expire.
    ///
    /// Returns the replacement only if it differs from `expired`. Failures
    /// are logged and yield `None`.
    pub async fn default_token_expired(&self, expired: &SecretString) -> Option<SecretString> {
        let token_file = self.retry.token_file();

        match self.retry.loader().load(token_file).await {
            Ok(token) if &token == expired => {
                error!(token_file = %token_file.display(), "No new replacement token found for the expired token");
                None
            }
            Ok(token) => Some(token),
            Err(e) => {
                error!(token_file = %token_file.display(), error = %e, "Failed to load auth token from token file");
                None
            }
        }
    }

    /// Ask the runtime token provider for a replacement token.
    pub async fn runtime_token_expired(&self) -> Option<SecretString> {
        let Some(provider) = &self.runtime_token_provider else {
            warn!(service_key = %self.service_key, "No runtime token provider configured");
            return None;
        };

        match provider.get_raw_token(&self.service_key).await {
            Ok(token) => Some(token),
            Err(e) => {
                error!(service_key = %self.service_key, error = %e, "Failed to get a new token for service");
                None
            }
        }
    }
}

impl std::fmt::Debug for SecureProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureProvider")
            .field("service_key", &self.service_key)
            .field("store_path", &self.config.store_path)
            .field("callbacks", &self.callbacks)
            .finish_non_exhaustive()
    }
}
