//! Common test utilities for all integration tests.
//!
//! Provides a scripted secret store client and a counting token loader.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use secure_provider::config::SecretStoreConfig;
use secure_provider::secrets::{
    AuthTokenLoader, Result, SecretData, SecretStoreClient, SecretString, SecretsError,
    SecureProvider, SECRETS_AUTH_ERROR,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Get,
    Store,
    List,
    ConsulToken,
}

#[derive(Default)]
struct State {
    secrets: HashMap<String, SecretData>,
    failures: HashMap<Op, VecDeque<SecretsError>>,
    failing_stores: HashMap<String, String>,
    calls: HashMap<Op, usize>,
    tokens: Vec<String>,
    paused_get: Option<GetPause>,
}

/// Signals for a get that has read its data but not yet returned it.
#[derive(Clone)]
pub struct GetPause {
    /// Notified once the data has been read.
    pub reached: Arc<Notify>,
    /// Notify to let the get return.
    pub release: Arc<Notify>,
}

/// In-memory secret store with scripted failures.
#[derive(Default)]
pub struct ScriptedStore {
    state: Mutex<State>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, secret_name: &str, pairs: &[(&str, &str)]) {
        self.state.lock().unwrap().secrets.insert(secret_name.to_string(), data(pairs));
    }

    /// Fail the next call of `op`.
    pub fn fail_next(&self, op: Op, err: SecretsError) {
        self.state.lock().unwrap().failures.entry(op).or_default().push_back(err);
    }

    /// Reject every store to `secret_name` with `message`.
    pub fn reject_store(&self, secret_name: &str, message: &str) {
        self.state.lock().unwrap().failing_stores.insert(secret_name.to_string(), message.to_string());
    }

    /// Hold the next get after it has read the stored data.
    pub fn pause_next_get(&self) -> GetPause {
        let pause = GetPause { reached: Arc::new(Notify::new()), release: Arc::new(Notify::new()) };
        self.state.lock().unwrap().paused_get = Some(pause.clone());
        pause
    }

    pub fn calls(&self, op: Op) -> usize {
        self.state.lock().unwrap().calls.get(&op).copied().unwrap_or(0)
    }

    pub fn tokens(&self) -> Vec<String> {
        self.state.lock().unwrap().tokens.clone()
    }

    pub fn stored(&self, secret_name: &str) -> Option<SecretData> {
        self.state.lock().unwrap().secrets.get(secret_name).cloned()
    }

    fn enter(&self, op: Op) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry(op).or_default() += 1;
        match state.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn read(&self, secret_name: &str, keys: &[String]) -> Result<SecretData> {
        let state = self.state.lock().unwrap();
        let stored = state
            .secrets
            .get(secret_name)
            .ok_or_else(|| SecretsError::secret_name_not_found(secret_name))?;

        if keys.is_empty() {
            return Ok(stored.clone());
        }

        let mut found = SecretData::new();
        let mut missing = Vec::new();
        for key in keys {
            match stored.get(key) {
                Some(value) => {
                    found.insert(key.clone(), value.clone());
                }
                None => missing.push(key.clone()),
            }
        }

        if missing.is_empty() {
            Ok(found)
        } else {
            Err(SecretsError::keys_not_found(secret_name, missing))
        }
    }
}

#[async_trait]
impl SecretStoreClient for ScriptedStore {
    async fn get_secrets(&self, secret_name: &str, keys: &[String]) -> Result<SecretData> {
        self.enter(Op::Get)?;
        let result = self.read(secret_name, keys);

        let pause = self.state.lock().unwrap().paused_get.take();
        if let Some(pause) = pause {
            pause.reached.notify_one();
            pause.release.notified().await;
        }
        result
    }

    async fn store_secrets(&self, secret_name: &str, secrets: &SecretData) -> Result<()> {
        self.enter(Op::Store)?;
        let mut state = self.state.lock().unwrap();
        if let Some(message) = state.failing_stores.get(secret_name) {
            return Err(SecretsError::backend_error(message.clone()));
        }
        state.secrets.insert(secret_name.to_string(), secrets.clone());
        Ok(())
    }

    async fn list_secret_names(&self) -> Result<Vec<String>> {
        self.enter(Op::List)?;
        let mut names: Vec<String> = self.state.lock().unwrap().secrets.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn set_auth_token(&self, token: &SecretString) -> Result<()> {
        self.state.lock().unwrap().tokens.push(token.expose_secret().to_string());
        Ok(())
    }

    async fn generate_consul_token(&self, service_key: &str) -> Result<SecretString> {
        self.enter(Op::ConsulToken)?;
        Ok(SecretString::new(format!("consul-token-{}", service_key)))
    }

    async fn get_self_jwt(&self, service_key: &str) -> Result<String> {
        Ok(format!("jwt.{}", service_key))
    }

    async fn is_jwt_valid(&self, jwt: &str) -> Result<bool> {
        Ok(jwt.starts_with("jwt."))
    }
}

/// Token loader that counts how often it is asked for a token.
pub struct CountingLoader {
    token: String,
    loads: AtomicUsize,
}

impl CountingLoader {
    pub fn new(token: &str) -> Self {
        Self { token: token.to_string(), loads: AtomicUsize::new(0) }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthTokenLoader for CountingLoader {
    async fn load(&self, _token_file: &Path) -> Result<SecretString> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(SecretString::new(self.token.clone()))
    }
}

pub fn data(pairs: &[(&str, &str)]) -> SecretData {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

/// Error carrying the secret store's 403 marker.
pub fn forbidden() -> SecretsError {
    SecretsError::backend_error(format!("{} from the secret store", SECRETS_AUTH_ERROR))
}

pub struct Harness {
    pub store: Arc<ScriptedStore>,
    pub loader: Arc<CountingLoader>,
    pub provider: Arc<SecureProvider>,
}

/// Provider bound to a fresh scripted store.
pub fn harness() -> Harness {
    let store = Arc::new(ScriptedStore::new());
    let loader = Arc::new(CountingLoader::new("reloaded-token"));
    let provider = SecureProvider::new(SecretStoreConfig::default(), loader.clone(), "core-data")
        .with_client(store.clone());

    Harness { store, loader, provider: Arc::new(provider) }
}
