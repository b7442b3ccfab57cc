//! Unit test doubles for the store client and token loader.
//!
//! These script what the unit tests need: token reload failures, accepted
//! JWTs and per-operation failures. Store-level scenarios such as rejected
//! writes and paused reads live in the integration tests' `ScriptedStore`.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::client::SecretStoreClient;
use super::error::{Result, SecretsError};
use super::retry::SECRETS_AUTH_ERROR;
use super::token::{AuthTokenLoader, RuntimeTokenProvider};
use super::types::{SecretData, SecretString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Get,
    Store,
    List,
    ConsulToken,
}

#[derive(Default)]
struct MockState {
    secrets: HashMap<String, SecretData>,
    queued_errors: HashMap<StoreOp, VecDeque<SecretsError>>,
    calls: HashMap<StoreOp, usize>,
    auth_tokens: Vec<String>,
    set_auth_token_error: Option<String>,
    valid_jwts: HashSet<String>,
}

/// In-memory store client with scripted failures and call counting.
#[derive(Default)]
pub struct MockStoreClient {
    state: Mutex<MockState>,
}

pub fn forbidden() -> SecretsError {
    SecretsError::backend_error(format!("{} from the secret store", SECRETS_AUTH_ERROR))
}

pub fn data(pairs: &[(&str, &str)]) -> SecretData {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

impl MockStoreClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(self, secret_name: &str, pairs: &[(&str, &str)]) -> Self {
        self.state.lock().unwrap().secrets.insert(secret_name.to_string(), data(pairs));
        self
    }

    /// Fail the next call of `op` with `err`. Queued errors are used in order.
    pub fn fail_next(&self, op: StoreOp, err: SecretsError) {
        self.state.lock().unwrap().queued_errors.entry(op).or_default().push_back(err);
    }

    pub fn fail_set_auth_token(&self, message: &str) {
        self.state.lock().unwrap().set_auth_token_error = Some(message.to_string());
    }

    pub fn accept_jwt(&self, jwt: &str) {
        self.state.lock().unwrap().valid_jwts.insert(jwt.to_string());
    }

    pub fn calls(&self, op: StoreOp) -> usize {
        self.state.lock().unwrap().calls.get(&op).copied().unwrap_or(0)
    }

    pub fn auth_tokens(&self) -> Vec<String> {
        self.state.lock().unwrap().auth_tokens.clone()
    }

    fn begin(&self, op: StoreOp) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry(op).or_default() += 1;
        match state.queued_errors.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SecretStoreClient for MockStoreClient {
    async fn get_secrets(&self, secret_name: &str, keys: &[String]) -> Result<SecretData> {
        self.begin(StoreOp::Get)?;
        let state = self.state.lock().unwrap();
        let stored = state
            .secrets
            .get(secret_name)
            .ok_or_else(|| SecretsError::secret_name_not_found(secret_name))?;

        if keys.is_empty() {
            return Ok(stored.clone());
        }
        Ok(keys.iter().filter_map(|k| stored.get_key_value(k)).map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    async fn store_secrets(&self, secret_name: &str, secrets: &SecretData) -> Result<()> {
        self.begin(StoreOp::Store)?;
        self.state.lock().unwrap().secrets.insert(secret_name.to_string(), secrets.clone());
        Ok(())
    }

    async fn list_secret_names(&self) -> Result<Vec<String>> {
        self.begin(StoreOp::List)?;
        let mut names: Vec<String> = self.state.lock().unwrap().secrets.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn set_auth_token(&self, token: &SecretString) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = &state.set_auth_token_error {
            return Err(SecretsError::authentication_failed(message.clone()));
        }
        state.auth_tokens.push(token.expose_secret().to_string());
        Ok(())
    }

    async fn generate_consul_token(&self, service_key: &str) -> Result<SecretString> {
        self.begin(StoreOp::ConsulToken)?;
        Ok(SecretString::new(format!("consul-{}", service_key)))
    }

    async fn get_self_jwt(&self, service_key: &str) -> Result<String> {
        Ok(format!("jwt-{}", service_key))
    }

    async fn is_jwt_valid(&self, jwt: &str) -> Result<bool> {
        Ok(self.state.lock().unwrap().valid_jwts.contains(jwt))
    }
}

/// Token loader returning a settable token and counting loads.
pub struct CountingTokenLoader {
    token: Mutex<Option<String>>,
    loads: AtomicUsize,
}

impl CountingTokenLoader {
    pub fn new(token: &str) -> Self {
        Self { token: Mutex::new(Some(token.to_string())), loads: AtomicUsize::new(0) }
    }

    pub fn failing() -> Self {
        Self { token: Mutex::new(None), loads: AtomicUsize::new(0) }
    }

    pub fn set_token(&self, token: &str) {
        *self.token.lock().unwrap() = Some(token.to_string());
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthTokenLoader for CountingTokenLoader {
    async fn load(&self, token_file: &Path) -> Result<SecretString> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.token.lock().unwrap().clone().map(SecretString::new).ok_or_else(|| {
            SecretsError::authentication_failed(format!(
                "unable to load token from '{}'",
                token_file.display()
            ))
        })
    }
}

/// Runtime token provider returning `runtime-{service_key}` unless failing.
pub struct StaticRuntimeTokenProvider {
    pub fail: bool,
}

#[async_trait]
impl RuntimeTokenProvider for StaticRuntimeTokenProvider {
    async fn get_raw_token(&self, service_key: &str) -> Result<SecretString> {
        if self.fail {
            return Err(SecretsError::connection_failed("runtime token service unavailable"));
        }
        Ok(SecretString::new(format!("runtime-{}", service_key)))
    }
}
