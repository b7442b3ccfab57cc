//! Secret updated callbacks
//!
//! At most one callback per secret name. Callbacks run synchronously on the
//! thread that stored the secret and their outcome is not reported back.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::error::{Result, SecretsError};

/// Function invoked with the secret name after that secret is stored.
pub type SecretUpdatedCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Registry of secret updated callbacks keyed by secret name
#[derive(Default)]
pub struct CallbackRegistry {
    callbacks: DashMap<String, SecretUpdatedCallback>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self { callbacks: DashMap::new() }
    }

    /// Register `callback` for `secret_name`.
    ///
    /// Fails with [`SecretsError::CallbackAlreadyRegistered`] if one exists;
    /// the existing callback is left in place.
    pub fn register(&self, secret_name: &str, callback: SecretUpdatedCallback) -> Result<()> {
        match self.callbacks.entry(secret_name.to_string()) {
            Entry::Occupied(_) => Err(SecretsError::callback_already_registered(secret_name)),
            Entry::Vacant(slot) => {
                slot.insert(callback);
                debug!(secret_name = %secret_name, "Registered secret updated callback");
                Ok(())
            }
        }
    }

    /// Remove the callback for `secret_name`, if any
    pub fn deregister(&self, secret_name: &str) {
        if self.callbacks.remove(secret_name).is_some() {
            debug!(secret_name = %secret_name, "Deregistered secret updated callback");
        }
    }

    /// Invoke the callback registered for `secret_name`.
    ///
    /// Returns `true` if a callback ran. The map shard lock is released before
    /// the callback is called, so a callback may itself register or deregister.
    pub fn notify(&self, secret_name: &str) -> bool {
        let callback = self.callbacks.get(secret_name).map(|entry| Arc::clone(entry.value()));

        match callback {
            Some(callback) => {
                debug!(secret_name = %secret_name, "Invoking secret updated callback");
                callback(secret_name);
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub(crate) fn is_registered(&self, secret_name: &str) -> bool {
        self.callbacks.contains_key(secret_name)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.callbacks.len()
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.callbacks.iter().map(|entry| entry.key().clone()).collect();
        f.debug_struct("CallbackRegistry").field("secret_names", &names).finish()
    }
}
