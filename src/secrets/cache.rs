//! Read-through cache of secret data keyed by secret name.
//!
//! Entries only ever grow by merging what the store returned. Any write to
//! the store clears the whole cache; see [`SecretsCache::invalidate_all`].
//!
//! Every invalidation bumps a generation counter. A reader takes the
//! generation before going to the store and hands it back to
//! [`SecretsCache::fill`], which drops the data if an invalidation happened in
//! between.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::debug;

use super::types::SecretData;

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, SecretData>,
    generation: u64,
}

/// In-memory secrets cache guarded by a read/write lock.
///
/// The lock is only held for the in-memory step, never across a store call.
#[derive(Debug, Default)]
pub struct SecretsCache {
    inner: RwLock<CacheState>,
}

impl SecretsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current invalidation generation. Take it before reading the store.
    pub async fn generation(&self) -> u64 {
        self.inner.read().await.generation
    }

    /// Return the requested keys of `secret_name` if every one of them is cached.
    ///
    /// An empty `keys` slice always misses: "all keys" can't be answered from
    /// a cache that may only hold a subset of the secret. A partial match is a
    /// miss too; callers never see a partial mapping.
    pub async fn lookup(&self, secret_name: &str, keys: &[String]) -> Option<SecretData> {
        if keys.is_empty() {
            return None;
        }

        let cache = self.inner.read().await;
        let cached = cache.entries.get(secret_name)?;

        let mut found = SecretData::with_capacity(keys.len());
        for key in keys {
            match cached.get(key) {
                Some(value) => {
                    found.insert(key.clone(), value.clone());
                }
                None => {
                    debug!(secret_name = %secret_name, key = %key, "Secrets cache miss");
                    return None;
                }
            }
        }

        debug!(secret_name = %secret_name, "Secrets cache hit");
        Some(found)
    }

    /// Merge `data` into the entry for `secret_name`, creating it if absent.
    ///
    /// `generation` is the value of [`SecretsCache::generation`] taken before
    /// `data` was read from the store. If the cache was invalidated since,
    /// `data` may predate a write and is discarded. Returns whether it was
    /// merged.
    pub async fn fill(&self, secret_name: &str, data: &SecretData, generation: u64) -> bool {
        let mut cache = self.inner.write().await;
        if cache.generation != generation {
            debug!(
                secret_name = %secret_name,
                read_generation = generation,
                current_generation = cache.generation,
                "Discarding secrets read before the last invalidation"
            );
            return false;
        }

        let entry = cache.entries.entry(secret_name.to_string()).or_default();
        entry.extend(data.iter().map(|(k, v)| (k.clone(), v.clone())));
        true
    }

    /// Drop every cached secret and start a new generation.
    pub async fn invalidate_all(&self) {
        let mut cache = self.inner.write().await;
        let evicted = cache.entries.len();
        cache.entries.clear();
        cache.generation = cache.generation.wrapping_add(1);
        debug!(evicted, generation = cache.generation, "Secrets cache invalidated");
    }

    #[cfg(test)]
    pub(crate) async fn contains(&self, secret_name: &str) -> bool {
        self.inner.read().await.entries.contains_key(secret_name)
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }
}
