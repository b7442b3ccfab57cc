//! # Provider Metrics
//!
//! Counters kept by the secure provider. Every update is mirrored into the
//! `metrics` facade so whichever recorder the host process installs picks
//! them up; the in-process copy backs [`ProviderMetrics::snapshot`].

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub const SECRETS_REQUESTED: &str = "security_secrets_requested_total";
pub const SECRETS_STORED: &str = "security_secrets_stored_total";
pub const CONSUL_TOKENS_REQUESTED: &str = "security_consul_tokens_requested_total";
pub const CONSUL_TOKEN_DURATION: &str = "security_consul_token_duration_seconds";

/// Point-in-time copy of the provider counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MetricsSnapshot {
    pub secrets_requested: u64,
    pub secrets_stored: u64,
    pub consul_tokens_requested: u64,
    /// Number of timed token generations
    pub consul_token_timings: u64,
    /// Total time spent generating tokens, in microseconds
    pub consul_token_duration_micros: u64,
}

/// Metrics recorder owned by one provider instance
#[derive(Debug, Default)]
pub struct ProviderMetrics {
    secrets_requested: AtomicU64,
    secrets_stored: AtomicU64,
    consul_tokens_requested: AtomicU64,
    consul_token_timings: AtomicU64,
    consul_token_duration_micros: AtomicU64,
}

impl ProviderMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a GetSecret call, cache hits included
    pub fn record_secret_requested(&self) {
        self.secrets_requested.fetch_add(1, Ordering::Relaxed);
        counter!(SECRETS_REQUESTED).increment(1);
    }

    /// Record a StoreSecret call, successful or not
    pub fn record_secret_stored(&self) {
        self.secrets_stored.fetch_add(1, Ordering::Relaxed);
        counter!(SECRETS_STORED).increment(1);
    }

    pub fn record_consul_token_requested(&self) {
        self.consul_tokens_requested.fetch_add(1, Ordering::Relaxed);
        counter!(CONSUL_TOKENS_REQUESTED).increment(1);
    }

    /// Record how long an access token request took, successful or not
    pub fn record_consul_token_duration(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.consul_token_timings.fetch_add(1, Ordering::Relaxed);
        self.consul_token_duration_micros.fetch_add(micros, Ordering::Relaxed);
        histogram!(CONSUL_TOKEN_DURATION).record(elapsed.as_secs_f64());
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            secrets_requested: self.secrets_requested.load(Ordering::Relaxed),
            secrets_stored: self.secrets_stored.load(Ordering::Relaxed),
            consul_tokens_requested: self.consul_tokens_requested.load(Ordering::Relaxed),
            consul_token_timings: self.consul_token_timings.load(Ordering::Relaxed),
            consul_token_duration_micros: self.consul_token_duration_micros.load(Ordering::Relaxed),
        }
    }
}

/// Register metric descriptions with the installed recorder.
pub fn describe_metrics() {
    describe_counter!(SECRETS_REQUESTED, Unit::Count, "Number of secrets requested from the provider");
    describe_counter!(SECRETS_STORED, Unit::Count, "Number of secrets stored through the provider");
    describe_counter!(
        CONSUL_TOKENS_REQUESTED,
        Unit::Count,
        "Number of Consul access tokens requested"
    );
    describe_histogram!(
        CONSUL_TOKEN_DURATION,
        Unit::Seconds,
        "Time taken to generate Consul access tokens"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_tracks_updates() {
        let metrics = ProviderMetrics::new();
        metrics.record_secret_requested();
        metrics.record_secret_requested();
        metrics.record_secret_stored();
        metrics.record_consul_token_requested();
        metrics.record_consul_token_duration(Duration::from_millis(3));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.secrets_requested, 2);
        assert_eq!(snapshot.secrets_stored, 1);
        assert_eq!(snapshot.consul_tokens_requested, 1);
        assert_eq!(snapshot.consul_token_timings, 1);
        assert_eq!(snapshot.consul_token_duration_micros, 3_000);
    }

    #[test]
    fn test_describe_without_recorder() {
        // No global recorder installed; must be a no-op.
        describe_metrics();
        ProviderMetrics::new().record_secret_stored();
    }
}
