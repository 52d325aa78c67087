//! Metrics collaborators notified about read-path outcomes.
//!
//! Notifications are fire-and-forget: implementations must not panic or
//! block the resolving thread.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use cryptoshred_common::Error;

/// Receiver of decryption outcome events.
pub trait CryptoMetrics: Send + Sync {
    /// A container was decrypted and deserialized.
    fn notify_decryption_success(&self);

    /// A container could not be decrypted or deserialized.
    fn notify_decryption_failure(&self, cause: &Error);

    /// The key for a container is gone; the subject was shredded.
    fn notify_missing_key(&self);
}

/// Metrics collaborator that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopMetrics;

impl CryptoMetrics for NopMetrics {
    fn notify_decryption_success(&self) {}

    fn notify_decryption_failure(&self, _cause: &Error) {}

    fn notify_missing_key(&self) {}
}

/// Metrics collaborator reporting events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMetrics;

impl CryptoMetrics for TracingMetrics {
    fn notify_decryption_success(&self) {
        debug!(event = "decryption_success", "Container decrypted");
    }

    fn notify_decryption_failure(&self, cause: &Error) {
        warn!(event = "decryption_failure", error = %cause, "Container could not be decrypted");
    }

    fn notify_missing_key(&self) {
        debug!(event = "missing_key", "Container key is missing");
    }
}

/// Point-in-time copy of [`CountingMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub decryption_success: u64,
    pub decryption_failure: u64,
    pub missing_key: u64,
}

/// Metrics collaborator counting events.
#[derive(Debug, Default)]
pub struct CountingMetrics {
    decryption_success: AtomicU64,
    decryption_failure: AtomicU64,
    missing_key: AtomicU64,
}

impl CountingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            decryption_success: self.decryption_success.load(Ordering::Relaxed),
            decryption_failure: self.decryption_failure.load(Ordering::Relaxed),
            missing_key: self.missing_key.load(Ordering::Relaxed),
        }
    }
}

impl CryptoMetrics for CountingMetrics {
    fn notify_decryption_success(&self) {
        self.decryption_success.fetch_add(1, Ordering::Relaxed);
    }

    fn notify_decryption_failure(&self, _cause: &Error) {
        self.decryption_failure.fetch_add(1, Ordering::Relaxed);
    }

    fn notify_missing_key(&self) {
        self.missing_key.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting_metrics_snapshot() {
        let metrics = CountingMetrics::new();
        metrics.notify_decryption_success();
        metrics.notify_missing_key();
        metrics.notify_missing_key();
        metrics.notify_decryption_failure(&Error::Decryption("bad padding".to_string()));

        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                decryption_success: 1,
                decryption_failure: 1,
                missing_key: 2,
            }
        );
    }
}
