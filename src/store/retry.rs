//! Per-call timeout and bounded retry around any store.
//!
//! Each try gets `try_timeout`; transient failures and timeouts are
//! retried up to `max_retries` times with exponential backoff capped at
//! `max_retry_delay`. This budget is independent of any batch-level
//! cancellation, so a stuck item can hold its worker for at most
//! roughly `(max_retries + 1) * (try_timeout + max_retry_delay)`.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::warn;

use crate::errors::{PawError, Result};

use super::{RemoteSecret, RemoteSecretStore, SecretPage, Stamps};

/// Timeout and retry budget for a single store call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub try_timeout: Duration,
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            try_timeout: Duration::from_secs(15),
            max_retries: 3,
            base_delay: Duration::from_millis(800),
            max_retry_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (1-based), with jitter in
    /// the upper half of the window.
    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let window = self
            .base_delay
            .saturating_mul(factor)
            .min(self.max_retry_delay);
        let window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
        if window_ms == 0 {
            return Duration::ZERO;
        }
        let jittered = rand::rng().random_range(window_ms / 2..=window_ms);
        Duration::from_millis(jittered)
    }
}

/// Wraps a store so every call carries the retry policy.
#[derive(Debug)]
pub struct RetryingStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: RemoteSecretStore> RetryingStore<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn call<T, F, Fut>(&self, op: &str, name: &str, f: F) -> Result<T>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let mut attempt = 0;
        loop {
            let outcome = match tokio::time::timeout(self.policy.try_timeout, f()).await {
                Ok(result) => result,
                Err(_) => Err(PawError::RemoteUnavailable(format!(
                    "{op} '{name}' timed out after {:?}",
                    self.policy.try_timeout
                ))),
            };

            match outcome {
                Err(e) if e.is_transient() && attempt < self.policy.max_retries => {
                    attempt += 1;
                    let delay = self.policy.delay_for(attempt);
                    warn!(op, name, attempt, ?delay, error = %e, "retrying store call");
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}

#[async_trait]
impl<S: RemoteSecretStore> RemoteSecretStore for RetryingStore<S> {
    async fn list_page(&self, marker: Option<String>) -> Result<SecretPage> {
        let label = marker.clone().unwrap_or_default();
        self.call("list", &label, || self.inner.list_page(marker.clone()))
            .await
    }

    async fn get(&self, name: &str) -> Result<RemoteSecret> {
        self.call("get", name, || self.inner.get(name)).await
    }

    async fn set(&self, name: &str, value: &str, content_tag: &str) -> Result<Stamps> {
        self.call("set", name, || self.inner.set(name, value, content_tag))
            .await
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.call("delete", name, || self.inner.delete(name)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            try_timeout: Duration::from_millis(50),
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            max_retry_delay: Duration::from_millis(2),
        }
    }

    #[test]
    fn delay_is_capped() {
        let policy = RetryPolicy::default();
        for attempt in 1..10 {
            assert!(policy.delay_for(attempt) <= policy.max_retry_delay);
        }
    }

    #[tokio::test]
    async fn transient_failures_are_retried_then_surfaced() {
        let store = RetryingStore::new(MemoryStore::new(), fast_policy());
        store.inner().insert("a", "v", None);
        store.inner().fail_get_for("a");

        let err = store.get("a").await.unwrap_err();
        assert!(matches!(err, PawError::RemoteUnavailable(_)));
        // First try plus two retries.
        assert_eq!(store.inner().get_calls(), 3);
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let store = RetryingStore::new(MemoryStore::new(), fast_policy());
        assert!(matches!(
            store.get("missing").await,
            Err(PawError::SecretNotFound(_))
        ));
        assert_eq!(store.inner().get_calls(), 1);
    }

    #[tokio::test]
    async fn slow_calls_time_out() {
        let store = RetryingStore::new(MemoryStore::new(), fast_policy());
        store.inner().insert("a", "v", None);
        store
            .inner()
            .set_latency(Duration::from_millis(200), Duration::from_millis(200));

        let err = store.get("a").await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
