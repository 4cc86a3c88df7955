// Bounded retry decorator for transient object store failures

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rand::Rng;
use tracing::warn;

use super::{ListedObject, ObjectStoreClient, StoreError};

/// Wraps an `ObjectStoreClient` with bounded retry for transient failures.
///
/// Non-transient failures (not-found, 4xx-style errors) fail fast; transient
/// ones are retried with exponential backoff and jitter up to the configured
/// attempt count, then surfaced.
pub struct RetryingStore {
	inner: Arc<dyn ObjectStoreClient>,
	max_attempts: u32,
	base_backoff: Duration,
}

impl RetryingStore {
	pub fn new(inner: Arc<dyn ObjectStoreClient>, max_attempts: u32) -> Self {
		Self {
			inner,
			max_attempts: max_attempts.max(1),
			base_backoff: Duration::from_millis(200),
		}
	}

	pub fn with_base_backoff(mut self, base_backoff: Duration) -> Self {
		self.base_backoff = base_backoff;
		self
	}

	async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, StoreError>
	where
		F: FnMut() -> Fut,
		Fut: std::future::Future<Output = Result<T, StoreError>>,
	{
		let mut attempt = 0;
		loop {
			attempt += 1;
			match op().await {
				Ok(value) => return Ok(value),
				Err(err) if err.is_transient() && attempt < self.max_attempts => {
					let backoff = self.backoff(attempt);
					warn!(
						target: "object_store",
						"{} failed (attempt {}/{}), retrying in {:?}: {}",
						what, attempt, self.max_attempts, backoff, err
					);
					tokio::time::sleep(backoff).await;
				},
				Err(err) => return Err(err),
			}
		}
	}

	fn backoff(&self, attempt: u32) -> Duration {
		let base = self.base_backoff.as_millis() as u64;
		let scaled = base.saturating_mul(1u64 << (attempt - 1).min(8));
		let jitter = rand::rng().random_range(0..=base);
		Duration::from_millis(scaled + jitter)
	}
}

#[async_trait]
impl ObjectStoreClient for RetryingStore {
	async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
		self.run("get", || self.inner.get(key)).await
	}

	async fn list(&self, prefix: &str) -> Result<Vec<ListedObject>, StoreError> {
		self.run("list", || self.inner.list(prefix)).await
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicU32, Ordering};

	use super::*;

	struct FlakyStore {
		failures: AtomicU32,
		transient: bool,
	}

	#[async_trait]
	impl ObjectStoreClient for FlakyStore {
		async fn get(&self, _key: &str) -> Result<Bytes, StoreError> {
			if self.failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok() {
				if self.transient {
					Err(StoreError::Transient("connection reset".into()))
				} else {
					Err(StoreError::Permanent("access denied".into()))
				}
			} else {
				Ok(Bytes::from_static(b"payload"))
			}
		}

		async fn list(&self, _prefix: &str) -> Result<Vec<ListedObject>, StoreError> {
			Ok(vec![])
		}
	}

	#[tokio::test(start_paused = true)]
	async fn test_transient_failures_retried() {
		let inner = Arc::new(FlakyStore {
			failures: AtomicU32::new(2),
			transient: true,
		});
		let store = RetryingStore::new(inner, 3);
		let body = store.get("k").await.unwrap();
		assert_eq!(&body[..], b"payload");
	}

	#[tokio::test(start_paused = true)]
	async fn test_retry_budget_exhausted() {
		let inner = Arc::new(FlakyStore {
			failures: AtomicU32::new(10),
			transient: true,
		});
		let store = RetryingStore::new(inner, 3);
		let err = store.get("k").await.unwrap_err();
		assert!(err.is_transient());
	}

	#[tokio::test]
	async fn test_permanent_failure_fails_fast() {
		let inner = Arc::new(FlakyStore {
			failures: AtomicU32::new(10),
			transient: false,
		});
		let store = RetryingStore::new(inner, 3);
		let err = store.get("k").await.unwrap_err();
		assert!(!err.is_transient());
	}
}
