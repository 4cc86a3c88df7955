// Object store collaborator interface
//
// The composition pipeline only needs two operations from the object store:
// fetch one object's bytes by key and list the objects under a prefix. The
// real client (S3 or compatible) lives outside this crate; `MemoryObjectStore`
// backs tests and local runs, and `RetryingStore` layers the bounded retry
// behavior for transient failures.

mod memory;
mod retry;

use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub use memory::MemoryObjectStore;
pub use retry::RetryingStore;

/// Errors surfaced by object store operations
#[derive(Error, Debug)]
pub enum StoreError {
	#[error("object '{0}' not found")]
	NotFound(String),

	/// Retryable failure (network, 5xx)
	#[error("transient object store failure: {0}")]
	Transient(String),

	/// Non-retryable failure (4xx, malformed response)
	#[error("object store failure: {0}")]
	Permanent(String),
}

impl StoreError {
	pub fn is_transient(&self) -> bool {
		matches!(self, StoreError::Transient(_))
	}
}

/// One listed object: key plus its last-modified timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedObject {
	pub key: String,
	pub last_modified: SystemTime,
}

/// Minimal object store client surface consumed by the pollers
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
	/// Get one object's bytes by key
	async fn get(&self, key: &str) -> Result<Bytes, StoreError>;

	/// List all objects under a key prefix
	async fn list(&self, prefix: &str) -> Result<Vec<ListedObject>, StoreError>;
}
