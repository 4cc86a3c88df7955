// In-memory object store implementation for tests and local runs

use std::collections::BTreeMap;
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use super::{ListedObject, ObjectStoreClient, StoreError};

/// In-memory implementation of `ObjectStoreClient`.
///
/// Suitable for tests and single-process runs; keys are held in a sorted map
/// so listings come back in a deterministic order.
#[derive(Default)]
pub struct MemoryObjectStore {
	objects: Mutex<BTreeMap<String, (Bytes, SystemTime)>>,
}

impl MemoryObjectStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Insert or replace an object with an explicit last-modified timestamp
	pub fn put(&self, key: impl Into<String>, body: impl Into<Bytes>, last_modified: SystemTime) {
		self
			.objects
			.lock()
			.insert(key.into(), (body.into(), last_modified));
	}

	/// Insert or replace an object stamped with the current time
	pub fn put_now(&self, key: impl Into<String>, body: impl Into<Bytes>) {
		self.put(key, body, SystemTime::now());
	}

	/// Remove an object; no-op when the key is unknown
	pub fn remove(&self, key: &str) {
		self.objects.lock().remove(key);
	}

	pub fn len(&self) -> usize {
		self.objects.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.objects.lock().is_empty()
	}
}

#[async_trait]
impl ObjectStoreClient for MemoryObjectStore {
	async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
		let objects = self.objects.lock();
		objects
			.get(key)
			.map(|(body, _)| body.clone())
			.ok_or_else(|| StoreError::NotFound(key.to_string()))
	}

	async fn list(&self, prefix: &str) -> Result<Vec<ListedObject>, StoreError> {
		let objects = self.objects.lock();
		Ok(
			objects
				.iter()
				.filter(|(key, _)| key.starts_with(prefix))
				.map(|(key, (_, last_modified))| ListedObject {
					key: key.clone(),
					last_modified: *last_modified,
				})
				.collect(),
		)
	}
}
