// Descriptor poller: diffs listed registration resources against what was
// last seen and downloads only settled changes

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::registration::ResourceKey;
use crate::registry::DescriptorRegistry;
use crate::store::ObjectStoreClient;

use super::{PollError, PollingSource};

/// Watches the registration prefix of the object store.
///
/// A listed key is a download candidate iff it is unseen or its
/// last-modified timestamp differs from the cached one; a candidate is
/// downloaded only once it is older than the sync delay, so objects are not
/// read mid-upload. Deletions are applied before downloads within a cycle.
pub struct DescriptorSource {
	store: Arc<dyn ObjectStoreClient>,
	registry: Arc<DescriptorRegistry>,
	prefix: String,
	sync_delay: Duration,
	/// Key -> last-modified as of the last successful download
	seen: Mutex<HashMap<String, SystemTime>>,
}

impl DescriptorSource {
	pub fn new(
		store: Arc<dyn ObjectStoreClient>,
		registry: Arc<DescriptorRegistry>,
		prefix: String,
		sync_delay: Duration,
	) -> Self {
		Self {
			store,
			registry,
			prefix,
			sync_delay,
			seen: Mutex::new(HashMap::new()),
		}
	}

	async fn sync_once(&self) -> Result<(), PollError> {
		let listed = self.store.list(&self.prefix).await?;
		let now = SystemTime::now();

		// Only keys inside the recognized main-folder layout participate
		let mut recognized: Vec<(String, ResourceKey, SystemTime)> = listed
			.into_iter()
			.filter_map(|object| {
				ResourceKey::parse(&self.prefix, &object.key)
					.map(|resource| (object.key, resource, object.last_modified))
			})
			.collect();
		recognized.sort_by(|a, b| a.0.cmp(&b.0));

		// Deletions first: seen keys that are no longer listed
		let gone: Vec<String> = {
			let seen = self.seen.lock();
			seen
				.keys()
				.filter(|key| !recognized.iter().any(|(listed, _, _)| listed == *key))
				.cloned()
				.collect()
		};
		for key in gone {
			if let Some(resource) = ResourceKey::parse(&self.prefix, &key) {
				debug!(target: "polling", "applying deletion of '{}'", key);
				self.registry.delete(&resource);
			}
			self.seen.lock().remove(&key);
		}

		let mut cached = 0usize;
		for (key, resource, last_modified) in recognized {
			let candidate = match self.seen.lock().get(&key) {
				None => true,
				Some(previous) => *previous != last_modified,
			};
			if !candidate {
				continue;
			}

			// Debounce: objects may still be mid-upload
			let settled = now
				.duration_since(last_modified)
				.map(|age| age >= self.sync_delay)
				.unwrap_or(false);
			if !settled {
				debug!(
					target: "polling",
					"'{}' changed too recently, deferring download",
					key
				);
				continue;
			}

			let body = match self.store.get(&key).await {
				Ok(body) => body,
				Err(error) => {
					warn!(target: "polling", "failed to download '{}': {}", key, error);
					continue;
				},
			};
			let text = match String::from_utf8(body.to_vec()) {
				Ok(text) => text,
				Err(_) => {
					warn!(target: "polling", "'{}' is not valid UTF-8, skipping", key);
					continue;
				},
			};

			// A key downloaded but failing to parse is still marked seen;
			// a corrected upload will carry a new timestamp
			self.seen.lock().insert(key.clone(), last_modified);
			match self.registry.cache(&resource, &text) {
				Ok(_) => cached += 1,
				Err(error) => {
					warn!(target: "polling", "failed to cache '{}': {}", key, error);
				},
			}
		}

		// Zero cached resources means nothing to rebuild. Note this also
		// covers deletion-only cycles: the rebuild happens on the next
		// cycle that caches something.
		if cached > 0 {
			self.registry.update().await?;
		}
		Ok(())
	}
}

#[async_trait]
impl PollingSource for DescriptorSource {
	fn name(&self) -> &str {
		"descriptors"
	}

	async fn poll(&self) -> Result<(), PollError> {
		self.sync_once().await
	}

	async fn fetch(&self) -> Result<(), PollError> {
		self.sync_once().await
	}
}
