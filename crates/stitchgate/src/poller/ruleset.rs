// Ruleset poller: version-pointer comparison and bundle download

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::registry::RuleRegistry;
use crate::rules::{RuleEntryProcessor, RuleSetVersion};
use crate::store::ObjectStoreClient;

use super::{PollError, PollingSource};

/// Watches the rule-bundle version pointer.
///
/// The pointer file holds the key of the latest bundle archive. When the
/// pointer value is unchanged and the registry is already populated the
/// cycle does nothing at all, skipping the download path entirely.
pub struct RuleSetSource {
	store: Arc<dyn ObjectStoreClient>,
	registry: Arc<RuleRegistry>,
	pointer_key: String,
	last_version: Mutex<Option<RuleSetVersion>>,
}

impl RuleSetSource {
	pub fn new(
		store: Arc<dyn ObjectStoreClient>,
		registry: Arc<RuleRegistry>,
		pointer_key: String,
	) -> Self {
		Self {
			store,
			registry,
			pointer_key,
			last_version: Mutex::new(None),
		}
	}

	/// One sync pass. `notify` distinguishes the repeating sequence (which
	/// signals dependents) from the startup fetch (which must not trigger
	/// them mid-hydration).
	async fn sync(&self, notify: bool) -> Result<(), PollError> {
		// Pointer-read failures keep the loop alive: log, never throw
		let pointer = match self.store.get(&self.pointer_key).await {
			Ok(body) => body,
			Err(error) => {
				warn!(
					target: "rules",
					"failed to read version pointer '{}': {}",
					self.pointer_key, error
				);
				return Ok(());
			},
		};
		let text = match String::from_utf8(pointer.to_vec()) {
			Ok(text) => text,
			Err(_) => {
				warn!(
					target: "rules",
					"version pointer '{}' is not valid UTF-8",
					self.pointer_key
				);
				return Ok(());
			},
		};
		let version = RuleSetVersion::parse(&text);

		let unchanged = {
			let last = self.last_version.lock();
			last.as_ref() == Some(&version) && !self.registry.is_empty()
		};
		if unchanged {
			debug!(target: "rules", "rule bundle {} unchanged, skipping", version);
			return Ok(());
		}

		info!(target: "rules", "downloading rule bundle {}", version);
		let archive = self.store.get(version.as_str()).await?;
		let entries = RuleEntryProcessor::unpack(&archive)?;
		let package = RuleEntryProcessor::process(version.clone(), entries);
		for error in &package.errors {
			warn!(target: "rules", "{}", error);
		}

		self.registry.cache(package);
		*self.last_version.lock() = Some(version);
		if notify {
			self.registry.update();
		}
		Ok(())
	}
}

#[async_trait]
impl PollingSource for RuleSetSource {
	fn name(&self) -> &str {
		"rulesets"
	}

	async fn poll(&self) -> Result<(), PollError> {
		self.sync(true).await
	}

	async fn fetch(&self) -> Result<(), PollError> {
		self.sync(false).await
	}
}
