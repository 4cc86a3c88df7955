// Cached rule package for the ruleset poller

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tokio::sync::broadcast;
use tracing::info;

use crate::rules::{RulePackage, RuleRecord, RuleSetVersion};

/// Notification that a new rule package has been published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RulesChanged {
	pub version: RuleSetVersion,
}

/// Holds the single currently cached rule package.
///
/// The poller swaps packages in; the authorization instrumentation reads the
/// current package lock-free and re-reads it on change notifications.
pub struct RuleRegistry {
	current: ArcSwapOption<RulePackage>,
	events: broadcast::Sender<RulesChanged>,
}

impl Default for RuleRegistry {
	fn default() -> Self {
		Self::new()
	}
}

impl RuleRegistry {
	pub fn new() -> Self {
		let (events, _) = broadcast::channel(16);
		Self {
			current: ArcSwapOption::empty(),
			events,
		}
	}

	pub fn is_empty(&self) -> bool {
		self.current.load().is_none()
	}

	/// Replace the cached package, returning the stored artifact so callers
	/// can chain off it
	pub fn cache(&self, package: RulePackage) -> Arc<RulePackage> {
		let package = Arc::new(package);
		self.current.store(Some(Arc::clone(&package)));
		info!(
			target: "rules",
			"cached rule package {} ({} rules, {} errors)",
			package.version,
			package.rules.len(),
			package.errors.len()
		);
		package
	}

	pub fn get(&self) -> Option<Arc<RulePackage>> {
		self.current.load_full()
	}

	pub fn rule(&self, id: &str) -> Option<RuleRecord> {
		self.get().and_then(|package| package.rule(id).cloned())
	}

	pub fn subscribe(&self) -> broadcast::Receiver<RulesChanged> {
		self.events.subscribe()
	}

	/// Notify dependents that a re-read is warranted
	pub fn update(&self) {
		if let Some(package) = self.get() {
			let _ = self.events.send(RulesChanged {
				version: package.version.clone(),
			});
		}
	}
}

#[cfg(test)]
mod tests {
	use crate::rules::RuleEntryProcessor;

	use super::*;

	fn package(version: &str) -> RulePackage {
		RuleEntryProcessor::process(
			RuleSetVersion::parse(version),
			vec![(
				"bundle/good/config.json".to_string(),
				r#"{"id": "good", "type": "ONLINE"}"#.to_string(),
			)],
		)
	}

	#[test]
	fn test_cache_and_read() {
		let registry = RuleRegistry::new();
		assert!(registry.is_empty());

		let stored = registry.cache(package("v1"));
		assert_eq!(stored.rules.len(), 1);
		assert!(!registry.is_empty());
		assert!(registry.rule("good").is_some());
		assert_eq!(registry.get().unwrap().version, RuleSetVersion::parse("v1"));
	}

	#[tokio::test]
	async fn test_update_notifies_subscribers() {
		let registry = RuleRegistry::new();
		registry.cache(package("v2"));
		let mut events = registry.subscribe();

		registry.update();
		let event = events.recv().await.unwrap();
		assert_eq!(event.version, RuleSetVersion::parse("v2"));
	}

	#[test]
	fn test_update_without_package_is_silent() {
		let registry = RuleRegistry::new();
		let mut events = registry.subscribe();
		registry.update();
		assert!(events.try_recv().is_err());
	}
}
