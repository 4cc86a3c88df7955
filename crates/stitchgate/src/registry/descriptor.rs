// Locally cached registration artifacts for the descriptor poller

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::registration::{
	RegistrationCache, RegistrationError, ResourceKey, ResourceKind, ServiceRegistration,
};
use crate::schema::{ManagerError, RegistrationProvider, SchemaManager, SourceId};

/// Holds one `RegistrationCache` per registration id for the object-store
/// source, and forwards complete registrations to the `SchemaManager` when
/// told to update.
///
/// Mutated from the polling pipeline, read from request-serving threads;
/// the backing map is guarded accordingly.
pub struct DescriptorRegistry {
	env: String,
	region: String,
	caches: RwLock<HashMap<String, RegistrationCache>>,
	manager: Arc<SchemaManager>,
	source_id: SourceId,
}

impl DescriptorRegistry {
	pub fn new(env: impl Into<String>, region: impl Into<String>, manager: Arc<SchemaManager>) -> Self {
		Self {
			env: env.into(),
			region: region.into(),
			caches: RwLock::new(HashMap::new()),
			manager,
			source_id: SourceId::new("object-store"),
		}
	}

	pub fn source_id(&self) -> &SourceId {
		&self.source_id
	}

	pub fn is_empty(&self) -> bool {
		self.caches.read().is_empty()
	}

	/// Upsert one downloaded resource into its registration's cache,
	/// returning the stored cache so callers can chain off it.
	///
	/// Re-caching a descriptor replaces it wholesale; re-caching a named
	/// resource replaces only that map entry. A parse failure leaves the map
	/// untouched, so a malformed first resource never creates a phantom id.
	pub fn cache(
		&self,
		key: &ResourceKey,
		content: &str,
	) -> Result<RegistrationCache, RegistrationError> {
		let mut caches = self.caches.write();
		let mut cache = caches
			.get(&key.registration_id)
			.cloned()
			.unwrap_or_default();
		cache.put(&key.kind, content)?;
		caches.insert(key.registration_id.clone(), cache.clone());
		Ok(cache)
	}

	/// Apply a deletion. Deleting the main descriptor key removes the entire
	/// cached registration; deleting any other key removes only that
	/// resource. Unknown keys are a no-op.
	pub fn delete(&self, key: &ResourceKey) {
		let mut caches = self.caches.write();
		match &key.kind {
			ResourceKind::MainConfig => {
				if caches.remove(&key.registration_id).is_some() {
					debug!(
						target: "composition",
						"descriptor deleted, dropping registration '{}'",
						key.registration_id
					);
				}
			},
			kind => {
				if let Some(cache) = caches.get_mut(&key.registration_id) {
					cache.remove(kind);
					if cache.is_empty() {
						caches.remove(&key.registration_id);
					}
				}
			},
		}
	}

	pub fn get(&self, registration_id: &str) -> Option<RegistrationCache> {
		self.caches.read().get(registration_id).cloned()
	}

	/// All complete registrations, resolved against the running environment.
	/// Per-entry resolve failures are logged and skipped, never fatal.
	pub fn registrations(&self) -> Vec<ServiceRegistration> {
		let caches = self.caches.read();
		let mut out = Vec::new();
		for (id, cache) in caches.iter() {
			match cache.to_registration(&self.env, &self.region) {
				Some(Ok(registration)) => out.push(registration),
				Some(Err(error)) => {
					warn!(
						target: "composition",
						"skipping registration '{}': {}",
						id, error
					);
				},
				None => {
					debug!(
						target: "composition",
						"registration '{}' has no descriptor yet",
						id
					);
				},
			}
		}
		// HashMap iteration order is arbitrary; keep builds deterministic
		out.sort_by(|a, b| a.app_id().cmp(b.app_id()));
		out
	}

	/// Signal dependents to re-read: replaces this source's set in the
	/// `SchemaManager` wholesale and triggers a rebuild.
	pub async fn update(&self) -> Result<(), ManagerError> {
		self
			.manager
			.update_registry(&self.source_id, self.registrations())
			.await
	}
}

#[async_trait]
impl RegistrationProvider for DescriptorRegistry {
	fn source_id(&self) -> SourceId {
		self.source_id.clone()
	}

	/// Per-provider failures from the object store source never veto the
	/// rest of the graph
	fn skippable(&self) -> bool {
		true
	}

	async fn initial_registrations(&self) -> Result<Vec<ServiceRegistration>, ManagerError> {
		Ok(self.registrations())
	}
}

#[cfg(test)]
mod tests {
	use crate::schema::{GraphBuilder, NoIntrospection};

	use super::*;

	const DESCRIPTOR: &str = r#"{
		"namespace": "billing",
		"appId": "billing-svc",
		"type": "GRAPHQL_SDL",
		"environments": {
			"prod": {"regions": {"us-west-2": {"endpoint": "https://billing.internal"}}}
		}
	}"#;

	fn registry() -> DescriptorRegistry {
		let manager = Arc::new(SchemaManager::new(GraphBuilder::new(
			Arc::new(NoIntrospection),
			2,
		)));
		DescriptorRegistry::new("prod", "us-west-2", manager)
	}

	fn main_key() -> ResourceKey {
		ResourceKey {
			registration_id: "billing".into(),
			kind: ResourceKind::MainConfig,
		}
	}

	fn schema_key(name: &str) -> ResourceKey {
		ResourceKey {
			registration_id: "billing".into(),
			kind: ResourceKind::Schema(name.into()),
		}
	}

	#[test]
	fn test_cache_and_get() {
		let registry = registry();
		assert!(registry.is_empty());

		let stored = registry.cache(&main_key(), DESCRIPTOR).unwrap();
		assert!(stored.has_descriptor());
		registry
			.cache(&schema_key("main.graphqls"), "type Query { a: String }")
			.unwrap();

		assert!(!registry.is_empty());
		let cache = registry.get("billing").unwrap();
		assert!(cache.has_descriptor());
		assert_eq!(registry.registrations().len(), 1);
	}

	#[test]
	fn test_failed_cache_leaves_no_entry() {
		let registry = registry();

		// A malformed first resource must not create the id at all
		assert!(registry.cache(&main_key(), "{not json").is_err());
		assert!(registry.get("billing").is_none());
		assert!(registry.is_empty());

		// A failed re-cache keeps the previously cached descriptor intact
		registry.cache(&main_key(), DESCRIPTOR).unwrap();
		assert!(registry.cache(&main_key(), "{not json").is_err());
		assert!(registry.get("billing").unwrap().has_descriptor());
	}

	#[test]
	fn test_descriptor_deletion_removes_registration() {
		let registry = registry();
		registry.cache(&main_key(), DESCRIPTOR).unwrap();
		registry
			.cache(&schema_key("main.graphqls"), "type Query { a: String }")
			.unwrap();

		registry.delete(&main_key());
		assert!(registry.get("billing").is_none());
		assert!(registry.is_empty());
	}

	#[test]
	fn test_sibling_deletion_keeps_descriptor() {
		let registry = registry();
		registry.cache(&main_key(), DESCRIPTOR).unwrap();
		registry
			.cache(&schema_key("a.graphqls"), "type Query { a: String }")
			.unwrap();
		registry
			.cache(&schema_key("b.graphqls"), "type Extra { b: String }")
			.unwrap();

		registry.delete(&schema_key("a.graphqls"));
		let cache = registry.get("billing").unwrap();
		assert!(cache.has_descriptor());
		assert_eq!(cache.schema_resources().len(), 1);
	}

	#[test]
	fn test_delete_unknown_is_noop() {
		let registry = registry();
		registry.delete(&main_key());
		assert!(registry.is_empty());
	}

	#[test]
	fn test_incomplete_cache_not_exposed() {
		let registry = registry();
		registry
			.cache(&schema_key("main.graphqls"), "type Query { a: String }")
			.unwrap();
		// Resource arrived before its descriptor: cached but not convertible
		assert!(!registry.is_empty());
		assert!(registry.registrations().is_empty());
	}

	#[tokio::test]
	async fn test_update_publishes_graph() {
		let registry = registry();
		registry.cache(&main_key(), DESCRIPTOR).unwrap();
		registry
			.cache(&schema_key("main.graphqls"), "type Query { a: String }")
			.unwrap();

		registry.update().await.unwrap();
		let graph = registry.manager.current_graph().unwrap();
		assert!(graph.provider("billing").is_some());
	}
}
