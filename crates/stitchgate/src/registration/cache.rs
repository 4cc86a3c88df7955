// Per-registration-id accumulator used during incremental sync

use std::collections::BTreeMap;

use super::definition::{DescriptorFile, RegistrationError};
use super::layout::ResourceKind;
use super::registration::ServiceRegistration;

/// Mutable per-id accumulator of a descriptor and its resource files.
///
/// Created on the first resource seen for an id, mutated as sibling files
/// arrive or are deleted, and converted to a `ServiceRegistration` on demand.
/// Never convertible until the descriptor itself has been cached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationCache {
	descriptor: Option<DescriptorFile>,
	schema_resources: BTreeMap<String, String>,
	flow_resources: BTreeMap<String, String>,
}

impl RegistrationCache {
	pub fn new() -> Self {
		Self::default()
	}

	/// Upsert one resource. Re-caching the descriptor replaces it wholesale;
	/// re-caching a named resource replaces only that map entry.
	pub fn put(&mut self, kind: &ResourceKind, content: &str) -> Result<(), RegistrationError> {
		match kind {
			ResourceKind::MainConfig => {
				self.descriptor = Some(DescriptorFile::parse(content)?);
			},
			ResourceKind::Schema(name) => {
				self
					.schema_resources
					.insert(name.clone(), content.to_string());
			},
			ResourceKind::Flow(name) => {
				self.flow_resources.insert(name.clone(), content.to_string());
			},
		}
		Ok(())
	}

	/// Remove one non-descriptor resource; no-op when absent.
	///
	/// Descriptor deletion is handled a level up: it removes the entire
	/// cached registration, not a field of it.
	pub fn remove(&mut self, kind: &ResourceKind) {
		match kind {
			ResourceKind::MainConfig => self.descriptor = None,
			ResourceKind::Schema(name) => {
				self.schema_resources.remove(name);
			},
			ResourceKind::Flow(name) => {
				self.flow_resources.remove(name);
			},
		}
	}

	pub fn has_descriptor(&self) -> bool {
		self.descriptor.is_some()
	}

	/// True when nothing at all is cached for this id
	pub fn is_empty(&self) -> bool {
		self.descriptor.is_none()
			&& self.schema_resources.is_empty()
			&& self.flow_resources.is_empty()
	}

	pub fn descriptor(&self) -> Option<&DescriptorFile> {
		self.descriptor.as_ref()
	}

	pub fn schema_resources(&self) -> &BTreeMap<String, String> {
		&self.schema_resources
	}

	pub fn flow_resources(&self) -> &BTreeMap<String, String> {
		&self.flow_resources
	}

	/// Convert to a typed registration, resolving the descriptor against the
	/// running environment. `None` while the descriptor has not arrived yet.
	pub fn to_registration(
		&self,
		env: &str,
		region: &str,
	) -> Option<Result<ServiceRegistration, RegistrationError>> {
		let descriptor = self.descriptor.as_ref()?;
		Some(descriptor.resolve(env, region).map(|definition| {
			ServiceRegistration::from_parts(
				definition,
				self.schema_resources.clone(),
				self.flow_resources.clone(),
			)
		}))
	}
}
