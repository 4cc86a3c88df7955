// The composed graph: providers stitched into one served schema

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use super::document::{SchemaDocument, TypeDefinition, TypeKind};
use super::provider::SchemaProvider;

/// Stitch failures always abort the build; partial graphs are never returned
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StitchError {
	#[error("type '{name}' from '{second}' conflicts with the definition from '{first}'")]
	TypeConflict {
		name: String,
		first: String,
		second: String,
	},

	#[error("root field '{type_name}.{field}' from '{second}' conflicts with the definition from '{first}'")]
	RootFieldConflict {
		type_name: String,
		field: String,
		first: String,
		second: String,
	},
}

const ROOT_TYPES: [&str; 3] = ["Query", "Mutation", "Subscription"];

/// The single executable, merged schema currently served.
///
/// Built only from a complete provider set and swapped in atomically;
/// consumers never observe a partially stitched graph.
#[derive(Debug, Clone)]
pub struct CompositeGraph {
	providers: Vec<Arc<SchemaProvider>>,
	by_namespace: HashMap<String, usize>,
	document: SchemaDocument,
}

impl CompositeGraph {
	/// Stitch providers in encounter order into one composed document.
	///
	/// Root operation types merge field-by-field; scalars deduplicate;
	/// identical duplicate definitions collapse; anything else conflicting
	/// under the same name aborts the stitch.
	pub fn stitch(providers: Vec<SchemaProvider>) -> Result<Self, StitchError> {
		let mut document = SchemaDocument::new();
		// Type name -> namespace that contributed it, for conflict messages
		let mut owners: HashMap<String, String> = HashMap::new();

		for provider in &providers {
			let namespace = provider.namespace().to_string();
			for definition in provider.document().types.values() {
				stitch_type(&mut document, &mut owners, &namespace, definition)?;
			}
		}

		let mut by_namespace = HashMap::new();
		let providers: Vec<Arc<SchemaProvider>> =
			providers.into_iter().map(Arc::new).collect();
		for (index, provider) in providers.iter().enumerate() {
			by_namespace.insert(provider.namespace().to_string(), index);
		}

		Ok(Self {
			providers,
			by_namespace,
			document,
		})
	}

	/// An empty graph, served before any source has contributed
	pub fn empty() -> Self {
		Self {
			providers: Vec::new(),
			by_namespace: HashMap::new(),
			document: SchemaDocument::new(),
		}
	}

	pub fn document(&self) -> &SchemaDocument {
		&self.document
	}

	pub fn providers(&self) -> &[Arc<SchemaProvider>] {
		&self.providers
	}

	pub fn provider(&self, namespace: &str) -> Option<&Arc<SchemaProvider>> {
		self
			.by_namespace
			.get(namespace)
			.map(|index| &self.providers[*index])
	}

	pub fn namespaces(&self) -> impl Iterator<Item = &str> {
		self.providers.iter().map(|p| p.namespace())
	}
}

fn stitch_type(
	document: &mut SchemaDocument,
	owners: &mut HashMap<String, String>,
	namespace: &str,
	definition: &TypeDefinition,
) -> Result<(), StitchError> {
	if !document.types.contains_key(&definition.name) {
		document
			.types
			.insert(definition.name.clone(), definition.clone());
		owners.insert(definition.name.clone(), namespace.to_string());
		return Ok(());
	}
	let first = owners
		.get(&definition.name)
		.cloned()
		.unwrap_or_default();

	// Root operation types merge across providers
	if ROOT_TYPES.contains(&definition.name.as_str()) && definition.kind == TypeKind::Object {
		if let Some(existing) = document.types.get_mut(&definition.name) {
			if existing.kind == TypeKind::Object {
				for (field, field_type) in &definition.fields {
					match existing.fields.get(field) {
						Some(known) if known != field_type => {
							return Err(StitchError::RootFieldConflict {
								type_name: definition.name.clone(),
								field: field.clone(),
								first,
								second: namespace.to_string(),
							});
						},
						Some(_) => {},
						None => {
							existing.fields.insert(field.clone(), field_type.clone());
						},
					}
				}
				return Ok(());
			}
		}
	}

	// Shared scalars (DateTime and friends) and byte-identical definitions
	// deduplicate silently
	if document.types.get(&definition.name) == Some(definition) {
		return Ok(());
	}

	Err(StitchError::TypeConflict {
		name: definition.name.clone(),
		first,
		second: namespace.to_string(),
	})
}
