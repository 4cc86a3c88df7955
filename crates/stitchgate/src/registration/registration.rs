// Registration variants: the tagged union the graph is stitched from

use std::collections::BTreeMap;

use super::definition::{ServiceDefinition, ServiceType};

/// A schema contribution, tagged by kind.
///
/// Structural equality (namespace, endpoint, resources) is what "no real
/// change" detection relies on, so every variant derives `PartialEq`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceRegistration {
	/// Remote-introspection service: no uploaded resources
	Graphql { definition: ServiceDefinition },

	/// SDL service: named schema documents uploaded with the descriptor
	Sdl {
		definition: ServiceDefinition,
		schema_documents: BTreeMap<String, String>,
	},

	/// REST adapter service: schema documents plus flow-mapping documents
	Rest {
		definition: ServiceDefinition,
		schema_documents: BTreeMap<String, String>,
		flow_documents: BTreeMap<String, String>,
	},
}

impl ServiceRegistration {
	/// Assemble a registration from a resolved definition and its resources,
	/// choosing the variant from the descriptor's declared type.
	pub fn from_parts(
		definition: ServiceDefinition,
		schema_documents: BTreeMap<String, String>,
		flow_documents: BTreeMap<String, String>,
	) -> Self {
		match definition.service_type {
			ServiceType::GraphqlSdl => ServiceRegistration::Sdl {
				definition,
				schema_documents,
			},
			ServiceType::Rest => ServiceRegistration::Rest {
				definition,
				schema_documents,
				flow_documents,
			},
			ServiceType::Graphql | ServiceType::Grpc => {
				ServiceRegistration::Graphql { definition }
			},
		}
	}

	pub fn definition(&self) -> &ServiceDefinition {
		match self {
			ServiceRegistration::Graphql { definition } => definition,
			ServiceRegistration::Sdl { definition, .. } => definition,
			ServiceRegistration::Rest { definition, .. } => definition,
		}
	}

	pub fn namespace(&self) -> &str {
		&self.definition().namespace
	}

	pub fn app_id(&self) -> &str {
		&self.definition().app_id
	}

	pub fn service_type(&self) -> ServiceType {
		self.definition().service_type
	}

	/// Uploaded schema documents, when the variant carries any
	pub fn schema_documents(&self) -> Option<&BTreeMap<String, String>> {
		match self {
			ServiceRegistration::Graphql { .. } => None,
			ServiceRegistration::Sdl {
				schema_documents, ..
			} => Some(schema_documents),
			ServiceRegistration::Rest {
				schema_documents, ..
			} => Some(schema_documents),
		}
	}

	/// Flow-mapping documents, present only on the REST variant
	pub fn flow_documents(&self) -> Option<&BTreeMap<String, String>> {
		match self {
			ServiceRegistration::Rest { flow_documents, .. } => Some(flow_documents),
			_ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeSet;
	use std::time::Duration;

	use super::*;

	fn definition(service_type: ServiceType) -> ServiceDefinition {
		ServiceDefinition {
			namespace: "billing".into(),
			app_id: "billing-svc".into(),
			endpoint: "https://billing.internal".into(),
			timeout: Duration::from_secs(5),
			forward_headers: BTreeSet::new(),
			domain_types: BTreeSet::new(),
			client_whitelist: BTreeSet::new(),
			service_type,
		}
	}

	#[test]
	fn test_variant_from_type() {
		let sdl = ServiceRegistration::from_parts(
			definition(ServiceType::GraphqlSdl),
			BTreeMap::from([("main.graphqls".to_string(), "type Query { a: String }".to_string())]),
			BTreeMap::new(),
		);
		assert!(matches!(sdl, ServiceRegistration::Sdl { .. }));
		assert!(sdl.schema_documents().is_some());
		assert!(sdl.flow_documents().is_none());

		let plain = ServiceRegistration::from_parts(
			definition(ServiceType::Graphql),
			BTreeMap::new(),
			BTreeMap::new(),
		);
		assert!(matches!(plain, ServiceRegistration::Graphql { .. }));
		assert!(plain.schema_documents().is_none());
	}

	#[test]
	fn test_structural_equality() {
		let docs =
			BTreeMap::from([("main.graphqls".to_string(), "type Query { a: String }".to_string())]);
		let first = ServiceRegistration::from_parts(
			definition(ServiceType::GraphqlSdl),
			docs.clone(),
			BTreeMap::new(),
		);
		let second = ServiceRegistration::from_parts(
			definition(ServiceType::GraphqlSdl),
			docs,
			BTreeMap::new(),
		);
		assert_eq!(first, second);

		let changed = ServiceRegistration::from_parts(
			definition(ServiceType::GraphqlSdl),
			BTreeMap::from([("main.graphqls".to_string(), "type Query { b: String }".to_string())]),
			BTreeMap::new(),
		);
		assert_ne!(first, changed);
	}
}
