// Executable schema providers, one per registration

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::registration::{ServiceDefinition, ServiceRegistration, ServiceType};

use super::document::{DocumentError, SchemaDocument};

/// Errors fatal to one provider's construction
#[derive(Error, Debug)]
pub enum ProviderError {
	#[error(transparent)]
	Document(#[from] DocumentError),

	#[error("introspection of '{endpoint}' failed: {message}")]
	Introspection { endpoint: String, message: String },

	#[error("registration has no namespace")]
	MissingNamespace,

	#[error("service type {0} cannot provide a schema")]
	Unsupported(ServiceType),
}

/// Fetches schema documents from a running downstream service.
///
/// The network transport belongs to the execution layer; the builder only
/// needs "give me the SDL documents for this definition".
#[async_trait]
pub trait IntrospectionClient: Send + Sync {
	async fn fetch_schema(
		&self,
		definition: &ServiceDefinition,
	) -> Result<BTreeMap<String, String>, ProviderError>;
}

/// Introspection stub for deployments with no plain-GraphQL sources
pub struct NoIntrospection;

#[async_trait]
impl IntrospectionClient for NoIntrospection {
	async fn fetch_schema(
		&self,
		definition: &ServiceDefinition,
	) -> Result<BTreeMap<String, String>, ProviderError> {
		Err(ProviderError::Introspection {
			endpoint: definition.endpoint.clone(),
			message: "no introspection client configured".to_string(),
		})
	}
}

/// Canned introspection responses keyed by app id, for tests and local runs
#[derive(Default)]
pub struct StaticIntrospection {
	schemas: parking_lot::Mutex<BTreeMap<String, BTreeMap<String, String>>>,
}

impl StaticIntrospection {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&self, app_id: impl Into<String>, documents: BTreeMap<String, String>) {
		self.schemas.lock().insert(app_id.into(), documents);
	}
}

#[async_trait]
impl IntrospectionClient for StaticIntrospection {
	async fn fetch_schema(
		&self,
		definition: &ServiceDefinition,
	) -> Result<BTreeMap<String, String>, ProviderError> {
		self
			.schemas
			.lock()
			.get(&definition.app_id)
			.cloned()
			.ok_or_else(|| ProviderError::Introspection {
				endpoint: definition.endpoint.clone(),
				message: format!("no canned schema for '{}'", definition.app_id),
			})
	}
}

/// Flow-resolution adapter for REST registrations: named flow documents that
/// the execution layer resolves fields through
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowAdapter {
	mappings: BTreeMap<String, String>,
}

impl FlowAdapter {
	pub fn new(mappings: BTreeMap<String, String>) -> Self {
		Self { mappings }
	}

	pub fn mapping(&self, name: &str) -> Option<&str> {
		self.mappings.get(name).map(String::as_str)
	}

	pub fn is_empty(&self) -> bool {
		self.mappings.is_empty()
	}

	pub fn len(&self) -> usize {
		self.mappings.len()
	}
}

/// One built provider: a registration's parsed schema contribution plus the
/// routing facts the execution layer needs to query it
#[derive(Debug, Clone)]
pub struct SchemaProvider {
	definition: ServiceDefinition,
	documents: BTreeMap<String, String>,
	document: SchemaDocument,
	flow: Option<FlowAdapter>,
}

impl SchemaProvider {
	/// Build a provider from a registration, using `introspection` for the
	/// plain-GraphQL variant's network round-trip.
	pub async fn build(
		registration: &ServiceRegistration,
		introspection: &Arc<dyn IntrospectionClient>,
	) -> Result<Self, ProviderError> {
		let definition = registration.definition().clone();
		if definition.namespace.is_empty() {
			return Err(ProviderError::MissingNamespace);
		}

		let (documents, flow) = match registration {
			ServiceRegistration::Sdl {
				schema_documents, ..
			} => (schema_documents.clone(), None),
			ServiceRegistration::Rest {
				schema_documents,
				flow_documents,
				..
			} => (
				schema_documents.clone(),
				Some(FlowAdapter::new(flow_documents.clone())),
			),
			ServiceRegistration::Graphql { .. } => {
				if definition.service_type == ServiceType::Grpc {
					return Err(ProviderError::Unsupported(definition.service_type));
				}
				(introspection.fetch_schema(&definition).await?, None)
			},
		};

		let mut document = SchemaDocument::new();
		for text in documents.values() {
			document.extend_from(SchemaDocument::parse(text)?)?;
		}

		Ok(Self {
			definition,
			documents,
			document,
			flow,
		})
	}

	pub fn namespace(&self) -> &str {
		&self.definition.namespace
	}

	pub fn definition(&self) -> &ServiceDefinition {
		&self.definition
	}

	/// Raw SDL documents by name
	pub fn schema_documents(&self) -> &BTreeMap<String, String> {
		&self.documents
	}

	/// Parsed union of this provider's documents
	pub fn document(&self) -> &SchemaDocument {
		&self.document
	}

	pub fn flow(&self) -> Option<&FlowAdapter> {
		self.flow.as_ref()
	}
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeSet;
	use std::time::Duration;

	use assert_matches::assert_matches;

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

	fn no_introspection() -> Arc<dyn IntrospectionClient> {
		Arc::new(NoIntrospection)
	}

	#[tokio::test]
	async fn test_sdl_provider() {
		let registration = ServiceRegistration::Sdl {
			definition: definition(ServiceType::GraphqlSdl),
			schema_documents: BTreeMap::from([(
				"main.graphqls".to_string(),
				"type Query { invoice: String }".to_string(),
			)]),
		};
		let provider = SchemaProvider::build(&registration, &no_introspection())
			.await
			.unwrap();
		assert_eq!(provider.namespace(), "billing");
		assert!(provider.document().get("Query").is_some());
		assert!(provider.flow().is_none());
	}

	#[tokio::test]
	async fn test_rest_provider_carries_flow_adapter() {
		let registration = ServiceRegistration::Rest {
			definition: definition(ServiceType::Rest),
			schema_documents: BTreeMap::from([(
				"main.graphqls".to_string(),
				"type Query { invoice: String }".to_string(),
			)]),
			flow_documents: BTreeMap::from([(
				"invoice.flow".to_string(),
				"GET /invoices/{id}".to_string(),
			)]),
		};
		let provider = SchemaProvider::build(&registration, &no_introspection())
			.await
			.unwrap();
		let flow = provider.flow().unwrap();
		assert_eq!(flow.mapping("invoice.flow"), Some("GET /invoices/{id}"));
	}

	#[tokio::test]
	async fn test_plain_provider_uses_introspection() {
		let introspection = Arc::new(StaticIntrospection::new());
		introspection.insert(
			"billing-svc",
			BTreeMap::from([(
				"introspected.graphqls".to_string(),
				"type Query { remote: Int }".to_string(),
			)]),
		);
		let client: Arc<dyn IntrospectionClient> = introspection;

		let registration = ServiceRegistration::Graphql {
			definition: definition(ServiceType::Graphql),
		};
		let provider = SchemaProvider::build(&registration, &client).await.unwrap();
		assert!(provider.document().get("Query").is_some());
	}

	#[tokio::test]
	async fn test_plain_provider_without_introspection_fails() {
		let registration = ServiceRegistration::Graphql {
			definition: definition(ServiceType::Graphql),
		};
		let err = SchemaProvider::build(&registration, &no_introspection())
			.await
			.unwrap_err();
		assert_matches!(err, ProviderError::Introspection { .. });
	}

	#[tokio::test]
	async fn test_missing_namespace_rejected() {
		let mut bad = definition(ServiceType::GraphqlSdl);
		bad.namespace.clear();
		let registration = ServiceRegistration::Sdl {
			definition: bad,
			schema_documents: BTreeMap::new(),
		};
		let err = SchemaProvider::build(&registration, &no_introspection())
			.await
			.unwrap_err();
		assert_matches!(err, ProviderError::MissingNamespace);
	}
}
