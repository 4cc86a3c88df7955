// Descriptor parsing and environment resolution

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors fatal to a single registration's parse, never to the batch
#[derive(Error, Debug)]
pub enum RegistrationError {
	#[error("malformed descriptor: {0}")]
	ConfigParse(#[from] serde_json::Error),

	#[error("descriptor missing required field '{0}'")]
	MissingRequiredField(&'static str),

	#[error("registration '{0}' has no namespace")]
	MissingNamespace(String),

	#[error("descriptor for '{app_id}' has no spec for environment '{env}' region '{region}'")]
	InvalidEnvironment {
		app_id: String,
		env: String,
		region: String,
	},
}

/// Kind of schema contribution a service makes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceType {
	/// Remote introspection: the schema is fetched from the running service
	#[serde(rename = "GRAPHQL")]
	Graphql,
	/// Schema documents are uploaded alongside the descriptor
	#[serde(rename = "GRAPHQL_SDL")]
	GraphqlSdl,
	/// Schema documents plus flow-mapping documents
	#[serde(rename = "REST")]
	Rest,
	/// Recognized but not composable into the graph
	#[serde(rename = "GRPC")]
	Grpc,
}

impl ServiceType {
	/// Whether registrations of this type can be stitched into the graph
	pub fn is_stitchable(&self) -> bool {
		matches!(
			self,
			ServiceType::Graphql | ServiceType::GraphqlSdl | ServiceType::Rest
		)
	}
}

impl std::fmt::Display for ServiceType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let name = match self {
			ServiceType::Graphql => "GRAPHQL",
			ServiceType::GraphqlSdl => "GRAPHQL_SDL",
			ServiceType::Rest => "REST",
			ServiceType::Grpc => "GRPC",
		};
		f.write_str(name)
	}
}

/// Raw `config.json` payload as uploaded to the object store.
///
/// Routing facts are nested per environment and region; `resolve` picks the
/// spec for the running environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorFile {
	#[serde(default)]
	pub namespace: String,

	#[serde(default)]
	pub app_id: String,

	#[serde(rename = "type")]
	pub service_type: ServiceType,

	#[serde(default)]
	pub environments: BTreeMap<String, EnvironmentSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentSpec {
	#[serde(default)]
	pub regions: BTreeMap<String, RegionSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionSpec {
	pub endpoint: String,

	#[serde(default = "default_timeout_millis")]
	pub timeout_millis: u64,

	#[serde(default)]
	pub forward_headers: BTreeSet<String>,

	#[serde(default)]
	pub domain_types: BTreeSet<String>,

	#[serde(default)]
	pub client_whitelist: BTreeSet<String>,
}

fn default_timeout_millis() -> u64 {
	10_000
}

impl DescriptorFile {
	pub fn parse(text: &str) -> Result<Self, RegistrationError> {
		let descriptor: DescriptorFile = serde_json::from_str(text)?;
		if descriptor.app_id.is_empty() {
			return Err(RegistrationError::MissingRequiredField("appId"));
		}
		if descriptor.namespace.is_empty() {
			return Err(RegistrationError::MissingNamespace(descriptor.app_id));
		}
		Ok(descriptor)
	}

	/// Resolve this descriptor against the running environment and region
	pub fn resolve(&self, env: &str, region: &str) -> Result<ServiceDefinition, RegistrationError> {
		let spec = self
			.environments
			.get(env)
			.and_then(|e| e.regions.get(region))
			.ok_or_else(|| RegistrationError::InvalidEnvironment {
				app_id: self.app_id.clone(),
				env: env.to_string(),
				region: region.to_string(),
			})?;

		Ok(ServiceDefinition {
			namespace: self.namespace.clone(),
			app_id: self.app_id.clone(),
			endpoint: spec.endpoint.clone(),
			timeout: Duration::from_millis(spec.timeout_millis),
			forward_headers: spec.forward_headers.clone(),
			domain_types: spec.domain_types.clone(),
			client_whitelist: spec.client_whitelist.clone(),
			service_type: self.service_type,
		})
	}
}

/// One downstream service's routing facts, resolved for the running
/// environment. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDefinition {
	pub namespace: String,
	pub app_id: String,
	pub endpoint: String,
	pub timeout: Duration,
	pub forward_headers: BTreeSet<String>,
	pub domain_types: BTreeSet<String>,
	pub client_whitelist: BTreeSet<String>,
	pub service_type: ServiceType,
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;

	use super::*;

	fn descriptor_json() -> &'static str {
		r#"{
			"namespace": "billing",
			"appId": "billing-svc",
			"type": "GRAPHQL_SDL",
			"environments": {
				"prod": {
					"regions": {
						"us-west-2": {
							"endpoint": "https://billing.internal/graphql",
							"timeoutMillis": 5000,
							"forwardHeaders": ["x-request-id"],
							"domainTypes": ["Invoice"]
						}
					}
				}
			}
		}"#
	}

	#[test]
	fn test_parse_and_resolve() {
		let descriptor = DescriptorFile::parse(descriptor_json()).unwrap();
		let definition = descriptor.resolve("prod", "us-west-2").unwrap();

		assert_eq!(definition.namespace, "billing");
		assert_eq!(definition.app_id, "billing-svc");
		assert_eq!(definition.endpoint, "https://billing.internal/graphql");
		assert_eq!(definition.timeout, Duration::from_millis(5000));
		assert!(definition.forward_headers.contains("x-request-id"));
		assert_eq!(definition.service_type, ServiceType::GraphqlSdl);
	}

	#[test]
	fn test_unknown_environment() {
		let descriptor = DescriptorFile::parse(descriptor_json()).unwrap();
		let err = descriptor.resolve("staging", "us-west-2").unwrap_err();
		assert_matches!(err, RegistrationError::InvalidEnvironment { env, .. } if env == "staging");
	}

	#[test]
	fn test_missing_namespace() {
		let err =
			DescriptorFile::parse(r#"{"appId": "x", "type": "GRAPHQL"}"#).unwrap_err();
		assert_matches!(err, RegistrationError::MissingNamespace(app) if app == "x");
	}

	#[test]
	fn test_missing_app_id() {
		let err =
			DescriptorFile::parse(r#"{"namespace": "x", "type": "GRAPHQL"}"#).unwrap_err();
		assert_matches!(err, RegistrationError::MissingRequiredField("appId"));
	}

	#[test]
	fn test_malformed_json() {
		let err = DescriptorFile::parse("{not json").unwrap_err();
		assert_matches!(err, RegistrationError::ConfigParse(_));
	}
}
