// Parallel provider construction and stitching

use std::sync::Arc;

use futures::StreamExt;
use thiserror::Error;
use tracing::{debug, warn};

use crate::registration::ServiceRegistration;

use super::graph::{CompositeGraph, StitchError};
use super::provider::{IntrospectionClient, ProviderError, SchemaProvider};

/// Build failures
#[derive(Error, Debug)]
pub enum BuildError {
	/// One registration's provider could not be constructed. Droppable
	/// under the skippable policy.
	#[error("provider for '{namespace}' failed: {source}")]
	Provider {
		namespace: String,
		#[source]
		source: ProviderError,
	},

	/// Stitch conflicts abort the build regardless of policy
	#[error(transparent)]
	Stitch(#[from] StitchError),
}

/// Turns a registration set into one composed graph.
///
/// Provider construction runs with bounded parallelism (it may block on
/// network introspection); stitching happens in encounter order afterwards.
pub struct GraphBuilder {
	introspection: Arc<dyn IntrospectionClient>,
	concurrency: usize,
}

impl GraphBuilder {
	pub fn new(introspection: Arc<dyn IntrospectionClient>, concurrency: usize) -> Self {
		Self {
			introspection,
			concurrency: concurrency.max(1),
		}
	}

	async fn build_one(
		&self,
		registration: &ServiceRegistration,
	) -> (String, Result<SchemaProvider, ProviderError>) {
		let namespace = registration.namespace().to_string();
		let provider = SchemaProvider::build(registration, &self.introspection).await;
		(namespace, provider)
	}

	/// Build one provider per registration and stitch the results.
	///
	/// `skippable = true`: a failed provider is logged and dropped, survivors
	/// are still stitched. `skippable = false`: the first failure aborts the
	/// whole build. Stitch conflicts always abort.
	pub async fn build(
		&self,
		registrations: &[ServiceRegistration],
		skippable: bool,
	) -> Result<CompositeGraph, BuildError> {
		let builds: Vec<_> = registrations
			.iter()
			.map(|registration| self.build_one(registration))
			.collect();
		let results: Vec<(String, Result<SchemaProvider, ProviderError>)> =
			futures::stream::iter(builds)
				.buffered(self.concurrency)
				.collect()
				.await;

		let mut providers = Vec::with_capacity(results.len());
		for (namespace, result) in results {
			match result {
				Ok(provider) => providers.push(provider),
				Err(source) if skippable => {
					warn!(
						target: "composition",
						"dropping registration '{}' from the graph: {}",
						namespace, source
					);
				},
				Err(source) => {
					return Err(BuildError::Provider { namespace, source });
				},
			}
		}

		debug!(
			target: "composition",
			"stitching {} providers into one graph",
			providers.len()
		);
		Ok(CompositeGraph::stitch(providers)?)
	}
}
