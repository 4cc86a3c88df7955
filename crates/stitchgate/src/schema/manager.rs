// Central registry: per-source registration sets and the served graph pointer

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::registration::ServiceRegistration;

use super::builder::{BuildError, GraphBuilder};
use super::graph::CompositeGraph;

/// Identifier of one upstream supplier of registrations
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(String);

impl SourceId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Display for SourceId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

/// Broadcast after every successful composed-graph swap.
///
/// Delivery is at-least-once from the moment of subscription, with no
/// replay; slow consumers may observe `Lagged` and should re-read the
/// current graph rather than the missed events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaEvent {
	GraphUpdated { version: u64 },
}

#[derive(Error, Debug)]
pub enum ManagerError {
	#[error(transparent)]
	Build(#[from] BuildError),

	#[error("source '{id}' failed to supply initial registrations: {message}")]
	Source { id: SourceId, message: String },
}

/// One upstream source of registrations.
///
/// The object-store-backed source tolerates individual provider failures
/// (`skippable = true`); static/local sources do not.
#[async_trait]
pub trait RegistrationProvider: Send + Sync {
	fn source_id(&self) -> SourceId;

	fn skippable(&self) -> bool {
		false
	}

	async fn initial_registrations(&self) -> Result<Vec<ServiceRegistration>, ManagerError>;
}

/// A fixed, in-process registration source
pub struct StaticRegistrationProvider {
	id: SourceId,
	registrations: Vec<ServiceRegistration>,
}

impl StaticRegistrationProvider {
	pub fn new(id: impl Into<String>, registrations: Vec<ServiceRegistration>) -> Self {
		Self {
			id: SourceId::new(id),
			registrations,
		}
	}
}

#[async_trait]
impl RegistrationProvider for StaticRegistrationProvider {
	fn source_id(&self) -> SourceId {
		self.id.clone()
	}

	async fn initial_registrations(&self) -> Result<Vec<ServiceRegistration>, ManagerError> {
		Ok(self.registrations.clone())
	}
}

struct SourceSlot {
	registrations: Vec<ServiceRegistration>,
	skippable: bool,
}

/// The authoritative, atomically-swapped pointer to the current composed
/// graph, plus one registration set per upstream source.
///
/// Concurrent `update_registry` calls for different sources are not
/// serialized against each other; each performs its own read-union-build-swap
/// over the per-source cache as of call time.
pub struct SchemaManager {
	builder: GraphBuilder,
	sources: RwLock<BTreeMap<SourceId, SourceSlot>>,
	current: ArcSwapOption<CompositeGraph>,
	version: AtomicU64,
	events: broadcast::Sender<SchemaEvent>,
}

impl SchemaManager {
	pub fn new(builder: GraphBuilder) -> Self {
		let (events, _) = broadcast::channel(16);
		Self {
			builder,
			sources: RwLock::new(BTreeMap::new()),
			current: ArcSwapOption::empty(),
			version: AtomicU64::new(0),
			events,
		}
	}

	/// Register a source and its failure policy without building
	pub fn register_source(&self, id: SourceId, skippable: bool) {
		self.sources.write().entry(id).or_insert(SourceSlot {
			registrations: Vec::new(),
			skippable,
		});
	}

	/// The graph currently served; `None` only before initialization
	pub fn current_graph(&self) -> Option<Arc<CompositeGraph>> {
		self.current.load_full()
	}

	pub fn subscribe(&self) -> broadcast::Receiver<SchemaEvent> {
		self.events.subscribe()
	}

	/// All cached registrations across sources, deduplicated structurally
	pub fn cached_registrations(&self) -> Vec<ServiceRegistration> {
		let sources = self.sources.read();
		let mut union: Vec<ServiceRegistration> = Vec::new();
		for slot in sources.values() {
			for registration in &slot.registrations {
				if !union.contains(registration) {
					union.push(registration.clone());
				}
			}
		}
		union
	}

	/// Replace `source`'s registration set wholesale, rebuild the graph from
	/// the union of all sources, and on success swap the served pointer and
	/// broadcast a change event. On failure the previous graph keeps serving.
	pub async fn update_registry(
		&self,
		source: &SourceId,
		registrations: Vec<ServiceRegistration>,
	) -> Result<(), ManagerError> {
		let skippable = {
			let mut sources = self.sources.write();
			let slot = sources.entry(source.clone()).or_insert(SourceSlot {
				registrations: Vec::new(),
				// Unregistered callers get the strict policy
				skippable: false,
			});
			slot.registrations = registrations;
			slot.skippable
		};
		self.build_and_swap(skippable).await
	}

	/// Rebuild from the existing combined cache (configuration changed, not
	/// registrations)
	pub async fn rebuild_graph(&self) -> Result<(), ManagerError> {
		self.build_and_swap(true).await
	}

	/// Build a candidate graph from an explicit registration set without
	/// touching the served pointer. Pre-flight validation path; always
	/// non-skippable.
	pub async fn build_candidate(
		&self,
		registrations: &[ServiceRegistration],
	) -> Result<CompositeGraph, BuildError> {
		self.builder.build(registrations, false).await
	}

	/// Startup hydration: pull every source's initial set, union, build once,
	/// and set the pointer. Deliberately blocking: serving with no graph is
	/// worse than a slower boot, so readiness should gate on this returning.
	pub async fn initialize(
		&self,
		providers: &[Arc<dyn RegistrationProvider>],
	) -> Result<(), ManagerError> {
		for provider in providers {
			let id = provider.source_id();
			self.register_source(id.clone(), provider.skippable());
			let registrations = provider.initial_registrations().await?;
			info!(
				target: "composition",
				"source '{}' supplied {} initial registrations",
				id,
				registrations.len()
			);
			if let Some(slot) = self.sources.write().get_mut(&id) {
				slot.registrations = registrations;
			}
		}
		self.build_and_swap(true).await
	}

	async fn build_and_swap(&self, skippable: bool) -> Result<(), ManagerError> {
		let union = self.cached_registrations();
		let graph = match self.builder.build(&union, skippable).await {
			Ok(graph) => graph,
			Err(err) => {
				warn!(
					target: "composition",
					"graph rebuild failed, previous graph keeps serving: {}",
					err
				);
				return Err(err.into());
			},
		};

		let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
		self.current.store(Some(Arc::new(graph)));
		info!(target: "composition", "published composed graph v{}", version);
		let _ = self.events.send(SchemaEvent::GraphUpdated { version });
		Ok(())
	}
}
