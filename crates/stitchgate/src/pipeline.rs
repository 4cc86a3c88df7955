// Wires the object store, registries, manager, and pollers into one
// startable unit

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::CompositionConfig;
use crate::poller::{DescriptorSource, PollError, Poller, PollingSource, RuleSetSource};
use crate::registry::{DescriptorRegistry, RuleRegistry};
use crate::schema::{
	GraphBuilder, IntrospectionClient, ManagerError, RegistrationProvider, SchemaManager,
};
use crate::store::{ObjectStoreClient, RetryingStore};
use crate::validation::ValidationService;

#[derive(Error, Debug)]
pub enum PipelineError {
	#[error(transparent)]
	Sync(#[from] PollError),

	#[error(transparent)]
	Manager(#[from] ManagerError),
}

/// The composition pipeline: a schema manager fed by the object-store
/// descriptor source, plus the optional authorization rule source.
///
/// Construction only wires components; nothing is fetched and no graph
/// exists until `start` returns.
pub struct Composition {
	manager: Arc<SchemaManager>,
	descriptors: Arc<DescriptorRegistry>,
	rules: Arc<RuleRegistry>,
	descriptor_source: Arc<DescriptorSource>,
	rule_source: Option<Arc<RuleSetSource>>,
	static_providers: Vec<Arc<dyn RegistrationProvider>>,
	polling_enabled: Arc<AtomicBool>,
	poll_on_start: bool,
	period: std::time::Duration,
	tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Composition {
	pub fn new(
		config: &CompositionConfig,
		store: Arc<dyn ObjectStoreClient>,
		introspection: Arc<dyn IntrospectionClient>,
	) -> Self {
		let store: Arc<dyn ObjectStoreClient> = Arc::new(RetryingStore::new(
			store,
			config.polling.max_retry_attempts,
		));
		let manager = Arc::new(SchemaManager::new(GraphBuilder::new(
			introspection,
			config.build.concurrency,
		)));
		let descriptors = Arc::new(DescriptorRegistry::new(
			config.store.env.clone(),
			config.store.region.clone(),
			manager.clone(),
		));
		let descriptor_source = Arc::new(DescriptorSource::new(
			store.clone(),
			descriptors.clone(),
			config.store.registration_prefix(),
			config.polling.sync_delay,
		));
		let rules = Arc::new(RuleRegistry::new());
		let rule_source = config.rules.enabled.then(|| {
			Arc::new(RuleSetSource::new(
				store.clone(),
				rules.clone(),
				config.rules.pointer_key(&config.store),
			))
		});

		Self {
			manager,
			descriptors,
			rules,
			descriptor_source,
			rule_source,
			static_providers: Vec::new(),
			polling_enabled: Arc::new(AtomicBool::new(false)),
			poll_on_start: config.polling.enabled,
			period: config.polling.period,
			tasks: Mutex::new(Vec::new()),
		}
	}

	/// Add a fixed in-process registration source, hydrated at `start`
	pub fn with_provider(mut self, provider: Arc<dyn RegistrationProvider>) -> Self {
		self.static_providers.push(provider);
		self
	}

	/// Hydrate every source, publish the first composed graph, and spawn
	/// the pollers. Callers should gate readiness on this returning.
	pub async fn start(&self) -> Result<(), PipelineError> {
		let mut providers = self.static_providers.clone();
		providers.push(self.descriptors.clone() as Arc<dyn RegistrationProvider>);
		self.manager.initialize(&providers).await?;

		// Startup fetches resync in full; the rule fetch must not signal
		// dependents mid-hydration
		if let Some(rule_source) = &self.rule_source {
			rule_source.fetch().await?;
		}
		self.descriptor_source.fetch().await?;

		if self.poll_on_start {
			self.resume_polling();
		}
		Ok(())
	}

	/// (Re)enable polling and spawn one poller per source
	pub fn resume_polling(&self) {
		if self.polling_enabled.swap(true, Ordering::SeqCst) {
			return;
		}
		let mut tasks = self.tasks.lock();
		tasks.push(
			Poller::new(
				self.descriptor_source.clone(),
				self.period,
				self.polling_enabled.clone(),
			)
			.spawn(),
		);
		if let Some(rule_source) = &self.rule_source {
			tasks.push(
				Poller::new(rule_source.clone(), self.period, self.polling_enabled.clone()).spawn(),
			);
		}
	}

	/// Stop future poll cycles; the in-flight cycle is allowed to finish
	pub fn pause_polling(&self) {
		if self.polling_enabled.swap(false, Ordering::SeqCst) {
			info!(target: "composition", "polling paused");
		}
	}

	pub fn polling_active(&self) -> bool {
		self.polling_enabled.load(Ordering::SeqCst)
	}

	/// Pause polling and cancel the poller tasks outright
	pub fn shutdown(&self) {
		self.polling_enabled.store(false, Ordering::SeqCst);
		for task in self.tasks.lock().drain(..) {
			task.abort();
		}
		info!(target: "composition", "composition pipeline stopped");
	}

	/// Run one descriptor sync cycle outside the schedule
	pub async fn sync_now(&self) -> Result<(), PipelineError> {
		self.descriptor_source.poll().await?;
		Ok(())
	}

	pub fn manager(&self) -> &Arc<SchemaManager> {
		&self.manager
	}

	pub fn descriptors(&self) -> &Arc<DescriptorRegistry> {
		&self.descriptors
	}

	pub fn rules(&self) -> &Arc<RuleRegistry> {
		&self.rules
	}

	pub fn validation(&self) -> ValidationService {
		ValidationService::new(self.manager.clone())
	}
}

impl Drop for Composition {
	fn drop(&mut self) {
		for task in self.tasks.lock().drain(..) {
			task.abort();
		}
	}
}
