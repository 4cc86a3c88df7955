// Polling/diff engine watching the object store for changes

mod descriptor;
mod ruleset;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::rules::RuleBundleError;
use crate::schema::ManagerError;
use crate::store::StoreError;

pub use descriptor::DescriptorSource;
pub use ruleset::RuleSetSource;

/// Errors aborting one poll cycle. The schedule itself survives them.
#[derive(Error, Debug)]
pub enum PollError {
	#[error(transparent)]
	Store(#[from] StoreError),

	#[error(transparent)]
	Bundle(#[from] RuleBundleError),

	#[error(transparent)]
	Rebuild(#[from] ManagerError),
}

/// One pollable source of artifacts.
///
/// `poll` runs one incremental cycle against the source's registry; `fetch`
/// is the one-shot full resync used at startup.
#[async_trait]
pub trait PollingSource: Send + Sync + 'static {
	/// Name used in logs
	fn name(&self) -> &str;

	async fn poll(&self) -> Result<(), PollError>;

	async fn fetch(&self) -> Result<(), PollError>;
}

/// Schedules a source at a fixed period while polling stays enabled.
///
/// The enabled flag is re-checked at each rescheduling boundary, so
/// disabling mid-flight stops future cycles but lets the in-flight one
/// finish. Cycle errors are logged and swallowed; the schedule continues.
pub struct Poller<S> {
	source: Arc<S>,
	period: Duration,
	enabled: Arc<AtomicBool>,
}

impl<S: PollingSource> Poller<S> {
	pub fn new(source: Arc<S>, period: Duration, enabled: Arc<AtomicBool>) -> Self {
		Self {
			source,
			period,
			enabled,
		}
	}

	pub fn spawn(self) -> tokio::task::JoinHandle<()> {
		tokio::spawn(async move {
			info!(
				target: "polling",
				"starting '{}' poll loop with period {:?}",
				self.source.name(),
				self.period
			);
			loop {
				tokio::time::sleep(self.period).await;
				if !self.enabled.load(Ordering::Relaxed) {
					info!(
						target: "polling",
						"polling disabled, stopping '{}' loop",
						self.source.name()
					);
					break;
				}
				if let Err(error) = self.source.poll().await {
					warn!(
						target: "polling",
						"'{}' poll cycle failed: {}",
						self.source.name(),
						error
					);
				}
			}
		})
	}
}
