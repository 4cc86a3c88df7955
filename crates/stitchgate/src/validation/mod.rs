// Pre-flight validation: build a candidate graph and diff it against the
// graph currently served

mod diff;

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::registration::{ServiceRegistration, ServiceType};
use crate::schema::{BuildError, SchemaDocument, SchemaManager};

pub use diff::{DiffSeverity, SchemaChange};

/// Validation failures, surfaced to the caller as structured errors
/// (HTTP-mappable as "unprocessable")
#[derive(Error, Debug)]
pub enum ValidationError {
	#[error("service type {0} is not supported for schema validation")]
	UnsupportedType(ServiceType),

	#[error("could not compute schema diff: {0}")]
	Diff(#[from] BuildError),
}

/// Result of comparing the to-be graph against the currently served one
#[derive(Debug, Clone)]
pub struct SchemaDiffReport {
	/// The registration under test
	pub namespace: String,
	pub app_id: String,
	/// False when the candidate is structurally identical to what is cached
	pub schema_updated: bool,
	pub additions: Vec<SchemaChange>,
	pub dangers: Vec<SchemaChange>,
	pub breakages: Vec<SchemaChange>,
}

impl SchemaDiffReport {
	fn unchanged(candidate: &ServiceRegistration) -> Self {
		Self {
			namespace: candidate.namespace().to_string(),
			app_id: candidate.app_id().to_string(),
			schema_updated: false,
			additions: Vec::new(),
			dangers: Vec::new(),
			breakages: Vec::new(),
		}
	}

	pub fn has_breakages(&self) -> bool {
		!self.breakages.is_empty()
	}
}

/// Decides whether a proposed registration change is safe before it is
/// uploaded to the object store
pub struct ValidationService {
	manager: Arc<SchemaManager>,
}

impl ValidationService {
	pub fn new(manager: Arc<SchemaManager>) -> Self {
		Self { manager }
	}

	/// Compute the hypothetical "to-be" registration set, build a candidate
	/// graph from it (never skippable), and classify its differences from
	/// the served graph.
	pub async fn validate(
		&self,
		candidate: &ServiceRegistration,
	) -> Result<SchemaDiffReport, ValidationError> {
		if !candidate.service_type().is_stitchable() {
			return Err(ValidationError::UnsupportedType(candidate.service_type()));
		}

		let mut to_be = Vec::new();
		let mut updated = false;
		let mut matched = false;
		for existing in self.manager.cached_registrations() {
			if existing.app_id() == candidate.app_id() {
				matched = true;
				if existing == *candidate {
					// Identical content: keep the old one, nothing to report
					to_be.push(existing);
				} else {
					to_be.push(candidate.clone());
					updated = true;
				}
			} else {
				to_be.push(existing);
			}
		}
		if !matched {
			to_be.push(candidate.clone());
			updated = true;
		}

		if !updated {
			debug!(
				target: "composition",
				"validation of '{}': no update",
				candidate.app_id()
			);
			return Ok(SchemaDiffReport::unchanged(candidate));
		}

		let candidate_graph = self.manager.build_candidate(&to_be).await?;
		let empty = SchemaDocument::new();
		let served = self.manager.current_graph();
		let served_document = served
			.as_deref()
			.map(|graph| graph.document())
			.unwrap_or(&empty);

		let changes = diff::diff_documents(served_document, candidate_graph.document());
		let mut report = SchemaDiffReport {
			namespace: candidate.namespace().to_string(),
			app_id: candidate.app_id().to_string(),
			schema_updated: true,
			additions: Vec::new(),
			dangers: Vec::new(),
			breakages: Vec::new(),
		};
		for change in changes {
			match change.severity() {
				DiffSeverity::Info => report.additions.push(change),
				DiffSeverity::Danger => report.dangers.push(change),
				DiffSeverity::Breaking => report.breakages.push(change),
			}
		}

		info!(
			target: "composition",
			"validated '{}': {} additions, {} dangers, {} breakages",
			report.app_id,
			report.additions.len(),
			report.dangers.len(),
			report.breakages.len()
		);
		Ok(report)
	}
}
