// Authorization rule bundles
//
// A rule bundle is a zip archive of per-rule directories. The first path
// segment of each entry is discarded (archive root folder), the second is
// the rule id, and the remainder is the file name. Each rule directory holds
// a `config.json`, any number of `*.graphql` query documents, and an
// optional `*.rules` rule-base text. Invalid entries become structured
// errors in the parsed package; valid siblings survive.

use std::collections::BTreeMap;
use std::io::Read;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Pointer to the "latest" rule bundle location. Compared by equality to
/// short-circuit redundant downloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSetVersion(String);

impl RuleSetVersion {
	pub fn parse(raw: &str) -> Self {
		Self(raw.trim().to_string())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Display for RuleSetVersion {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

/// Failure to open or read the bundle archive itself (fatal to this cycle,
/// unlike per-entry errors)
#[derive(Error, Debug)]
pub enum RuleBundleError {
	#[error("failed to read rule bundle archive: {0}")]
	Archive(#[from] zip::result::ZipError),

	#[error("rule bundle entry '{0}' is not valid UTF-8")]
	Encoding(String),
}

/// Structured per-entry errors, accumulated instead of failing the bundle
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleEntryError {
	#[error("rule '{id}': malformed config: {message}")]
	ConfigParse { id: String, message: String },

	#[error("rule '{id}': missing required field '{field}'")]
	MissingRequiredField { id: String, field: &'static str },

	#[error("rule '{id}': no config.json present")]
	MissingConfig { id: String },
}

/// Enforcement mode of one authorization policy unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
	Offline,
	Online,
}

/// Validated rule configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleConfig {
	pub id: String,
	pub description: Option<String>,
	pub kind: RuleKind,
}

/// One parsed authorization policy unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleRecord {
	pub config: RuleConfig,
	/// Query documents by file name
	pub queries: BTreeMap<String, String>,
	pub rule_base: Option<String>,
}

/// A fully parsed rule bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RulePackage {
	pub version: RuleSetVersion,
	pub rules: BTreeMap<String, RuleRecord>,
	pub errors: Vec<RuleEntryError>,
}

impl RulePackage {
	pub fn rule(&self, id: &str) -> Option<&RuleRecord> {
		self.rules.get(id)
	}
}

/// Raw config.json shape, before required-field validation
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRuleConfig {
	#[serde(default)]
	id: Option<String>,

	#[serde(default)]
	description: Option<String>,

	#[serde(rename = "type", default)]
	kind: Option<String>,
}

/// Parses rule bundles into validated rule records
pub struct RuleEntryProcessor;

impl RuleEntryProcessor {
	/// Extract `(path, content)` entries from a zip archive
	pub fn unpack(bytes: &[u8]) -> Result<Vec<(String, String)>, RuleBundleError> {
		let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))?;
		let mut entries = Vec::with_capacity(archive.len());
		for index in 0..archive.len() {
			let mut file = archive.by_index(index)?;
			if file.is_dir() {
				continue;
			}
			let name = file.name().to_string();
			let mut content = String::new();
			file
				.read_to_string(&mut content)
				.map_err(|_| RuleBundleError::Encoding(name.clone()))?;
			entries.push((name, content));
		}
		Ok(entries)
	}

	/// Group entries by rule id and parse each directory into a record,
	/// collecting structured errors instead of failing the bundle.
	pub fn process(
		version: RuleSetVersion,
		entries: impl IntoIterator<Item = (String, String)>,
	) -> RulePackage {
		let mut grouped: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
		for (path, content) in entries {
			let segments: Vec<&str> = path.split('/').collect();
			// First segment is the archive root folder, second the rule id
			if segments.len() < 3 {
				debug!(target: "rules", "ignoring out-of-layout bundle entry '{}'", path);
				continue;
			}
			let id = segments[1].to_string();
			let file = segments[2..].join("/");
			grouped.entry(id).or_default().insert(file, content);
		}

		let mut rules = BTreeMap::new();
		let mut errors = Vec::new();
		for (id, files) in grouped {
			match parse_rule(&id, files) {
				Ok(record) => {
					rules.insert(id, record);
				},
				Err(error) => errors.push(error),
			}
		}

		RulePackage {
			version,
			rules,
			errors,
		}
	}
}

fn parse_rule(
	id: &str,
	files: BTreeMap<String, String>,
) -> Result<RuleRecord, RuleEntryError> {
	let config_text = files
		.get("config.json")
		.ok_or_else(|| RuleEntryError::MissingConfig { id: id.to_string() })?;

	let raw: RawRuleConfig =
		serde_json::from_str(config_text).map_err(|e| RuleEntryError::ConfigParse {
			id: id.to_string(),
			message: e.to_string(),
		})?;

	let rule_id = raw
		.id
		.filter(|v| !v.is_empty())
		.ok_or(RuleEntryError::MissingRequiredField {
			id: id.to_string(),
			field: "id",
		})?;
	let kind = match raw.kind.as_deref() {
		Some("OFFLINE") => RuleKind::Offline,
		Some("ONLINE") => RuleKind::Online,
		Some(other) => {
			return Err(RuleEntryError::ConfigParse {
				id: id.to_string(),
				message: format!("unknown rule type '{}'", other),
			});
		},
		None => {
			return Err(RuleEntryError::MissingRequiredField {
				id: id.to_string(),
				field: "type",
			});
		},
	};

	let mut queries = BTreeMap::new();
	let mut rule_base = None;
	for (name, content) in files {
		if name == "config.json" {
			continue;
		} else if name.ends_with(".graphql") {
			queries.insert(name, content);
		} else if name.ends_with(".rules") {
			rule_base = Some(content);
		} else {
			debug!(target: "rules", "rule '{}': ignoring file '{}'", id, name);
		}
	}

	Ok(RuleRecord {
		config: RuleConfig {
			id: rule_id,
			description: raw.description,
			kind,
		},
		queries,
		rule_base,
	})
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;

	use super::*;

	fn entry(path: &str, content: &str) -> (String, String) {
		(path.to_string(), content.to_string())
	}

	fn version() -> RuleSetVersion {
		RuleSetVersion::parse("bundles/2024-06-01.zip")
	}

	#[test]
	fn test_process_valid_bundle() {
		let package = RuleEntryProcessor::process(
			version(),
			vec![
				entry(
					"bundle/invoice-access/config.json",
					r#"{"id": "invoice-access", "type": "ONLINE", "description": "gate invoices"}"#,
				),
				entry("bundle/invoice-access/check.graphql", "query { viewer { id } }"),
				entry("bundle/invoice-access/base.rules", "allow if owner"),
			],
		);

		assert!(package.errors.is_empty());
		let record = package.rule("invoice-access").unwrap();
		assert_eq!(record.config.kind, RuleKind::Online);
		assert_eq!(record.queries.len(), 1);
		assert_eq!(record.rule_base.as_deref(), Some("allow if owner"));
	}

	#[test]
	fn test_invalid_entries_do_not_poison_siblings() {
		let package = RuleEntryProcessor::process(
			version(),
			vec![
				entry("bundle/good/config.json", r#"{"id": "good", "type": "OFFLINE"}"#),
				entry("bundle/no-id/config.json", r#"{"type": "OFFLINE"}"#),
				entry("bundle/no-type/config.json", r#"{"id": "no-type"}"#),
				entry("bundle/broken/config.json", "{not json"),
				entry("bundle/empty/orphan.graphql", "query { x }"),
			],
		);

		assert_eq!(package.rules.len(), 1);
		assert!(package.rule("good").is_some());
		assert_eq!(package.errors.len(), 4);
		assert!(package.errors.iter().any(|e| matches!(
			e,
			RuleEntryError::MissingRequiredField { field: "id", .. }
		)));
		assert!(package.errors.iter().any(|e| matches!(
			e,
			RuleEntryError::MissingRequiredField { field: "type", .. }
		)));
		assert!(package.errors.iter().any(|e| matches!(e, RuleEntryError::ConfigParse { .. })));
		assert!(package.errors.iter().any(|e| matches!(e, RuleEntryError::MissingConfig { .. })));
	}

	#[test]
	fn test_unknown_rule_type() {
		let package = RuleEntryProcessor::process(
			version(),
			vec![entry("bundle/odd/config.json", r#"{"id": "odd", "type": "SOMETIME"}"#)],
		);
		assert_matches!(&package.errors[0], RuleEntryError::ConfigParse { id, .. } if id == "odd");
	}

	#[test]
	fn test_shallow_entries_ignored() {
		let package = RuleEntryProcessor::process(
			version(),
			vec![entry("bundle/readme.txt", "not a rule")],
		);
		assert!(package.rules.is_empty());
		assert!(package.errors.is_empty());
	}

	#[test]
	fn test_unpack_round_trip() {
		use std::io::Write;

		use zip::write::SimpleFileOptions;

		let mut buffer = std::io::Cursor::new(Vec::new());
		{
			let mut writer = zip::ZipWriter::new(&mut buffer);
			let options = SimpleFileOptions::default();
			writer
				.start_file("bundle/good/config.json", options)
				.unwrap();
			writer
				.write_all(br#"{"id": "good", "type": "ONLINE"}"#)
				.unwrap();
			writer.finish().unwrap();
		}

		let entries = RuleEntryProcessor::unpack(buffer.get_ref()).unwrap();
		assert_eq!(entries.len(), 1);
		let package = RuleEntryProcessor::process(version(), entries);
		assert!(package.rule("good").is_some());
	}
}
