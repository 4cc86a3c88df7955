// Configuration surface for the composition pipeline

use std::time::Duration;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Errors raised while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("failed to read config file: {0}")]
	Io(#[from] std::io::Error),

	#[error("failed to parse config: {0}")]
	Parse(#[from] serde_yaml::Error),

	#[error("invalid duration '{0}'")]
	InvalidDuration(String),
}

/// Top-level configuration for the composition pipeline
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CompositionConfig {
	#[serde(default)]
	pub polling: PollingConfig,

	#[serde(default)]
	pub store: ObjectStoreConfig,

	#[serde(default)]
	pub rules: RuleRegistryConfig,

	#[serde(default)]
	pub build: BuildConfig,
}

impl CompositionConfig {
	/// Load configuration from a YAML document
	pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
		Ok(serde_yaml::from_str(text)?)
	}

	pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
		Self::from_yaml(&std::fs::read_to_string(path)?)
	}
}

/// Polling engine configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PollingConfig {
	/// Live flag; disabling stops future cycles but lets in-flight ones finish
	#[serde(default = "default_true")]
	pub enabled: bool,

	/// Period between poll cycles
	#[serde(default = "default_period", deserialize_with = "de_duration")]
	pub period: Duration,

	/// Debounce window: objects modified more recently than this are skipped
	#[serde(default = "default_sync_delay", deserialize_with = "de_duration")]
	pub sync_delay: Duration,

	/// Bounded retry attempts for transient object store failures
	#[serde(default = "default_retry_attempts")]
	pub max_retry_attempts: u32,
}

impl Default for PollingConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			period: default_period(),
			sync_delay: default_sync_delay(),
			max_retry_attempts: default_retry_attempts(),
		}
	}
}

/// Object store location of descriptors and rule bundles
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ObjectStoreConfig {
	#[serde(default)]
	pub bucket: String,

	#[serde(default)]
	pub app_name: String,

	#[serde(default)]
	pub env: String,

	#[serde(default)]
	pub version: String,

	#[serde(default)]
	pub region: String,
}

impl ObjectStoreConfig {
	/// Key prefix under which registration resources live:
	/// `{app}/{env}/registrations/{version}/`
	pub fn registration_prefix(&self) -> String {
		format!(
			"{}/{}/registrations/{}/",
			self.app_name, self.env, self.version
		)
	}
}

/// Authorization rule registry configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RuleRegistryConfig {
	#[serde(default)]
	pub enabled: bool,

	#[serde(default = "default_rules_directory")]
	pub rules_directory: String,

	#[serde(default = "default_versions_file")]
	pub versions_file_name: String,
}

impl RuleRegistryConfig {
	/// Key of the latest-bundle version pointer:
	/// `{app}/{env}/{rulesDirectory}/{versionsFileName}`
	pub fn pointer_key(&self, store: &ObjectStoreConfig) -> String {
		format!(
			"{}/{}/{}/{}",
			store.app_name, store.env, self.rules_directory, self.versions_file_name
		)
	}
}

impl Default for RuleRegistryConfig {
	fn default() -> Self {
		Self {
			enabled: false,
			rules_directory: default_rules_directory(),
			versions_file_name: default_versions_file(),
		}
	}
}

/// Graph build configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BuildConfig {
	/// Worker count for provider construction, sized independently of the
	/// request-serving runtime because construction may block on network I/O
	#[serde(default = "default_concurrency")]
	pub concurrency: usize,
}

impl Default for BuildConfig {
	fn default() -> Self {
		Self {
			concurrency: default_concurrency(),
		}
	}
}

fn default_true() -> bool {
	true
}

fn default_period() -> Duration {
	Duration::from_secs(30)
}

fn default_sync_delay() -> Duration {
	Duration::from_secs(60)
}

fn default_retry_attempts() -> u32 {
	3
}

fn default_rules_directory() -> String {
	"rules".to_string()
}

fn default_versions_file() -> String {
	"versions.txt".to_string()
}

fn default_concurrency() -> usize {
	4
}

fn de_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
	D: Deserializer<'de>,
{
	let raw = String::deserialize(deserializer)?;
	parse_duration(&raw).map_err(serde::de::Error::custom)
}

/// Parse a duration string like "5m", "30s", "1h"
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
	let s = s.trim();
	if s.is_empty() {
		return Err(ConfigError::InvalidDuration(s.to_string()));
	}

	let (num_str, unit) = if s.ends_with("ms") {
		(&s[..s.len() - 2], "ms")
	} else if s.ends_with('s') {
		(&s[..s.len() - 1], "s")
	} else if s.ends_with('m') {
		(&s[..s.len() - 1], "m")
	} else if s.ends_with('h') {
		(&s[..s.len() - 1], "h")
	} else {
		// Assume seconds if no unit
		(s, "s")
	};

	let num: u64 = num_str
		.parse()
		.map_err(|_| ConfigError::InvalidDuration(s.to_string()))?;

	let duration = match unit {
		"ms" => Duration::from_millis(num),
		"s" => Duration::from_secs(num),
		"m" => Duration::from_secs(num * 60),
		"h" => Duration::from_secs(num * 60 * 60),
		_ => return Err(ConfigError::InvalidDuration(s.to_string())),
	};

	Ok(duration)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_duration() {
		assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
		assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
		assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
		assert_eq!(parse_duration("100ms").unwrap(), Duration::from_millis(100));
		assert_eq!(parse_duration("30").unwrap(), Duration::from_secs(30));
	}

	#[test]
	fn test_parse_duration_errors() {
		assert!(parse_duration("").is_err());
		assert!(parse_duration("abc").is_err());
		assert!(parse_duration("-5s").is_err());
	}

	#[test]
	fn test_defaults() {
		let config = CompositionConfig::from_yaml("{}").unwrap();
		assert!(config.polling.enabled);
		assert_eq!(config.polling.period, Duration::from_secs(30));
		assert_eq!(config.polling.sync_delay, Duration::from_secs(60));
		assert!(!config.rules.enabled);
		assert_eq!(config.build.concurrency, 4);
	}

	#[test]
	fn test_full_config() {
		let yaml = r#"
polling:
  enabled: true
  period: 10s
  syncDelay: 2m
  maxRetryAttempts: 5
store:
  bucket: schema-bucket
  appName: gateway
  env: prod
  version: v1
  region: us-west-2
rules:
  enabled: true
  rulesDirectory: authz
  versionsFileName: latest.txt
build:
  concurrency: 8
"#;
		let config = CompositionConfig::from_yaml(yaml).unwrap();
		assert_eq!(config.polling.period, Duration::from_secs(10));
		assert_eq!(config.polling.sync_delay, Duration::from_secs(120));
		assert_eq!(config.polling.max_retry_attempts, 5);
		assert_eq!(
			config.store.registration_prefix(),
			"gateway/prod/registrations/v1/"
		);
		assert_eq!(
			config.rules.pointer_key(&config.store),
			"gateway/prod/authz/latest.txt"
		);
		assert_eq!(config.build.concurrency, 8);
	}

	#[test]
	fn test_from_file() {
		use std::io::Write;

		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "polling:\n  period: 45s").unwrap();

		let config = CompositionConfig::from_file(file.path()).unwrap();
		assert_eq!(config.polling.period, Duration::from_secs(45));
	}

	#[test]
	fn test_from_file_missing() {
		let err = CompositionConfig::from_file("/nonexistent/composition.yaml").unwrap_err();
		assert!(matches!(err, ConfigError::Io(_)));
	}
}
