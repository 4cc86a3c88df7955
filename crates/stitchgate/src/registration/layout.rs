// Object store key layout for registration resources
//
// Descriptors and their resources live under
// `{app}/{env}/registrations/{version}/{registrationId}/main/{file}`.
// Only files directly inside a `main/` folder are candidates; anything
// outside that layout, and any unrecognized file kind, is ignored.

/// Recognized resource kinds inside a registration's `main/` folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceKind {
	/// The `config.json` descriptor
	MainConfig,
	/// A `*.graphqls` schema document, keyed by file name
	Schema(String),
	/// A `*.flow` flow-mapping document, keyed by file name
	Flow(String),
}

/// A recognized object store key, split into registration id and kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceKey {
	pub registration_id: String,
	pub kind: ResourceKind,
}

impl ResourceKey {
	/// Parse a listed key relative to the registration prefix.
	///
	/// Returns `None` for keys outside the recognized layout.
	pub fn parse(prefix: &str, key: &str) -> Option<Self> {
		let relative = key.strip_prefix(prefix)?;
		let segments: Vec<&str> = relative.split('/').collect();
		// Exactly {id}/main/{file}
		if segments.len() != 3 || segments[1] != "main" {
			return None;
		}
		let registration_id = segments[0];
		let file = segments[2];
		if registration_id.is_empty() || file.is_empty() {
			return None;
		}

		let kind = if file == "config.json" {
			ResourceKind::MainConfig
		} else if file.ends_with(".graphqls") {
			ResourceKind::Schema(file.to_string())
		} else if file.ends_with(".flow") {
			ResourceKind::Flow(file.to_string())
		} else {
			return None;
		};

		Some(ResourceKey {
			registration_id: registration_id.to_string(),
			kind,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const PREFIX: &str = "gateway/prod/registrations/v1/";

	#[test]
	fn test_main_config() {
		let key = ResourceKey::parse(PREFIX, "gateway/prod/registrations/v1/billing/main/config.json")
			.unwrap();
		assert_eq!(key.registration_id, "billing");
		assert_eq!(key.kind, ResourceKind::MainConfig);
	}

	#[test]
	fn test_schema_and_flow() {
		let schema =
			ResourceKey::parse(PREFIX, "gateway/prod/registrations/v1/billing/main/schema.graphqls")
				.unwrap();
		assert_eq!(schema.kind, ResourceKind::Schema("schema.graphqls".into()));

		let flow = ResourceKey::parse(PREFIX, "gateway/prod/registrations/v1/billing/main/invoice.flow")
			.unwrap();
		assert_eq!(flow.kind, ResourceKind::Flow("invoice.flow".into()));
	}

	#[test]
	fn test_out_of_layout_keys_ignored() {
		// Wrong prefix
		assert!(ResourceKey::parse(PREFIX, "other/prod/registrations/v1/billing/main/config.json").is_none());
		// Not under main/
		assert!(ResourceKey::parse(PREFIX, "gateway/prod/registrations/v1/billing/extra/config.json").is_none());
		// Nested too deep
		assert!(ResourceKey::parse(PREFIX, "gateway/prod/registrations/v1/billing/main/sub/config.json").is_none());
		// Unrecognized file kind
		assert!(ResourceKey::parse(PREFIX, "gateway/prod/registrations/v1/billing/main/readme.md").is_none());
	}
}
