// Service registration data model
//
// A downstream service contributes one descriptor (`config.json`) plus zero
// or more schema/flow resource files. The descriptor resolves against the
// running environment and region into a `ServiceDefinition`; the definition
// plus its resources form a `ServiceRegistration`, the unit the graph is
// stitched from.

mod cache;
mod definition;
mod layout;
mod registration;

pub use cache::RegistrationCache;
pub use definition::{
	DescriptorFile, RegistrationError, ServiceDefinition, ServiceType,
};
pub use layout::{ResourceKey, ResourceKind};
pub use registration::ServiceRegistration;
