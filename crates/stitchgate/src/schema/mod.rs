// Schema composition: document model, providers, builder, and the manager
// that owns the served graph pointer

mod builder;
mod document;
mod graph;
mod manager;
mod provider;

pub use builder::{BuildError, GraphBuilder};
pub use document::{DocumentError, SchemaDocument, TypeDefinition, TypeKind};
pub use graph::{CompositeGraph, StitchError};
pub use manager::{
	ManagerError, RegistrationProvider, SchemaEvent, SchemaManager, SourceId,
	StaticRegistrationProvider,
};
pub use provider::{
	FlowAdapter, IntrospectionClient, NoIntrospection, ProviderError, SchemaProvider,
	StaticIntrospection,
};
