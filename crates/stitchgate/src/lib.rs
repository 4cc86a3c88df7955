//! Dynamic schema composition for a federated API gateway.
//!
//! Downstream services publish registration descriptors and schema
//! documents to an object store. This crate polls the store, diffs it
//! against per-source caches, builds per-service schema providers in
//! parallel, and stitches them into one composed graph that is swapped
//! in atomically. Requests in flight keep the graph they started with.
//!
//! [`pipeline::Composition`] wires the pieces together; everything it is
//! built from is public for embedding in other serving stacks.

pub mod config;
pub mod pipeline;
pub mod poller;
pub mod registration;
pub mod registry;
pub mod rules;
pub mod schema;
pub mod store;
pub mod validation;

pub use config::CompositionConfig;
pub use pipeline::{Composition, PipelineError};
pub use schema::{CompositeGraph, SchemaEvent, SchemaManager};
