//! Core data models for txhistory
//!
//! Identity types, entity-type schema descriptors, and the snapshots of
//! mutated entities the capture engine works on.

pub mod ids;
pub mod schema;
pub mod snapshot;

pub use ids::{ContextId, HistoryId};
pub use schema::{
    EntitySchema, ForeignKey, Multiplicity, RelationshipDescriptor, SchemaFile, SchemaRegistry,
};
pub use snapshot::{ChangeSet, EntityKey, EntitySnapshot, EntityState, Record};
