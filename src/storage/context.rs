//! Persistence collaborator interface
//!
//! What the capture engine needs from the object-relational layer. The
//! engine never writes through this interface; the unit of work owns the
//! tracked entities for the duration of the capture.

use crate::error::AuditResult;
use crate::models::{EntityKey, EntitySnapshot, EntityState, RelationshipDescriptor, Record};

/// Read access to the tracked entities of one unit of work and to its backing store
pub trait PersistenceContext {
    /// Tracked entities in the given state, in tracking order
    fn entries(&self, state: EntityState) -> AuditResult<Vec<EntitySnapshot>>;

    /// Values currently persisted for `key`, bypassing tracked changes
    fn database_values(&self, key: &EntityKey) -> AuditResult<Option<Record>>;

    /// Locate an entity by key, including tracked entities pending deletion
    fn find_by_key(&self, key: &EntityKey) -> AuditResult<Option<Record>>;

    /// Follow a reference from a tracked entity through its current foreign-key values
    fn load_reference(
        &self,
        snapshot: &EntitySnapshot,
        relationship: &RelationshipDescriptor,
    ) -> AuditResult<Option<Record>>;
}
