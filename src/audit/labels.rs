//! Foreign-key label resolution
//!
//! Raw foreign-key ids mean little in an audit trail. For every single-valued
//! relationship on a mutated entity this module looks up the related entity
//! and reports its label fields, so `CustomerId: 7 -> 9` is accompanied by
//! `Name: "Ada" -> "Grace"`.
//!
//! A related entity that cannot be found degrades to an empty label; losing
//! context is acceptable, losing the audit record is not.

use serde_json::Value;
use tracing::debug;

use crate::error::{AuditError, AuditResult};
use crate::models::{
    EntitySchema, EntitySnapshot, EntityState, Record, RelationshipDescriptor, SchemaRegistry,
};
use crate::storage::PersistenceContext;

use super::entry::FieldChange;

/// Placeholder reported when a related entity is missing on one side
fn placeholder() -> Value {
    Value::String(String::new())
}

/// Label value of a related entity, or the placeholder when there is none
fn label_value(entity: Option<&Record>, label: &str) -> Option<Value> {
    match entity {
        Some(record) => record.get(label).cloned(),
        None => Some(placeholder()),
    }
}

/// Resolves foreign-key references on mutated entities to display labels
pub struct RelationshipLabelResolver<'a, C: PersistenceContext + ?Sized> {
    context: &'a C,
    schemas: &'a SchemaRegistry,
}

impl<'a, C: PersistenceContext + ?Sized> RelationshipLabelResolver<'a, C> {
    pub fn new(context: &'a C, schemas: &'a SchemaRegistry) -> Self {
        Self { context, schemas }
    }

    /// Label changes contributed by the entity's foreign-key references
    ///
    /// Collection navigations are never resolved. On modified entities only
    /// references whose foreign-key columns changed are looked up.
    pub fn resolve_labels(
        &self,
        snapshot: &EntitySnapshot,
        schema: &EntitySchema,
    ) -> AuditResult<Vec<FieldChange>> {
        if !snapshot.state.is_mutation() {
            return Ok(Vec::new());
        }

        let changed = snapshot.changed_fields(schema);
        let mut labels = Vec::new();

        for relationship in &schema.relationships {
            if !relationship.is_reference() {
                continue;
            }
            if snapshot.state == EntityState::Modified && !relationship.touches(&changed) {
                continue;
            }

            let target = self
                .schemas
                .require(&relationship.target_set)
                .map_err(|e| resolution_error(snapshot, relationship, e))?;
            if target.label_fields.is_empty() {
                continue;
            }

            // The live reference of a deleted entity may already be gone.
            let related = match snapshot.state {
                EntityState::Deleted => self.lookup(snapshot, relationship, &snapshot.original)?,
                _ => self.navigate(snapshot, relationship)?,
            };

            let previous = if snapshot.state == EntityState::Modified {
                self.lookup(snapshot, relationship, &snapshot.original)?
            } else {
                None
            };

            for label in &target.label_fields {
                let change = match snapshot.state {
                    EntityState::Modified => FieldChange::new(
                        label.as_str(),
                        label_value(previous.as_ref(), label),
                        label_value(related.as_ref(), label),
                    ),
                    EntityState::Deleted => FieldChange::new(
                        label.as_str(),
                        label_value(related.as_ref(), label),
                        Some(placeholder()),
                    ),
                    _ => FieldChange::new(
                        label.as_str(),
                        Some(placeholder()),
                        label_value(related.as_ref(), label),
                    ),
                };
                labels.push(change);
            }
        }

        Ok(labels)
    }

    /// Find the related entity by the foreign-key values in `values`
    fn lookup(
        &self,
        snapshot: &EntitySnapshot,
        relationship: &RelationshipDescriptor,
        values: &Record,
    ) -> AuditResult<Option<Record>> {
        let key = self
            .schemas
            .reference_key(relationship, values)
            .map_err(|e| resolution_error(snapshot, relationship, e))?;
        if key.is_incomplete() {
            return Ok(None);
        }

        let found = self.context.find_by_key(&key);
        self.degrade(snapshot, relationship, found, &key.to_string())
    }

    /// Follow the live reference from the entity's current values
    fn navigate(
        &self,
        snapshot: &EntitySnapshot,
        relationship: &RelationshipDescriptor,
    ) -> AuditResult<Option<Record>> {
        let found = self.context.load_reference(snapshot, relationship);
        self.degrade(snapshot, relationship, found, &relationship.name)
    }

    /// Turn lookup failures into a missing entity; surface anything else
    fn degrade(
        &self,
        snapshot: &EntitySnapshot,
        relationship: &RelationshipDescriptor,
        found: AuditResult<Option<Record>>,
        what: &str,
    ) -> AuditResult<Option<Record>> {
        match found {
            Ok(Some(record)) => Ok(Some(record)),
            Ok(None) => {
                debug!(
                    entity_set = %snapshot.entity_set,
                    relationship = %relationship.name,
                    target = %what,
                    "Related entity not found, using empty label"
                );
                Ok(None)
            }
            Err(err @ AuditError::LookupFailure { .. }) => {
                debug!(
                    entity_set = %snapshot.entity_set,
                    relationship = %relationship.name,
                    error = %err,
                    "Related entity lookup failed, using empty label"
                );
                Ok(None)
            }
            Err(err) if err.is_recoverable() => Err(resolution_error(snapshot, relationship, err)),
            Err(err) => Err(err),
        }
    }
}

fn resolution_error(
    snapshot: &EntitySnapshot,
    relationship: &RelationshipDescriptor,
    err: AuditError,
) -> AuditError {
    AuditError::RelationshipResolution {
        entity_set: snapshot.entity_set.clone(),
        relationship: relationship.name.clone(),
        reason: err.to_string(),
    }
}
