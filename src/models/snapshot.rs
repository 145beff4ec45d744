//! Mutated entity snapshots
//!
//! An [`EntitySnapshot`] is what the persistence layer hands the capture
//! engine for each tracked entity: its entity set, its mutation kind, and the
//! original and current field values. A [`ChangeSet`] partitions the
//! snapshots of one unit of work by mutation kind.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::schema::EntitySchema;
use crate::error::{AuditError, AuditResult};

/// Field name to value map for one entity row
pub type Record = serde_json::Map<String, Value>;

/// Mutation kind of a tracked entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityState {
    Added,
    Deleted,
    Modified,
    Unchanged,
    Detached,
}

impl EntityState {
    /// Parse a state reported by a collaborator
    ///
    /// Anything outside the five known states is a contract violation.
    pub fn parse(entity_set: &str, state: &str) -> AuditResult<Self> {
        match state.to_ascii_lowercase().as_str() {
            "added" => Ok(Self::Added),
            "deleted" => Ok(Self::Deleted),
            "modified" => Ok(Self::Modified),
            "unchanged" => Ok(Self::Unchanged),
            "detached" => Ok(Self::Detached),
            _ => Err(AuditError::UnsupportedState {
                entity_set: entity_set.to_string(),
                state: state.to_string(),
            }),
        }
    }

    /// Whether this state carries a change worth auditing
    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::Added | Self::Deleted | Self::Modified)
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityState::Added => write!(f, "Added"),
            EntityState::Deleted => write!(f, "Deleted"),
            EntityState::Modified => write!(f, "Modified"),
            EntityState::Unchanged => write!(f, "Unchanged"),
            EntityState::Detached => write!(f, "Detached"),
        }
    }
}

/// Identity key of an entity: its set plus key field values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityKey {
    pub entity_set: String,
    pub members: Vec<(String, Value)>,
}

impl EntityKey {
    pub fn new(entity_set: impl Into<String>, members: Vec<(String, Value)>) -> Self {
        Self {
            entity_set: entity_set.into(),
            members,
        }
    }

    /// Value of one key member
    pub fn value(&self, field: &str) -> Option<&Value> {
        self.members
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    /// A key with a null member cannot identify a row
    pub fn is_incomplete(&self) -> bool {
        self.members.is_empty() || self.members.iter().any(|(_, v)| v.is_null())
    }

    /// Canonical string used to index rows within an entity set
    pub fn storage_key(&self) -> String {
        Value::Array(self.members.iter().map(|(_, v)| v.clone()).collect()).to_string()
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let members: Vec<String> = self
            .members
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        write!(f, "{}[{}]", self.entity_set, members.join(","))
    }
}

/// One tracked entity as seen at save time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub entity_set: String,
    pub state: EntityState,

    /// Values as last read from the store (meaningless for Added)
    #[serde(default)]
    pub original: Record,

    /// Values about to be written (meaningless for Deleted)
    #[serde(default)]
    pub current: Record,
}

impl EntitySnapshot {
    pub fn added(entity_set: impl Into<String>, current: Record) -> Self {
        Self {
            entity_set: entity_set.into(),
            state: EntityState::Added,
            original: Record::new(),
            current,
        }
    }

    pub fn deleted(entity_set: impl Into<String>, original: Record) -> Self {
        Self {
            entity_set: entity_set.into(),
            state: EntityState::Deleted,
            original,
            current: Record::new(),
        }
    }

    pub fn modified(entity_set: impl Into<String>, original: Record, current: Record) -> Self {
        Self {
            entity_set: entity_set.into(),
            state: EntityState::Modified,
            original,
            current,
        }
    }

    /// Values that describe the entity in its present state
    pub fn usable_values(&self) -> &Record {
        match self.state {
            EntityState::Deleted => &self.original,
            _ => &self.current,
        }
    }

    pub fn original_value(&self, field: &str) -> Option<&Value> {
        match self.state {
            EntityState::Added | EntityState::Detached => None,
            _ => self.original.get(field),
        }
    }

    pub fn current_value(&self, field: &str) -> Option<&Value> {
        match self.state {
            EntityState::Deleted => None,
            _ => self.current.get(field),
        }
    }

    pub fn key(&self, schema: &EntitySchema) -> EntityKey {
        schema.key_from(self.usable_values())
    }

    /// Fields whose current value differs from the original, in declaration order
    ///
    /// Empty for anything but Modified entities.
    pub fn changed_fields(&self, schema: &EntitySchema) -> Vec<String> {
        if self.state != EntityState::Modified {
            return Vec::new();
        }
        schema
            .fields
            .iter()
            .filter(|f| self.original.get(f.as_str()) != self.current.get(f.as_str()))
            .cloned()
            .collect()
    }

    /// Replace original values with what the backing store holds now
    pub fn refresh_original(&mut self, values: Record) {
        self.original = values;
    }
}

/// Mutated entities of one unit of work, partitioned by mutation kind
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub added: Vec<EntitySnapshot>,
    pub deleted: Vec<EntitySnapshot>,
    pub modified: Vec<EntitySnapshot>,
}

impl ChangeSet {
    /// Build a change set, checking every snapshot sits in the right partition
    pub fn new(
        added: Vec<EntitySnapshot>,
        deleted: Vec<EntitySnapshot>,
        modified: Vec<EntitySnapshot>,
    ) -> AuditResult<Self> {
        for (snapshots, expected) in [
            (&added, EntityState::Added),
            (&deleted, EntityState::Deleted),
            (&modified, EntityState::Modified),
        ] {
            if let Some(stray) = snapshots.iter().find(|s| s.state != expected) {
                return Err(AuditError::UnsupportedState {
                    entity_set: stray.entity_set.clone(),
                    state: format!("{} (reported as {})", stray.state, expected),
                });
            }
        }
        Ok(Self {
            added,
            deleted,
            modified,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.modified.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.deleted.len() + self.modified.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn customers() -> EntitySchema {
        EntitySchema::new("Customers", &["Id", "Name", "City"], &["Id"])
    }

    #[test]
    fn test_state_parse() {
        assert_eq!(EntityState::parse("Orders", "Added").unwrap(), EntityState::Added);
        assert_eq!(EntityState::parse("Orders", "modified").unwrap(), EntityState::Modified);
        let err = EntityState::parse("Orders", "Archived").unwrap_err();
        assert!(matches!(err, AuditError::UnsupportedState { .. }));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_changed_fields_in_declaration_order() {
        let snapshot = EntitySnapshot::modified(
            "Customers",
            record(json!({"Id": 1, "Name": "Ada", "City": "Paris"})),
            record(json!({"Id": 1, "Name": "Ada L.", "City": "London"})),
        );
        assert_eq!(snapshot.changed_fields(&customers()), vec!["Name", "City"]);
    }

    #[test]
    fn test_changed_fields_empty_for_added() {
        let snapshot = EntitySnapshot::added("Customers", record(json!({"Id": 1, "Name": "Ada"})));
        assert!(snapshot.changed_fields(&customers()).is_empty());
    }

    #[test]
    fn test_usable_values_and_key() {
        let deleted = EntitySnapshot::deleted("Customers", record(json!({"Id": 4, "Name": "Bob"})));
        assert_eq!(deleted.usable_values().get("Name"), Some(&json!("Bob")));
        assert_eq!(deleted.current_value("Name"), None);
        assert_eq!(deleted.key(&customers()).storage_key(), "[4]");
        assert_eq!(deleted.key(&customers()).to_string(), "Customers[Id=4]");
    }

    #[test]
    fn test_incomplete_key() {
        let key = customers().key_from(&record(json!({"Name": "Nobody"})));
        assert!(key.is_incomplete());
        assert_eq!(key.value("Id"), Some(&Value::Null));
    }

    #[test]
    fn test_change_set_rejects_misfiled_snapshot() {
        let stray = EntitySnapshot::deleted("Customers", record(json!({"Id": 4})));
        let err = ChangeSet::new(vec![stray], vec![], vec![]).unwrap_err();
        assert!(matches!(err, AuditError::UnsupportedState { .. }));
    }

    #[test]
    fn test_change_set_len() {
        let set = ChangeSet::new(
            vec![EntitySnapshot::added("Customers", record(json!({"Id": 1})))],
            vec![],
            vec![],
        )
        .unwrap();
        assert_eq!(set.len(), 1);
        assert!(!set.is_empty());
    }
}
