//! Audit entry data structures
//!
//! Defines the field-level change produced for one entity and the indexed
//! entry that lands in a transaction's audit record.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AuditError;

/// A single field's before/after values on one entity
///
/// `None` means the value is absent: no old value for added entities, no new
/// value for deleted ones. A JSON null is treated as absent too, so a change
/// reads the same after a trip through the wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

impl FieldChange {
    pub fn new(field: impl Into<String>, old_value: Option<Value>, new_value: Option<Value>) -> Self {
        Self {
            field: field.into(),
            old_value: old_value.filter(|v| !v.is_null()),
            new_value: new_value.filter(|v| !v.is_null()),
        }
    }

    /// Change for a field of a newly added entity
    pub fn added(field: impl Into<String>, new_value: Option<Value>) -> Self {
        Self::new(field, None, new_value)
    }

    /// Change for a field of a deleted entity
    pub fn deleted(field: impl Into<String>, old_value: Option<Value>) -> Self {
        Self::new(field, old_value, None)
    }

    /// Key used to detect repeated (field, old, new) tuples
    pub(crate) fn identity(&self) -> String {
        fn render(value: &Option<Value>) -> String {
            match value {
                Some(v) => v.to_string(),
                None => "-".to_string(),
            }
        }
        format!(
            "{}\u{1f}{}\u{1f}{}",
            self.field,
            render(&self.old_value),
            render(&self.new_value)
        )
    }
}

/// All changes produced for one entity, tagged with its entity set
#[derive(Debug, Clone, PartialEq)]
pub struct EntityChanges {
    pub entity_set: String,
    pub changes: Vec<FieldChange>,
}

/// Position of an entity within its entity set's changes in one transaction
///
/// Renders as `<ordinal>.<entitySet>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryIndex {
    pub ordinal: usize,
    pub entity_set: String,
}

impl EntryIndex {
    pub fn new(ordinal: usize, entity_set: impl Into<String>) -> Self {
        Self {
            ordinal,
            entity_set: entity_set.into(),
        }
    }
}

impl fmt::Display for EntryIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.ordinal, self.entity_set)
    }
}

impl FromStr for EntryIndex {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ordinal, entity_set) = s
            .split_once('.')
            .ok_or_else(|| AuditError::Codec(format!("Malformed entry index '{}'", s)))?;
        let ordinal = ordinal
            .parse()
            .map_err(|_| AuditError::Codec(format!("Malformed ordinal in '{}'", s)))?;
        if entity_set.is_empty() {
            return Err(AuditError::Codec(format!("Missing entity set in '{}'", s)));
        }
        Ok(Self::new(ordinal, entity_set))
    }
}

/// One line of a transaction's audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionDiffEntry {
    pub index: EntryIndex,
    pub field: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

impl TransactionDiffEntry {
    pub fn new(index: EntryIndex, change: FieldChange) -> Self {
        Self {
            index,
            field: change.field,
            old_value: change.old_value,
            new_value: change.new_value,
        }
    }

    /// Full dotted path: `<ordinal>.<entitySet>.<field>`
    pub fn path(&self) -> String {
        format!("{}.{}", self.index, self.field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_is_absent() {
        let change = FieldChange::new("Memo", Some(Value::Null), Some(json!("x")));
        assert_eq!(change.old_value, None);
        assert_eq!(change.new_value, Some(json!("x")));
    }

    #[test]
    fn test_added_and_deleted() {
        let added = FieldChange::added("Name", Some(json!("Ada")));
        assert!(added.old_value.is_none());

        let deleted = FieldChange::deleted("Name", Some(json!("Ada")));
        assert!(deleted.new_value.is_none());
    }

    #[test]
    fn test_identity_distinguishes_absent_and_empty() {
        let absent = FieldChange::new("Name", None, Some(json!("Ada")));
        let empty = FieldChange::new("Name", Some(json!("")), Some(json!("Ada")));
        assert_ne!(absent.identity(), empty.identity());
        assert_eq!(absent.identity(), absent.clone().identity());
    }

    #[test]
    fn test_entry_index_display_and_parse() {
        let index = EntryIndex::new(1, "Orders");
        assert_eq!(index.to_string(), "1.Orders");
        assert_eq!("1.Orders".parse::<EntryIndex>().unwrap(), index);
        assert!("Orders".parse::<EntryIndex>().is_err());
        assert!("x.Orders".parse::<EntryIndex>().is_err());
    }

    #[test]
    fn test_entry_path() {
        let entry = TransactionDiffEntry::new(
            EntryIndex::new(0, "Orders"),
            FieldChange::added("Status", Some(json!("Open"))),
        );
        assert_eq!(entry.path(), "0.Orders.Status");
    }
}
