//! Entity-type schema descriptors
//!
//! Each entity set is described once, up front: its fields in declaration
//! order, its identity key, the fields that label it for humans, and the
//! foreign-key relationships it can navigate. The capture engine reads these
//! descriptors instead of inspecting entity types at runtime.
//!
//! Descriptors are loaded from a JSON or YAML file:
//!
//! ```yaml
//! entity_sets:
//!   - entity_set: Customers
//!     fields: [Id, Name]
//!     key_fields: [Id]
//!     label_fields: [Name]
//!   - entity_set: Orders
//!     fields: [Id, CustomerId, Status]
//!     key_fields: [Id]
//!     relationships:
//!       - name: Customer
//!         target_set: Customers
//!         foreign_keys:
//!           - { field: CustomerId, target_field: Id }
//! ```

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::snapshot::{EntityKey, Record};
use crate::error::{AuditError, AuditResult};

/// Cardinality of the far end of a relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Multiplicity {
    /// Single-valued foreign-key reference
    #[default]
    One,
    /// Collection-valued navigation; never resolved to a label
    Many,
}

/// One column of a foreign key and the target key column it points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub field: String,
    pub target_field: String,
}

/// A navigable relationship from one entity set to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipDescriptor {
    /// Navigation name, used in diagnostics
    pub name: String,

    /// Entity set at the far end
    pub target_set: String,

    /// Local foreign-key columns (empty for collection navigations)
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,

    #[serde(default)]
    pub multiplicity: Multiplicity,
}

impl RelationshipDescriptor {
    /// Create a single-valued reference through the given foreign-key columns
    pub fn reference(
        name: impl Into<String>,
        target_set: impl Into<String>,
        foreign_keys: &[(&str, &str)],
    ) -> Self {
        Self {
            name: name.into(),
            target_set: target_set.into(),
            foreign_keys: foreign_keys
                .iter()
                .map(|(field, target_field)| ForeignKey {
                    field: field.to_string(),
                    target_field: target_field.to_string(),
                })
                .collect(),
            multiplicity: Multiplicity::One,
        }
    }

    /// Create a collection navigation
    pub fn collection(name: impl Into<String>, target_set: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target_set: target_set.into(),
            foreign_keys: Vec::new(),
            multiplicity: Multiplicity::Many,
        }
    }

    /// Whether this is a single-valued foreign-key reference
    pub fn is_reference(&self) -> bool {
        self.multiplicity == Multiplicity::One
    }

    /// Whether any of the foreign-key columns is among `fields`
    pub fn touches(&self, fields: &[String]) -> bool {
        self.foreign_keys
            .iter()
            .any(|fk| fields.iter().any(|f| f == &fk.field))
    }
}

/// Descriptor of one entity set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySchema {
    pub entity_set: String,

    /// Declared fields, in declaration order
    pub fields: Vec<String>,

    /// Identity key fields
    pub key_fields: Vec<String>,

    /// Fields that give the entity a human-readable name
    #[serde(default)]
    pub label_fields: Vec<String>,

    #[serde(default)]
    pub relationships: Vec<RelationshipDescriptor>,
}

impl EntitySchema {
    /// Create a descriptor with no labels or relationships
    pub fn new(entity_set: impl Into<String>, fields: &[&str], key_fields: &[&str]) -> Self {
        Self {
            entity_set: entity_set.into(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            key_fields: key_fields.iter().map(|f| f.to_string()).collect(),
            label_fields: Vec::new(),
            relationships: Vec::new(),
        }
    }

    /// Mark fields as label fields
    pub fn with_labels(mut self, label_fields: &[&str]) -> Self {
        self.label_fields = label_fields.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Add a navigable relationship
    pub fn with_relationship(mut self, relationship: RelationshipDescriptor) -> Self {
        self.relationships.push(relationship);
        self
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    pub fn is_key(&self, field: &str) -> bool {
        self.key_fields.iter().any(|f| f == field)
    }

    pub fn is_label(&self, field: &str) -> bool {
        self.label_fields.iter().any(|f| f == field)
    }

    /// Build this entity's identity key from a record
    ///
    /// Missing key values become null, which makes the key incomplete.
    pub fn key_from(&self, record: &Record) -> EntityKey {
        EntityKey::new(
            self.entity_set.clone(),
            self.key_fields
                .iter()
                .map(|f| (f.clone(), record.get(f).cloned().unwrap_or_default()))
                .collect(),
        )
    }

    fn validate(&self) -> AuditResult<()> {
        if self.entity_set.trim().is_empty() {
            return Err(AuditError::Schema("Entity set name cannot be empty".into()));
        }
        if self.fields.is_empty() {
            return Err(AuditError::Schema(format!(
                "{} declares no fields",
                self.entity_set
            )));
        }
        if self.key_fields.is_empty() {
            return Err(AuditError::Schema(format!(
                "{} declares no key fields",
                self.entity_set
            )));
        }
        let undeclared = self
            .key_fields
            .iter()
            .chain(&self.label_fields)
            .chain(self.relationships.iter().flat_map(|r| r.foreign_keys.iter().map(|fk| &fk.field)))
            .find(|f| !self.has_field(f));
        if let Some(field) = undeclared {
            return Err(AuditError::Schema(format!(
                "{} references undeclared field '{}'",
                self.entity_set, field
            )));
        }
        Ok(())
    }
}

/// On-disk shape of a schema file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaFile {
    #[serde(default)]
    pub entity_sets: Vec<EntitySchema>,
}

/// Validated lookup from entity-set name to its descriptor
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: Vec<EntitySchema>,
    by_name: HashMap<String, usize>,
}

impl SchemaRegistry {
    /// Build a registry, checking every descriptor and every relationship target
    pub fn new(schemas: Vec<EntitySchema>) -> AuditResult<Self> {
        let mut by_name = HashMap::with_capacity(schemas.len());
        for (i, schema) in schemas.iter().enumerate() {
            schema.validate()?;
            if by_name.insert(schema.entity_set.clone(), i).is_some() {
                return Err(AuditError::Schema(format!(
                    "Entity set '{}' is declared twice",
                    schema.entity_set
                )));
            }
        }

        let registry = Self { schemas, by_name };
        for schema in &registry.schemas {
            for relationship in &schema.relationships {
                registry.validate_relationship(schema, relationship)?;
            }
        }
        Ok(registry)
    }

    fn validate_relationship(
        &self,
        schema: &EntitySchema,
        relationship: &RelationshipDescriptor,
    ) -> AuditResult<()> {
        let target = self.get(&relationship.target_set).ok_or_else(|| {
            AuditError::Schema(format!(
                "{}.{} targets unknown entity set '{}'",
                schema.entity_set, relationship.name, relationship.target_set
            ))
        })?;

        if !relationship.is_reference() {
            return Ok(());
        }

        let covered: BTreeSet<&str> = relationship
            .foreign_keys
            .iter()
            .map(|fk| fk.target_field.as_str())
            .collect();
        let expected: BTreeSet<&str> = target.key_fields.iter().map(String::as_str).collect();
        if covered != expected || relationship.foreign_keys.len() != expected.len() {
            return Err(AuditError::Schema(format!(
                "{}.{} must map exactly the key fields of {}",
                schema.entity_set, relationship.name, target.entity_set
            )));
        }
        Ok(())
    }

    /// Load descriptors from a `.json`, `.yaml` or `.yml` file
    pub fn load(path: &Path) -> AuditResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AuditError::Io(format!("Failed to read schema file {}: {}", path.display(), e))
        })?;

        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let file: SchemaFile = if is_yaml {
            serde_yaml::from_str(&contents).map_err(|e| {
                AuditError::Schema(format!("Failed to parse {}: {}", path.display(), e))
            })?
        } else {
            serde_json::from_str(&contents).map_err(|e| {
                AuditError::Schema(format!("Failed to parse {}: {}", path.display(), e))
            })?
        };

        Self::new(file.entity_sets)
    }

    /// Load descriptors, or an empty registry when the file does not exist
    pub fn load_or_empty(path: &Path) -> AuditResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn get(&self, entity_set: &str) -> Option<&EntitySchema> {
        self.by_name.get(entity_set).map(|&i| &self.schemas[i])
    }

    /// Look up a descriptor, failing for unknown entity sets
    pub fn require(&self, entity_set: &str) -> AuditResult<&EntitySchema> {
        self.get(entity_set)
            .ok_or_else(|| AuditError::Schema(format!("Unknown entity set '{}'", entity_set)))
    }

    /// Key of the entity a reference points at, read from `record`'s foreign-key columns
    ///
    /// Members are ordered like the target's key fields so the result compares
    /// equal to keys built from target records.
    pub fn reference_key(
        &self,
        relationship: &RelationshipDescriptor,
        record: &Record,
    ) -> AuditResult<EntityKey> {
        let target = self.require(&relationship.target_set)?;
        let members = target
            .key_fields
            .iter()
            .map(|key_field| {
                let value = relationship
                    .foreign_keys
                    .iter()
                    .find(|fk| &fk.target_field == key_field)
                    .and_then(|fk| record.get(&fk.field))
                    .cloned()
                    .unwrap_or_default();
                (key_field.clone(), value)
            })
            .collect();
        Ok(EntityKey::new(target.entity_set.clone(), members))
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntitySchema> {
        self.schemas.iter()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
