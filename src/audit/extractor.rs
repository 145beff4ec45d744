//! Per-entity field diffing
//!
//! Turns one mutated entity snapshot into the list of field changes it
//! contributes to the audit record. Pure over the snapshot data.

use crate::models::{EntitySchema, EntitySnapshot, EntityState};

use super::entry::FieldChange;
use super::options::CaptureOptions;

/// Extracts field-level changes from entity snapshots
pub struct EntityDiffExtractor<'a> {
    options: &'a CaptureOptions,
}

impl<'a> EntityDiffExtractor<'a> {
    pub fn new(options: &'a CaptureOptions) -> Self {
        Self { options }
    }

    /// Field changes for one entity, or `None` when the entity should be left
    /// out of the audit record entirely
    ///
    /// - Added: every declared field, no old value.
    /// - Deleted: every declared field, no new value.
    /// - Modified: the changed fields, then key fields, then label fields;
    ///   key and label fields are reported even when unchanged. An entity whose
    ///   changes are all on ignored fields is skipped.
    /// - Unchanged and Detached entities contribute nothing.
    pub fn extract(
        &self,
        snapshot: &EntitySnapshot,
        schema: &EntitySchema,
    ) -> Option<Vec<FieldChange>> {
        match snapshot.state {
            EntityState::Added => Some(
                schema
                    .fields
                    .iter()
                    .map(|f| FieldChange::added(f.as_str(), snapshot.current.get(f).cloned()))
                    .collect(),
            ),
            EntityState::Deleted => Some(
                schema
                    .fields
                    .iter()
                    .map(|f| FieldChange::deleted(f.as_str(), snapshot.original.get(f).cloned()))
                    .collect(),
            ),
            EntityState::Modified => {
                let changed = snapshot.changed_fields(schema);
                if self.housekeeping_only(&changed) {
                    return None;
                }

                let mut fields: Vec<&String> = Vec::new();
                for field in changed
                    .iter()
                    .chain(&schema.key_fields)
                    .chain(&schema.label_fields)
                {
                    if !fields.contains(&field) {
                        fields.push(field);
                    }
                }

                Some(
                    fields
                        .into_iter()
                        .map(|f| {
                            FieldChange::new(
                                f.as_str(),
                                snapshot.original.get(f).cloned(),
                                snapshot.current.get(f).cloned(),
                            )
                        })
                        .collect(),
                )
            }
            EntityState::Unchanged | EntityState::Detached => None,
        }
    }

    /// Whether a non-empty set of changed fields touches only ignored fields
    pub fn housekeeping_only(&self, changed: &[String]) -> bool {
        !changed.is_empty() && changed.iter().all(|f| self.options.is_ignored(f))
    }
}
