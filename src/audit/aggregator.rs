//! Transaction-wide diff assembly
//!
//! Walks every added, deleted and modified entity of a unit of work, collects
//! their field and label changes, numbers entities within each entity set,
//! and flattens everything into the ordered entry list of the audit record.

use std::collections::HashSet;

use tracing::{trace, warn};

use crate::error::AuditResult;
use crate::models::{ChangeSet, EntitySnapshot, EntityState, SchemaRegistry};
use crate::storage::PersistenceContext;

use super::entry::{EntityChanges, EntryIndex, FieldChange, TransactionDiffEntry};
use super::extractor::EntityDiffExtractor;
use super::labels::RelationshipLabelResolver;
use super::options::{CaptureOptions, DedupScope};

/// Read the change set of a unit of work from its persistence context
pub fn collect_change_set<C: PersistenceContext + ?Sized>(context: &C) -> AuditResult<ChangeSet> {
    ChangeSet::new(
        context.entries(EntityState::Added)?,
        context.entries(EntityState::Deleted)?,
        context.entries(EntityState::Modified)?,
    )
}

/// Builds the ordered diff of one transaction
pub struct TransactionDiffAggregator<'a> {
    schemas: &'a SchemaRegistry,
    options: &'a CaptureOptions,
}

impl<'a> TransactionDiffAggregator<'a> {
    pub fn new(schemas: &'a SchemaRegistry, options: &'a CaptureOptions) -> Self {
        Self { schemas, options }
    }

    /// Diff entries for the whole change set, in encounter order
    ///
    /// Failures on one entity are logged and skipped; only contract
    /// violations abort the diff.
    pub fn build_diff<C: PersistenceContext + ?Sized>(
        &self,
        change_set: ChangeSet,
        context: &C,
    ) -> AuditResult<Vec<TransactionDiffEntry>> {
        let changes = self.entity_changes(change_set, context)?;
        Ok(self.flatten(changes))
    }

    /// Per-entity changes: added entities first, then deleted, then modified
    pub fn entity_changes<C: PersistenceContext + ?Sized>(
        &self,
        change_set: ChangeSet,
        context: &C,
    ) -> AuditResult<Vec<EntityChanges>> {
        let ChangeSet {
            added,
            deleted,
            modified,
        } = change_set;

        let mut collected = Vec::with_capacity(added.len() + deleted.len() + modified.len());

        for snapshot in added.iter().chain(&deleted) {
            if let Some(changes) = self.capture_entity(snapshot, context)? {
                collected.push(changes);
            }
        }

        for mut snapshot in modified {
            self.refresh_original(&mut snapshot, context)?;
            if let Some(changes) = self.capture_entity(&snapshot, context)? {
                collected.push(changes);
            }
        }

        Ok(collected)
    }

    /// Compare against what the store holds now, not a stale in-memory copy
    fn refresh_original<C: PersistenceContext + ?Sized>(
        &self,
        snapshot: &mut EntitySnapshot,
        context: &C,
    ) -> AuditResult<()> {
        let Some(schema) = self.schemas.get(&snapshot.entity_set) else {
            return Ok(());
        };
        let key = snapshot.key(schema);

        match context.database_values(&key) {
            Ok(Some(values)) => snapshot.refresh_original(values),
            Ok(None) => {
                warn!(key = %key, "Modified entity missing from store, using tracked originals")
            }
            Err(err) if err.is_recoverable() => {
                warn!(key = %key, error = %err, "Could not refresh original values")
            }
            Err(err) => return Err(err),
        }
        Ok(())
    }

    fn capture_entity<C: PersistenceContext + ?Sized>(
        &self,
        snapshot: &EntitySnapshot,
        context: &C,
    ) -> AuditResult<Option<EntityChanges>> {
        let Some(schema) = self.schemas.get(&snapshot.entity_set) else {
            warn!(entity_set = %snapshot.entity_set, "No schema for entity set, not audited");
            return Ok(None);
        };

        let Some(mut changes) = EntityDiffExtractor::new(self.options).extract(snapshot, schema)
        else {
            trace!(entity_set = %snapshot.entity_set, "Housekeeping-only change skipped");
            return Ok(None);
        };

        match RelationshipLabelResolver::new(context, self.schemas).resolve_labels(snapshot, schema)
        {
            Ok(labels) => changes.extend(labels),
            Err(err) if err.is_recoverable() => {
                warn!(
                    entity_set = %snapshot.entity_set,
                    error = %err,
                    "Dropping relationship labels for entity"
                );
            }
            Err(err) => return Err(err),
        }

        Ok(Some(EntityChanges {
            entity_set: snapshot.entity_set.clone(),
            changes,
        }))
    }

    /// Number entities per entity set and flatten to entries
    ///
    /// Ignored fields are dropped, and a (field, old, new) tuple already
    /// emitted is not emitted again. With [`DedupScope::Transaction`] that
    /// holds across the ordinals of one entity set, so two rows of the same
    /// set producing an identical tuple keep only the first. Tuples of
    /// different entity sets never collide.
    pub fn flatten(&self, changes: Vec<EntityChanges>) -> Vec<TransactionDiffEntry> {
        let mut groups: Vec<(String, Vec<Vec<FieldChange>>)> = Vec::new();
        for entity in changes {
            match groups.iter_mut().find(|(set, _)| *set == entity.entity_set) {
                Some((_, members)) => members.push(entity.changes),
                None => groups.push((entity.entity_set, vec![entity.changes])),
            }
        }

        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        for (entity_set, members) in groups {
            for (ordinal, changes) in members.into_iter().enumerate() {
                let index = EntryIndex::new(ordinal, entity_set.as_str());
                for change in changes {
                    if self.options.is_ignored(&change.field) {
                        continue;
                    }
                    let identity = match self.options.dedup_scope {
                        DedupScope::Transaction => {
                            format!("{}\u{1e}{}", entity_set, change.identity())
                        }
                        DedupScope::Entity => format!("{}\u{1e}{}", index, change.identity()),
                    };
                    if seen.insert(identity) {
                        entries.push(TransactionDiffEntry::new(index.clone(), change));
                    }
                }
            }
        }

        entries
    }
}
