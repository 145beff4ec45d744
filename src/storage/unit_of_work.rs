//! Change-tracking unit of work
//!
//! Tracks added, modified and deleted entities against a [`Database`] and
//! saves them as one transaction. Each tracked mutation becomes one command;
//! every command passes through a [`CommandInterceptor`] before the batch
//! executes.

use tracing::debug;

use crate::error::{AuditError, AuditResult};
use crate::interception::{
    dispatch, Command, CommandInterceptor, ExecutionKind, InterceptionContext, Statement,
};
use crate::models::{
    ContextId, EntityKey, EntitySchema, EntitySnapshot, EntityState, Record,
    RelationshipDescriptor, SchemaRegistry,
};

use super::context::PersistenceContext;
use super::database::Database;

/// Pending changes of one transaction
pub struct UnitOfWork<'a> {
    database: &'a Database,
    schemas: &'a SchemaRegistry,
    tracked: Vec<EntitySnapshot>,
}

impl<'a> UnitOfWork<'a> {
    pub fn new(database: &'a Database, schemas: &'a SchemaRegistry) -> Self {
        Self {
            database,
            schemas,
            tracked: Vec::new(),
        }
    }

    /// Track a new entity
    pub fn add(&mut self, entity_set: &str, values: Record) -> AuditResult<()> {
        let schema = self.schemas.require(entity_set)?;
        check_fields(schema, &values)?;

        let key = schema.key_from(&values);
        if key.is_incomplete() {
            return Err(AuditError::Validation(format!(
                "{} needs a value for every key field",
                key
            )));
        }
        if self.position(schema, &key).is_some() || self.database.get(&key)?.is_some() {
            return Err(AuditError::Validation(format!("{} already exists", key)));
        }

        self.tracked.push(EntitySnapshot::added(entity_set, values));
        Ok(())
    }

    /// Change fields of a stored or tracked entity
    ///
    /// `values` must hold the key fields plus the fields to change.
    pub fn modify(&mut self, entity_set: &str, values: Record) -> AuditResult<()> {
        let schema = self.schemas.require(entity_set)?;
        check_fields(schema, &values)?;
        let key = complete_key(schema, &values)?;
        require_change(schema, &key, &values)?;

        if let Some(index) = self.position(schema, &key) {
            let tracked = &mut self.tracked[index];
            if tracked.state == EntityState::Deleted {
                return Err(AuditError::Validation(format!("{} is being deleted", key)));
            }
            merge(&mut tracked.current, values);
            return Ok(());
        }

        let original = self
            .database
            .get(&key)?
            .ok_or_else(|| AuditError::entity_not_found(entity_set, key.to_string()))?;
        let mut current = original.clone();
        merge(&mut current, values);

        self.tracked
            .push(EntitySnapshot::modified(entity_set, original, current));
        Ok(())
    }

    /// Track a modification against originals the caller read earlier
    ///
    /// The originals may be stale; the capture refreshes them from the store.
    pub fn attach_modified(
        &mut self,
        entity_set: &str,
        original: Record,
        current: Record,
    ) -> AuditResult<()> {
        let schema = self.schemas.require(entity_set)?;
        check_fields(schema, &original)?;
        check_fields(schema, &current)?;
        let key = complete_key(schema, &current)?;
        require_change(schema, &key, &current)?;
        if self.position(schema, &key).is_some() {
            return Err(AuditError::Validation(format!("{} is already tracked", key)));
        }

        self.tracked
            .push(EntitySnapshot::modified(entity_set, original, current));
        Ok(())
    }

    /// Mark a stored entity for deletion; an added one is simply dropped
    pub fn delete(&mut self, entity_set: &str, key_values: Record) -> AuditResult<()> {
        let schema = self.schemas.require(entity_set)?;
        let key = complete_key(schema, &key_values)?;

        if let Some(index) = self.position(schema, &key) {
            let tracked = self.tracked.remove(index);
            match tracked.state {
                EntityState::Added => return Ok(()),
                EntityState::Deleted => {
                    return Err(AuditError::Validation(format!("{} is already deleted", key)))
                }
                _ => {
                    self.tracked
                        .push(EntitySnapshot::deleted(entity_set, tracked.original));
                    return Ok(());
                }
            }
        }

        let original = self
            .database
            .get(&key)?
            .ok_or_else(|| AuditError::entity_not_found(entity_set, key.to_string()))?;
        self.tracked.push(EntitySnapshot::deleted(entity_set, original));
        Ok(())
    }

    pub fn has_changes(&self) -> bool {
        !self.tracked.is_empty()
    }

    pub fn tracked(&self) -> &[EntitySnapshot] {
        &self.tracked
    }

    /// Save all tracked changes as one transaction
    ///
    /// Every command goes through `interceptor` first; an interceptor error
    /// aborts the save before anything is written. Tracked changes are kept
    /// when the save fails.
    pub fn save_changes(
        &mut self,
        interceptor: &mut dyn CommandInterceptor,
    ) -> AuditResult<ContextId> {
        let transaction = ContextId::new();
        if self.tracked.is_empty() {
            return Ok(transaction);
        }

        let mut commands = self.commands()?;
        {
            let context = InterceptionContext {
                transaction,
                persistence: &*self,
            };
            for command in commands.iter_mut() {
                dispatch(interceptor, command, &context)?;
            }
        }

        let written = self.database.execute(&commands)?;
        debug!(context = %transaction, commands = commands.len(), statements = written, "Saved unit of work");

        self.tracked.clear();
        Ok(transaction)
    }

    fn commands(&self) -> AuditResult<Vec<Command>> {
        self.tracked
            .iter()
            .map(|snapshot| {
                let schema = self.schemas.require(&snapshot.entity_set)?;
                let key = snapshot.key(schema);
                Ok(match snapshot.state {
                    EntityState::Added => Command::new(
                        ExecutionKind::Reader,
                        Statement::insert(schema, snapshot.current.clone()),
                    ),
                    EntityState::Modified => Command::new(
                        ExecutionKind::NonQuery,
                        Statement::update(schema, key, snapshot.current.clone()),
                    ),
                    EntityState::Deleted => {
                        Command::new(ExecutionKind::NonQuery, Statement::delete(schema, key))
                    }
                    other => {
                        return Err(AuditError::UnsupportedState {
                            entity_set: snapshot.entity_set.clone(),
                            state: other.to_string(),
                        })
                    }
                })
            })
            .collect()
    }

    fn position(&self, schema: &EntitySchema, key: &EntityKey) -> Option<usize> {
        self.tracked
            .iter()
            .position(|s| s.entity_set == schema.entity_set && &s.key(schema) == key)
    }
}

impl PersistenceContext for UnitOfWork<'_> {
    fn entries(&self, state: EntityState) -> AuditResult<Vec<EntitySnapshot>> {
        Ok(self
            .tracked
            .iter()
            .filter(|s| s.state == state)
            .cloned()
            .collect())
    }

    fn database_values(&self, key: &EntityKey) -> AuditResult<Option<Record>> {
        self.database.get(key)
    }

    fn find_by_key(&self, key: &EntityKey) -> AuditResult<Option<Record>> {
        if key.is_incomplete() {
            return Ok(None);
        }
        if let Some(schema) = self.schemas.get(&key.entity_set) {
            if let Some(index) = self.position(schema, key) {
                return Ok(Some(self.tracked[index].usable_values().clone()));
            }
        }
        self.database.get(key)
    }

    fn load_reference(
        &self,
        snapshot: &EntitySnapshot,
        relationship: &RelationshipDescriptor,
    ) -> AuditResult<Option<Record>> {
        let key = self
            .schemas
            .reference_key(relationship, snapshot.usable_values())?;
        match self.find_by_key(&key)? {
            Some(record) => Ok(Some(record)),
            None if key.is_incomplete() => Ok(None),
            None => Err(AuditError::LookupFailure {
                entity_set: key.entity_set.clone(),
                key: key.storage_key(),
            }),
        }
    }
}

fn check_fields(schema: &EntitySchema, values: &Record) -> AuditResult<()> {
    match values.keys().find(|field| !schema.has_field(field)) {
        Some(field) => Err(AuditError::Validation(format!(
            "{} has no field '{}'",
            schema.entity_set, field
        ))),
        None => Ok(()),
    }
}

fn complete_key(schema: &EntitySchema, values: &Record) -> AuditResult<EntityKey> {
    let key = schema.key_from(values);
    if key.is_incomplete() {
        return Err(AuditError::Validation(format!(
            "{} needs a value for every key field",
            key
        )));
    }
    Ok(key)
}

fn require_change(schema: &EntitySchema, key: &EntityKey, values: &Record) -> AuditResult<()> {
    if values.keys().any(|field| !schema.is_key(field)) {
        Ok(())
    } else {
        Err(AuditError::Validation(format!("{} has no fields to change", key)))
    }
}

fn merge(target: &mut Record, values: Record) {
    for (field, value) in values {
        target.insert(field, value);
    }
}
