//! Reference backing store
//!
//! Entity tables keyed by identity key, plus the audit table. Commands are
//! applied all-or-nothing: the audit row commits or rolls back together with
//! the business writes it describes.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::RwLock;

use tracing::{debug, error};

use crate::audit::{AuditLog, HistoryRow};
use crate::config::paths::TxHistoryPaths;
use crate::error::{AuditError, AuditResult};
use crate::interception::{Command, WriteOp};
use crate::models::{EntityKey, Record};

use super::file_io::{load_json, save_json_atomic};

/// Rows of one entity set, by storage key
type Table = BTreeMap<String, Record>;

/// All entity tables, by entity set
type Tables = BTreeMap<String, Table>;

enum HistoryStore {
    Memory(RwLock<Vec<HistoryRow>>),
    File(AuditLog),
}

/// Entity tables and audit table, in memory or on disk
pub struct Database {
    tables_path: Option<PathBuf>,
    tables: RwLock<Tables>,
    history: HistoryStore,
}

impl Database {
    /// Empty store that lives only as long as the value
    pub fn in_memory() -> Self {
        Self {
            tables_path: None,
            tables: RwLock::new(Tables::new()),
            history: HistoryStore::Memory(RwLock::new(Vec::new())),
        }
    }

    /// Open (or start) a file-backed store
    pub fn open(tables_path: PathBuf, history_path: PathBuf) -> AuditResult<Self> {
        let tables: Tables = load_json(&tables_path)?;
        Ok(Self {
            tables_path: Some(tables_path),
            tables: RwLock::new(tables),
            history: HistoryStore::File(AuditLog::new(history_path)),
        })
    }

    pub fn from_paths(paths: &TxHistoryPaths) -> AuditResult<Self> {
        Self::open(paths.tables_file(), paths.history_log())
    }

    /// Row stored under `key`
    pub fn get(&self, key: &EntityKey) -> AuditResult<Option<Record>> {
        let tables = self.tables.read().map_err(|e| {
            AuditError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(tables
            .get(&key.entity_set)
            .and_then(|table| table.get(&key.storage_key()))
            .cloned())
    }

    /// All rows of one entity set, in key order
    pub fn rows(&self, entity_set: &str) -> AuditResult<Vec<Record>> {
        let tables = self.tables.read().map_err(|e| {
            AuditError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(tables
            .get(entity_set)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default())
    }

    /// Audit table rows, oldest first
    pub fn history(&self) -> AuditResult<Vec<HistoryRow>> {
        match &self.history {
            HistoryStore::Memory(rows) => rows
                .read()
                .map(|rows| rows.clone())
                .map_err(|e| AuditError::Storage(format!("Failed to acquire read lock: {}", e))),
            HistoryStore::File(log) => log.read_all(),
        }
    }

    /// Apply every statement of every command, or none of them
    ///
    /// Returns the number of statements that wrote something.
    pub fn execute(&self, commands: &[Command]) -> AuditResult<usize> {
        let mut tables = self.tables.write().map_err(|e| {
            AuditError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        let mut staged = tables.clone();
        let mut appended = Vec::new();
        let mut applied = 0;

        for write in commands
            .iter()
            .flat_map(|c| c.statements())
            .filter_map(|s| s.write.as_ref())
        {
            apply(&mut staged, &mut appended, write)?;
            applied += 1;
        }

        if applied == 0 {
            return Ok(0);
        }

        if let Some(path) = &self.tables_path {
            save_json_atomic(path, &staged)?;
        }
        if let Err(err) = self.append_history(&appended) {
            // Put the previous tables back so nothing is half-committed
            if let Some(path) = &self.tables_path {
                if let Err(restore_err) = save_json_atomic(path, &*tables) {
                    error!(
                        path = %path.display(),
                        error = %restore_err,
                        "Failed to restore tables after audit append failed; file holds uncommitted rows"
                    );
                }
            }
            return Err(err);
        }

        *tables = staged;
        debug!(statements = applied, history_rows = appended.len(), "Committed commands");
        Ok(applied)
    }

    fn append_history(&self, rows: &[HistoryRow]) -> AuditResult<()> {
        match &self.history {
            HistoryStore::Memory(store) => {
                store
                    .write()
                    .map_err(|e| AuditError::Storage(format!("Failed to acquire write lock: {}", e)))?
                    .extend_from_slice(rows);
                Ok(())
            }
            HistoryStore::File(log) => log.append(rows),
        }
    }
}

fn apply(tables: &mut Tables, history: &mut Vec<HistoryRow>, write: &WriteOp) -> AuditResult<()> {
    match write {
        WriteOp::Insert { key, values } => {
            let table = tables.entry(key.entity_set.clone()).or_default();
            let storage_key = key.storage_key();
            if table.contains_key(&storage_key) {
                return Err(AuditError::Storage(format!("Duplicate key {}", key)));
            }
            table.insert(storage_key, values.clone());
        }
        WriteOp::Update { key, values } => {
            let row = tables
                .get_mut(&key.entity_set)
                .and_then(|table| table.get_mut(&key.storage_key()))
                .ok_or_else(|| AuditError::entity_not_found(&key.entity_set, key.to_string()))?;
            for (field, value) in values {
                row.insert(field.clone(), value.clone());
            }
        }
        WriteOp::Delete { key } => {
            tables
                .get_mut(&key.entity_set)
                .and_then(|table| table.remove(&key.storage_key()))
                .ok_or_else(|| AuditError::entity_not_found(&key.entity_set, key.to_string()))?;
        }
        WriteOp::AppendHistory(row) => history.push(row.clone()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{LogTable, TransactionAuditRecord};
    use crate::interception::{ExecutionKind, Statement};
    use crate::models::{ContextId, EntitySchema};
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn customers() -> EntitySchema {
        EntitySchema::new("Customers", &["Id", "Name"], &["Id"])
    }

    fn insert(id: i64, name: &str) -> Command {
        Command::new(
            ExecutionKind::Reader,
            Statement::insert(&customers(), record(json!({"Id": id, "Name": name}))),
        )
    }

    fn key(id: i64) -> EntityKey {
        customers().key_from(&record(json!({"Id": id})))
    }

    #[test]
    fn test_insert_update_delete() {
        let db = Database::in_memory();
        db.execute(&[insert(1, "Ada"), insert(2, "Bob")]).unwrap();
        assert_eq!(db.rows("Customers").unwrap().len(), 2);

        let update = Command::new(
            ExecutionKind::NonQuery,
            Statement::update(&customers(), key(1), record(json!({"Name": "Ada L."}))),
        );
        db.execute(&[update]).unwrap();
        assert_eq!(db.get(&key(1)).unwrap().unwrap()["Name"], json!("Ada L."));

        let delete = Command::new(ExecutionKind::NonQuery, Statement::delete(&customers(), key(2)));
        db.execute(&[delete]).unwrap();
        assert!(db.get(&key(2)).unwrap().is_none());
    }

    #[test]
    fn test_failed_batch_leaves_store_untouched() {
        let db = Database::in_memory();
        db.execute(&[insert(1, "Ada")]).unwrap();

        let mut audited = insert(2, "Bob");
        let audit = TransactionAuditRecord::new(ContextId::new(), Vec::new(), "alice").unwrap();
        audited.prepend(audit.to_statement(&LogTable::default()));

        let err = db.execute(&[audited, insert(1, "Again")]).unwrap_err();
        assert!(matches!(err, AuditError::Storage(_)));
        assert!(db.get(&key(2)).unwrap().is_none());
        assert!(db.history().unwrap().is_empty());
    }

    #[test]
    fn test_history_row_commits_with_writes() {
        let db = Database::in_memory();
        let mut audited = insert(1, "Ada");
        let audit = TransactionAuditRecord::new(ContextId::new(), Vec::new(), "alice").unwrap();
        audited.prepend(audit.to_statement(&LogTable::default()));

        assert_eq!(db.execute(&[audited]).unwrap(), 2);
        let history = db.history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].changing_user, "alice");
    }

    #[test]
    fn test_update_missing_row_is_not_found() {
        let db = Database::in_memory();
        let update = Command::new(
            ExecutionKind::NonQuery,
            Statement::update(&customers(), key(9), record(json!({"Name": "x"}))),
        );
        assert!(db.execute(&[update]).unwrap_err().is_not_found());
    }

    #[test]
    fn test_file_backed_store_persists() {
        let temp_dir = TempDir::new().unwrap();
        let tables = temp_dir.path().join("tables.json");
        let history = temp_dir.path().join("history.jsonl");

        let db = Database::open(tables.clone(), history.clone()).unwrap();
        let mut audited = insert(1, "Ada");
        let audit = TransactionAuditRecord::new(ContextId::new(), Vec::new(), "alice").unwrap();
        audited.prepend(audit.to_statement(&LogTable::default()));
        db.execute(&[audited]).unwrap();

        let reopened = Database::open(tables, history).unwrap();
        assert_eq!(reopened.get(&key(1)).unwrap().unwrap()["Name"], json!("Ada"));
        assert_eq!(reopened.history().unwrap().len(), 1);
    }

    #[test]
    fn test_failed_history_append_restores_tables_file() {
        let temp_dir = TempDir::new().unwrap();
        let tables = temp_dir.path().join("tables.json");

        let db = Database::open(tables.clone(), temp_dir.path().join("history.jsonl")).unwrap();
        db.execute(&[insert(1, "Ada")]).unwrap();

        // A directory where the audit table should be makes every append fail
        let blocked = temp_dir.path().join("blocked");
        std::fs::create_dir(&blocked).unwrap();
        let db = Database::open(tables.clone(), blocked).unwrap();

        let mut audited = insert(2, "Bob");
        let audit = TransactionAuditRecord::new(ContextId::new(), Vec::new(), "alice").unwrap();
        audited.prepend(audit.to_statement(&LogTable::default()));

        let err = db.execute(&[audited]).unwrap_err();
        assert!(matches!(err, AuditError::Io(_)));
        assert!(db.get(&key(2)).unwrap().is_none());

        let reopened = Database::open(tables, temp_dir.path().join("history.jsonl")).unwrap();
        assert_eq!(reopened.rows("Customers").unwrap().len(), 1);
        assert!(reopened.get(&key(2)).unwrap().is_none());
    }
}
