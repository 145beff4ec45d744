//! `apply` command
//!
//! Applies a change request file as one unit of work with audit capture:
//!
//! ```json
//! {
//!   "operations": [
//!     { "op": "add", "entity_set": "Customers", "values": { "Id": 1, "Name": "Ada" } },
//!     { "op": "modify", "entity_set": "Orders", "values": { "Id": 7, "CustomerId": 1 } },
//!     { "op": "delete", "entity_set": "Orders", "key": { "Id": 8 } }
//!   ]
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::audit::{AuditEngine, TransactionAuditRecord};
use crate::config::paths::TxHistoryPaths;
use crate::config::settings::Settings;
use crate::display::format_audit_record;
use crate::error::{AuditError, AuditResult};
use crate::models::{Record, SchemaRegistry};
use crate::storage::{Database, UnitOfWork};

/// One change in a change request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Operation {
    Add { entity_set: String, values: Record },
    Modify { entity_set: String, values: Record },
    Delete { entity_set: String, key: Record },
}

/// Contents of a change request file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeRequest {
    /// Changing user when none is given on the command line
    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub operations: Vec<Operation>,
}

impl ChangeRequest {
    /// Read a `.json`, `.yaml` or `.yml` change request
    pub fn load(path: &Path) -> AuditResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AuditError::Io(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let request: ChangeRequest = if is_yaml {
            serde_yaml::from_str(&contents).map_err(|e| {
                AuditError::Validation(format!("Invalid change request {}: {}", path.display(), e))
            })?
        } else {
            serde_json::from_str(&contents).map_err(|e| {
                AuditError::Validation(format!("Invalid change request {}: {}", path.display(), e))
            })?
        };

        if request.operations.is_empty() {
            return Err(AuditError::Validation(format!(
                "{} contains no operations",
                path.display()
            )));
        }
        Ok(request)
    }
}

/// Apply `request` to `database` and return the attached audit record
pub fn apply_change_request(
    engine: &AuditEngine,
    database: &Database,
    request: ChangeRequest,
    changing_user: &str,
) -> AuditResult<Option<TransactionAuditRecord>> {
    let mut unit_of_work = UnitOfWork::new(database, engine.schemas());

    for operation in request.operations {
        match operation {
            Operation::Add { entity_set, values } => unit_of_work.add(&entity_set, values)?,
            Operation::Modify { entity_set, values } => unit_of_work.modify(&entity_set, values)?,
            Operation::Delete { entity_set, key } => unit_of_work.delete(&entity_set, key)?,
        }
    }

    let mut capture = engine.begin(changing_user);
    unit_of_work.save_changes(&mut capture)?;
    capture.finish()
}

/// Handle `txhistory apply`
pub fn handle_apply_command(
    paths: &TxHistoryPaths,
    settings: &Settings,
    file: &Path,
    user: Option<String>,
) -> AuditResult<()> {
    let request = ChangeRequest::load(file)?;
    let changing_user = user
        .or_else(|| request.user.clone())
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| {
            AuditError::Validation(
                "No changing user: pass --user, set TXHISTORY_USER, or add \"user\" to the request"
                    .into(),
            )
        })?;

    let schemas = SchemaRegistry::load_or_empty(&paths.schema_file())?;
    if schemas.is_empty() {
        return Err(AuditError::Config(format!(
            "No entity sets declared in {}",
            paths.schema_file().display()
        )));
    }

    let engine = AuditEngine::from_settings(schemas, settings);
    let database = Database::from_paths(paths)?;

    match apply_change_request(&engine, &database, request, &changing_user)? {
        Some(record) => print!("{}", format_audit_record(&record)),
        None => println!("No changes to record."),
    }
    Ok(())
}
