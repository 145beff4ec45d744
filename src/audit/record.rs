//! Audit records and the audit table row
//!
//! A [`TransactionAuditRecord`] is what one transaction produces: the encoded
//! detail, who made the change and when. It becomes a single INSERT into the
//! configured log table, prepended to the first data-mutating command.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AuditResult;
use crate::interception::{Parameter, Statement, WriteOp};
use crate::models::{ContextId, HistoryId};

use super::codec::AuditRecordCodec;
use super::entry::TransactionDiffEntry;

/// Location of the audit table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogTable {
    pub schema: String,
    pub name: String,
}

impl LogTable {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// `[schema].[name]`
    pub fn qualified_name(&self) -> String {
        format!("[{}].[{}]", self.schema, self.name)
    }

    /// Parameterised insert for one audit row
    pub fn insert_sql(&self) -> String {
        format!(
            "INSERT INTO {}([TransactionDetail],[ChangingUser],[TransactionDate]) \
             SELECT @TransactionDetail,@ChangingUser,@TransactionDate;",
            self.qualified_name()
        )
    }
}

impl Default for LogTable {
    fn default() -> Self {
        Self::new("test", "TransactionHistory")
    }
}

/// The audit record for one committed transaction
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionAuditRecord {
    pub context: ContextId,
    pub entries: Vec<TransactionDiffEntry>,
    /// Encoded `entries`, as stored in the `TransactionDetail` column
    pub detail: String,
    pub changing_user: String,
    pub transaction_date: DateTime<Utc>,
}

impl TransactionAuditRecord {
    /// Encode `entries` and stamp them with the user and the current time
    pub fn new(
        context: ContextId,
        entries: Vec<TransactionDiffEntry>,
        changing_user: impl Into<String>,
    ) -> AuditResult<Self> {
        let detail = AuditRecordCodec::encode(&entries)?;
        Ok(Self {
            context,
            entries,
            detail,
            changing_user: changing_user.into(),
            transaction_date: Utc::now(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Row this record becomes once inserted
    pub fn to_row(&self) -> HistoryRow {
        HistoryRow {
            id: HistoryId::new(),
            transaction_detail: self.detail.clone(),
            changing_user: self.changing_user.clone(),
            transaction_date: self.transaction_date,
        }
    }

    /// Insert statement for `table`, carrying the three named parameters
    pub fn to_statement(&self, table: &LogTable) -> Statement {
        Statement {
            sql: table.insert_sql(),
            parameters: vec![
                Parameter::new("@TransactionDetail", Value::String(self.detail.clone())),
                Parameter::new("@ChangingUser", Value::String(self.changing_user.clone())),
                Parameter::new(
                    "@TransactionDate",
                    Value::String(self.transaction_date.to_rfc3339()),
                ),
            ],
            write: Some(WriteOp::AppendHistory(self.to_row())),
        }
    }
}

/// One row of the audit table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HistoryRow {
    pub id: HistoryId,
    pub transaction_detail: String,
    pub changing_user: String,
    pub transaction_date: DateTime<Utc>,
}

impl HistoryRow {
    /// Decoded entries of this row, in encounter order
    pub fn entries(&self) -> AuditResult<Vec<TransactionDiffEntry>> {
        AuditRecordCodec::decode(&self.transaction_detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::entry::{EntryIndex, FieldChange};
    use serde_json::json;

    fn record() -> TransactionAuditRecord {
        let entries = vec![TransactionDiffEntry::new(
            EntryIndex::new(0, "Orders"),
            FieldChange::new("Status", Some(json!("Open")), Some(json!("Closed"))),
        )];
        TransactionAuditRecord::new(ContextId::new(), entries, "alice").unwrap()
    }

    #[test]
    fn test_insert_sql() {
        let table = LogTable::default();
        assert_eq!(
            table.insert_sql(),
            "INSERT INTO [test].[TransactionHistory]([TransactionDetail],[ChangingUser],[TransactionDate]) \
             SELECT @TransactionDetail,@ChangingUser,@TransactionDate;"
        );
    }

    #[test]
    fn test_record_encodes_detail() {
        let record = record();
        assert_eq!(record.detail, r#"[["0.Orders.Status","Open","Closed"]]"#);
        assert!(!record.is_empty());
    }

    #[test]
    fn test_statement_parameters() {
        let record = record();
        let statement = record.to_statement(&LogTable::new("audit", "Changes"));

        assert!(statement.sql.starts_with("INSERT INTO [audit].[Changes]"));
        let names: Vec<&str> = statement.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["@TransactionDetail", "@ChangingUser", "@TransactionDate"]);
        assert_eq!(statement.parameters[1].value, json!("alice"));

        match statement.write {
            Some(WriteOp::AppendHistory(row)) => {
                assert_eq!(row.transaction_detail, record.detail);
                assert_eq!(row.transaction_date, record.transaction_date);
            }
            other => panic!("unexpected write: {:?}", other),
        }
    }

    #[test]
    fn test_row_serializes_with_column_names() {
        let row = record().to_row();
        let json = serde_json::to_value(&row).unwrap();
        assert!(json.get("TransactionDetail").is_some());
        assert!(json.get("ChangingUser").is_some());
        assert_eq!(row.entries().unwrap().len(), 1);
    }
}
