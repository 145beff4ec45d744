//! Transaction detail wire format
//!
//! The `TransactionDetail` column holds a compact JSON array of 3-element
//! arrays, newest-touched entry first:
//!
//! ```text
//! [["0.Orders.Status","Open","Closed"],["0.Orders.Id",1,1]]
//! ```
//!
//! Absent values are `null`. Existing audit rows depend on this layout, so it
//! must not change.

use serde_json::Value;

use crate::error::{AuditError, AuditResult};

use super::entry::{EntryIndex, TransactionDiffEntry};

/// Encoder and decoder for the `TransactionDetail` column
pub struct AuditRecordCodec;

impl AuditRecordCodec {
    /// Render entries in reverse order as `[path, old, new]` triples
    pub fn encode(entries: &[TransactionDiffEntry]) -> AuditResult<String> {
        let rows: Vec<(String, &Option<Value>, &Option<Value>)> = entries
            .iter()
            .rev()
            .map(|e| (e.path(), &e.old_value, &e.new_value))
            .collect();

        serde_json::to_string(&rows)
            .map_err(|e| AuditError::Codec(format!("Failed to encode transaction detail: {}", e)))
    }

    /// Parse a stored detail back into entries, restoring encounter order
    pub fn decode(detail: &str) -> AuditResult<Vec<TransactionDiffEntry>> {
        let rows: Vec<(String, Option<Value>, Option<Value>)> = serde_json::from_str(detail)
            .map_err(|e| AuditError::Codec(format!("Failed to parse transaction detail: {}", e)))?;

        let mut entries = rows
            .into_iter()
            .map(|(path, old_value, new_value)| -> AuditResult<TransactionDiffEntry> {
                let (index, field) = path.rsplit_once('.').ok_or_else(|| {
                    AuditError::Codec(format!("Malformed entry path '{}'", path))
                })?;
                Ok(TransactionDiffEntry {
                    index: index.parse::<EntryIndex>()?,
                    field: field.to_string(),
                    old_value: old_value.filter(|v| !v.is_null()),
                    new_value: new_value.filter(|v| !v.is_null()),
                })
            })
            .collect::<AuditResult<Vec<_>>>()?;

        entries.reverse();
        Ok(entries)
    }
}
