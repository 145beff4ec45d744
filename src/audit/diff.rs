//! Human-readable rendering of audit entries
//!
//! Turns decoded entries into lines such as
//! `0.Orders.Status: "Open" -> "Closed"` for terminal output.

use std::collections::BTreeMap;

use serde_json::Value;

use super::entry::TransactionDiffEntry;

const MAX_STRING_CHARS: usize = 50;

/// Render one entry as `<path>: <old> -> <new>`
///
/// Absent values print as `(none)`.
pub fn format_entry(entry: &TransactionDiffEntry) -> String {
    format!(
        "{}: {} -> {}",
        entry.path(),
        format_optional(&entry.old_value),
        format_optional(&entry.new_value)
    )
}

/// Render all entries, one line each, in the given order
pub fn format_entries(entries: &[TransactionDiffEntry]) -> Vec<String> {
    entries.iter().map(format_entry).collect()
}

/// Short description such as `Customers x1, Orders x2`
///
/// Counts distinct entity indexes per entity set.
pub fn summarize_entries(entries: &[TransactionDiffEntry]) -> String {
    let mut ordinals: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for entry in entries {
        let seen = ordinals.entry(entry.index.entity_set.as_str()).or_default();
        if !seen.contains(&entry.index.ordinal) {
            seen.push(entry.index.ordinal);
        }
    }

    if ordinals.is_empty() {
        return "no changes".to_string();
    }

    ordinals
        .iter()
        .map(|(set, seen)| format!("{} x{}", set, seen.len()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_optional(value: &Option<Value>) -> String {
    match value {
        Some(v) => format_value(v),
        None => "(none)".to_string(),
    }
}

/// Format a JSON value for human-readable display
fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => {
            // Truncate long strings
            if s.chars().count() > MAX_STRING_CHARS {
                let head: String = s.chars().take(MAX_STRING_CHARS - 3).collect();
                format!("\"{}...\"", head)
            } else {
                format!("\"{}\"", s)
            }
        }
        Value::Array(arr) => format!("[{} items]", arr.len()),
        Value::Object(obj) => format!("{{{} fields}}", obj.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::entry::{EntryIndex, FieldChange};
    use serde_json::json;

    fn entry(ordinal: usize, set: &str, change: FieldChange) -> TransactionDiffEntry {
        TransactionDiffEntry::new(EntryIndex::new(ordinal, set), change)
    }

    #[test]
    fn test_modified_line() {
        let line = format_entry(&entry(
            0,
            "Orders",
            FieldChange::new("Status", Some(json!("Open")), Some(json!("Closed"))),
        ));
        assert_eq!(line, "0.Orders.Status: \"Open\" -> \"Closed\"");
    }

    #[test]
    fn test_absent_values() {
        let added = format_entry(&entry(1, "Customers", FieldChange::added("Id", Some(json!(7)))));
        assert_eq!(added, "1.Customers.Id: (none) -> 7");

        let deleted = format_entry(&entry(0, "Orders", FieldChange::deleted("Paid", Some(json!(true)))));
        assert_eq!(deleted, "0.Orders.Paid: true -> (none)");
    }

    #[test]
    fn test_long_string_truncation() {
        let long_string = "é".repeat(100);
        let line = format_entry(&entry(
            0,
            "Orders",
            FieldChange::new("Memo", Some(json!(long_string)), Some(json!("short"))),
        ));
        assert!(line.contains("...\""));
        assert!(line.ends_with("\"short\""));
    }

    #[test]
    fn test_summary_counts_entities() {
        let entries = vec![
            entry(0, "Orders", FieldChange::added("Id", Some(json!(1)))),
            entry(0, "Orders", FieldChange::added("Total", Some(json!(5)))),
            entry(1, "Orders", FieldChange::added("Id", Some(json!(2)))),
            entry(0, "Customers", FieldChange::deleted("Id", Some(json!(9)))),
        ];
        assert_eq!(summarize_entries(&entries), "Customers x1, Orders x2");
        assert_eq!(summarize_entries(&[]), "no changes");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&json!(null)), "null");
        assert_eq!(format_value(&json!(42)), "42");
        assert_eq!(format_value(&json!("test")), "\"test\"");
        assert_eq!(format_value(&json!([1, 2, 3])), "[3 items]");
        assert_eq!(format_value(&json!({"a": 1, "b": 2})), "{2 fields}");
    }
}
