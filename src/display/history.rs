//! Audit history display formatting
//!
//! Formats audit rows for terminal output in table and detail views.

use crate::audit::{format_entries, summarize_entries, HistoryRow, TransactionAuditRecord};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format audit rows as a table, oldest first
pub fn format_history_list(rows: &[HistoryRow]) -> String {
    if rows.is_empty() {
        return "No audit history found.".to_string();
    }

    let user_width = rows
        .iter()
        .map(|r| r.changing_user.len())
        .max()
        .unwrap_or(4)
        .max(4);

    let mut output = String::new();
    output.push_str(&format!(
        "{:<12}  {:<19}  {:<user_width$}  {:>7}  {}\n",
        "ID",
        "Date (UTC)",
        "User",
        "Entries",
        "Changes",
        user_width = user_width,
    ));

    output.push_str(&format!(
        "{:-<12}  {:-<19}  {:-<user_width$}  {:->7}  {:-<20}\n",
        "",
        "",
        "",
        "",
        "",
        user_width = user_width,
    ));

    for row in rows {
        // A row we cannot decode is still listed
        let (count, summary) = match row.entries() {
            Ok(entries) => (entries.len().to_string(), summarize_entries(&entries)),
            Err(_) => ("?".to_string(), "(unreadable detail)".to_string()),
        };

        output.push_str(&format!(
            "{:<12}  {:<19}  {:<user_width$}  {:>7}  {}\n",
            row.id.to_string(),
            row.transaction_date.format(DATE_FORMAT).to_string(),
            row.changing_user,
            count,
            summary,
            user_width = user_width,
        ));
    }

    output.push_str(&format!("\n{} transaction(s)\n", rows.len()));
    output
}

/// Format one audit row with its decoded entries
pub fn format_history_details(row: &HistoryRow) -> String {
    let mut output = String::new();
    output.push_str(&format!("Transaction: {}\n", row.id));
    output.push_str(&format!(
        "Date:        {}\n",
        row.transaction_date.format(DATE_FORMAT)
    ));
    output.push_str(&format!("User:        {}\n", row.changing_user));
    output.push('\n');

    match row.entries() {
        Ok(entries) if entries.is_empty() => output.push_str("  (no field changes)\n"),
        Ok(entries) => {
            for line in format_entries(&entries) {
                output.push_str(&format!("  {}\n", line));
            }
        }
        Err(err) => {
            output.push_str(&format!("  Could not decode detail: {}\n", err));
            output.push_str(&format!("  Raw: {}\n", row.transaction_detail));
        }
    }

    output
}

/// Format a freshly attached record, as printed after `apply`
pub fn format_audit_record(record: &TransactionAuditRecord) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "Audit record for {} by {} ({})\n",
        record.context,
        record.changing_user,
        summarize_entries(&record.entries)
    ));
    for line in format_entries(&record.entries) {
        output.push_str(&format!("  {}\n", line));
    }
    output.push_str(&format!("TransactionDetail: {}\n", record.detail));
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{EntryIndex, FieldChange, TransactionDiffEntry};
    use crate::models::ContextId;
    use serde_json::json;

    fn record() -> TransactionAuditRecord {
        let entries = vec![
            TransactionDiffEntry::new(
                EntryIndex::new(0, "Orders"),
                FieldChange::new("Status", Some(json!("Open")), Some(json!("Closed"))),
            ),
            TransactionDiffEntry::new(
                EntryIndex::new(0, "Orders"),
                FieldChange::new("Id", Some(json!(3)), Some(json!(3))),
            ),
        ];
        TransactionAuditRecord::new(ContextId::new(), entries, "alice").unwrap()
    }

    #[test]
    fn test_empty_list() {
        assert_eq!(format_history_list(&[]), "No audit history found.");
    }

    #[test]
    fn test_list_shows_user_and_summary() {
        let output = format_history_list(&[record().to_row()]);
        assert!(output.contains("alice"));
        assert!(output.contains("Orders x1"));
        assert!(output.contains("1 transaction(s)"));
    }

    #[test]
    fn test_details_decode_entries() {
        let output = format_history_details(&record().to_row());
        assert!(output.contains("0.Orders.Status: \"Open\" -> \"Closed\""));
        assert!(output.contains("User:        alice"));
    }

    #[test]
    fn test_details_with_bad_detail() {
        let mut row = record().to_row();
        row.transaction_detail = "garbage".into();
        let output = format_history_details(&row);
        assert!(output.contains("Could not decode detail"));
        assert!(output.contains("Raw: garbage"));
    }

    #[test]
    fn test_record_output_includes_wire_detail() {
        let record = record();
        let output = format_audit_record(&record);
        assert!(output.contains(&record.detail));
        assert!(output.contains("0.Orders.Id: 3 -> 3"));
    }
}
