//! `history`, `show` and `decode` commands
//!
//! Read-only views of the audit table.

use crate::audit::{format_entries, AuditLog, AuditRecordCodec};
use crate::config::paths::TxHistoryPaths;
use crate::display::{format_history_details, format_history_list};
use crate::error::AuditResult;

/// Handle `txhistory history`
pub fn handle_history_command(paths: &TxHistoryPaths, limit: Option<usize>) -> AuditResult<()> {
    let log = AuditLog::new(paths.history_log());
    let rows = match limit {
        Some(count) => log.read_recent(count)?,
        None => log.read_all()?,
    };

    print!("{}", format_history_list(&rows));
    if rows.is_empty() {
        println!();
    }
    Ok(())
}

/// Handle `txhistory show <id>`
pub fn handle_show_command(paths: &TxHistoryPaths, id: &str) -> AuditResult<()> {
    let row = AuditLog::new(paths.history_log()).find(id)?;
    print!("{}", format_history_details(&row));
    Ok(())
}

/// Handle `txhistory decode <detail>`
pub fn handle_decode_command(detail: &str) -> AuditResult<()> {
    let entries = AuditRecordCodec::decode(detail)?;
    if entries.is_empty() {
        println!("(no field changes)");
    }
    for line in format_entries(&entries) {
        println!("{}", line);
    }
    Ok(())
}
