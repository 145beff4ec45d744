//! Append-only audit table
//!
//! Stores audit rows as line-delimited JSON (JSONL), one row per line,
//! flushed on every append.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::error::{AuditError, AuditResult};

use super::record::HistoryRow;

/// Reads and appends rows of the audit table
#[derive(Debug, Clone)]
pub struct AuditLog {
    log_path: PathBuf,
}

impl AuditLog {
    pub fn new(log_path: PathBuf) -> Self {
        Self { log_path }
    }

    /// Append rows and flush once at the end
    pub fn append(&self, rows: &[HistoryRow]) -> AuditResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        // Serialize everything first so a bad row never leaves a partial batch
        let mut lines = String::new();
        for row in rows {
            let json = serde_json::to_string(row)
                .map_err(|e| AuditError::Json(format!("Failed to serialize audit row: {}", e)))?;
            lines.push_str(&json);
            lines.push('\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| AuditError::Io(format!("Failed to open audit table: {}", e)))?;

        file.write_all(lines.as_bytes())
            .map_err(|e| AuditError::Io(format!("Failed to write audit row: {}", e)))?;

        file.flush()
            .map_err(|e| AuditError::Io(format!("Failed to flush audit table: {}", e)))?;

        Ok(())
    }

    /// All rows, oldest first
    pub fn read_all(&self) -> AuditResult<Vec<HistoryRow>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.log_path)
            .map_err(|e| AuditError::Io(format!("Failed to open audit table: {}", e)))?;

        let reader = BufReader::new(file);
        let mut rows = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| {
                AuditError::Io(format!("Failed to read audit table line {}: {}", line_num + 1, e))
            })?;

            if line.trim().is_empty() {
                continue;
            }

            let row: HistoryRow = serde_json::from_str(&line).map_err(|e| {
                AuditError::Json(format!(
                    "Failed to parse audit row at line {}: {}",
                    line_num + 1,
                    e
                ))
            })?;

            rows.push(row);
        }

        Ok(rows)
    }

    /// The most recent `count` rows, oldest first
    pub fn read_recent(&self, count: usize) -> AuditResult<Vec<HistoryRow>> {
        let mut rows = self.read_all()?;
        let start = rows.len().saturating_sub(count);
        Ok(rows.split_off(start))
    }

    /// Find a row by full id or by its short display form (`txh-1a2b3c4d`)
    pub fn find(&self, id: &str) -> AuditResult<HistoryRow> {
        let needle = id.strip_prefix("txh-").unwrap_or(id).to_ascii_lowercase();
        if needle.is_empty() {
            return Err(AuditError::history_not_found(id));
        }

        let mut matches = self
            .read_all()?
            .into_iter()
            .filter(|row| row.id.as_uuid().to_string().starts_with(&needle));

        match (matches.next(), matches.next()) {
            (Some(row), None) => Ok(row),
            (Some(_), Some(_)) => Err(AuditError::Validation(format!(
                "History id '{}' is ambiguous",
                id
            ))),
            (None, _) => Err(AuditError::history_not_found(id)),
        }
    }

    pub fn row_count(&self) -> AuditResult<usize> {
        Ok(self.read_all()?.len())
    }

    pub fn exists(&self) -> bool {
        self.log_path.exists()
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::entry::{EntryIndex, FieldChange, TransactionDiffEntry};
    use crate::audit::record::TransactionAuditRecord;
    use crate::models::ContextId;
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_log() -> (AuditLog, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let log = AuditLog::new(temp_dir.path().join("history.jsonl"));
        (log, temp_dir)
    }

    fn row(user: &str) -> HistoryRow {
        let entries = vec![TransactionDiffEntry::new(
            EntryIndex::new(0, "Customers"),
            FieldChange::added("Id", Some(json!(1))),
        )];
        TransactionAuditRecord::new(ContextId::new(), entries, user)
            .unwrap()
            .to_row()
    }

    #[test]
    fn test_append_and_read() {
        let (log, _temp) = create_test_log();
        let written = row("alice");

        log.append(std::slice::from_ref(&written)).unwrap();

        let rows = log.read_all().unwrap();
        assert_eq!(rows, vec![written]);
    }

    #[test]
    fn test_empty_log() {
        let (log, _temp) = create_test_log();

        assert!(!log.exists());
        assert_eq!(log.row_count().unwrap(), 0);
        log.append(&[]).unwrap();
        assert!(!log.exists());
    }

    #[test]
    fn test_read_recent() {
        let (log, _temp) = create_test_log();
        for i in 0..5 {
            log.append(&[row(&format!("user{}", i))]).unwrap();
        }

        let recent = log.read_recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].changing_user, "user3");
        assert_eq!(recent[1].changing_user, "user4");
    }

    #[test]
    fn test_find_by_short_id() {
        let (log, _temp) = create_test_log();
        let written = row("alice");
        log.append(&[written.clone(), row("bob")]).unwrap();

        let found = log.find(&written.id.to_string()).unwrap();
        assert_eq!(found.id, written.id);

        let full = log.find(&written.id.as_uuid().to_string()).unwrap();
        assert_eq!(full.changing_user, "alice");

        assert!(log.find("txh-zzzzzzzz").unwrap_err().is_not_found());
    }

    #[test]
    fn test_survives_reopen() {
        let (log, temp) = create_test_log();
        log.append(&[row("alice")]).unwrap();

        let reopened = AuditLog::new(temp.path().join("history.jsonl"));
        assert_eq!(reopened.row_count().unwrap(), 1);
    }

    #[test]
    fn test_corrupt_line_is_reported() {
        let (log, _temp) = create_test_log();
        std::fs::write(log.path(), "{not json}\n").unwrap();

        match log.read_all() {
            Err(AuditError::Json(msg)) => assert!(msg.contains("line 1")),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
