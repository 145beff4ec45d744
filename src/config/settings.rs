//! User settings for txhistory
//!
//! Where audit rows go, which fields are left out of them, and how chatty
//! the diagnostic log is.

use serde::{Deserialize, Serialize};

use super::paths::TxHistoryPaths;
use crate::audit::{CaptureOptions, DedupScope, LogTable, DEFAULT_IGNORED_FIELDS};
use crate::error::{AuditError, AuditResult};
use crate::logging::LogLevel;

/// User settings for txhistory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Audit table name; commands mentioning it are never audited
    #[serde(default = "default_log_table_name")]
    pub log_table_name: String,

    /// Database schema holding the audit table
    #[serde(default = "default_log_table_schema")]
    pub log_table_schema: String,

    /// Fields never written to an audit record
    #[serde(default = "default_ignored_fields")]
    pub ignored_fields: Vec<String>,

    #[serde(default)]
    pub dedup_scope: DedupScope,

    #[serde(default)]
    pub log_level: LogLevel,
}

fn default_schema_version() -> u32 {
    1
}

fn default_log_table_name() -> String {
    "TransactionHistory".to_string()
}

fn default_log_table_schema() -> String {
    "test".to_string()
}

fn default_ignored_fields() -> Vec<String> {
    DEFAULT_IGNORED_FIELDS.iter().map(|f| f.to_string()).collect()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            log_table_name: default_log_table_name(),
            log_table_schema: default_log_table_schema(),
            ignored_fields: default_ignored_fields(),
            dedup_scope: DedupScope::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl Settings {
    /// Load settings from disk, or defaults if the file doesn't exist
    pub fn load_or_create(paths: &TxHistoryPaths) -> AuditResult<Self> {
        let settings_path = paths.settings_file();

        if !settings_path.exists() {
            // Not persisted here; `init` decides when to write
            return Ok(Settings::default());
        }

        let contents = std::fs::read_to_string(&settings_path)
            .map_err(|e| AuditError::Io(format!("Failed to read settings file: {}", e)))?;

        let settings: Settings = serde_json::from_str(&contents)
            .map_err(|e| AuditError::Config(format!("Failed to parse settings file: {}", e)))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to disk
    pub fn save(&self, paths: &TxHistoryPaths) -> AuditResult<()> {
        self.validate()?;
        paths.ensure_directories()?;

        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| AuditError::Config(format!("Failed to serialize settings: {}", e)))?;

        std::fs::write(paths.settings_file(), contents)
            .map_err(|e| AuditError::Io(format!("Failed to write settings file: {}", e)))?;

        Ok(())
    }

    pub fn validate(&self) -> AuditResult<()> {
        if self.log_table_name.trim().is_empty() {
            return Err(AuditError::Config("log_table_name cannot be empty".into()));
        }
        if self.log_table_schema.trim().is_empty() {
            return Err(AuditError::Config("log_table_schema cannot be empty".into()));
        }
        Ok(())
    }

    pub fn capture_options(&self) -> CaptureOptions {
        CaptureOptions::new(self.ignored_fields.iter().cloned(), self.dedup_scope)
    }

    pub fn log_table(&self) -> LogTable {
        LogTable::new(self.log_table_schema.clone(), self.log_table_name.clone())
    }
}
