//! Path management for txhistory
//!
//! ## Path Resolution Order
//!
//! 1. `TXHISTORY_DATA_DIR` environment variable (if set)
//! 2. Unix (Linux/macOS): `$XDG_CONFIG_HOME/txhistory` or `~/.config/txhistory`
//! 3. Windows: `%APPDATA%\txhistory`

use std::path::{Path, PathBuf};

use crate::error::{AuditError, AuditResult};

/// Environment variable overriding the base directory
pub const DATA_DIR_ENV_VAR: &str = "TXHISTORY_DATA_DIR";

/// Manages all paths used by txhistory
#[derive(Debug, Clone)]
pub struct TxHistoryPaths {
    base_dir: PathBuf,
}

impl TxHistoryPaths {
    /// Resolve the base directory from the environment
    ///
    /// # Errors
    ///
    /// Returns an error if no home directory can be determined.
    pub fn new() -> AuditResult<Self> {
        let base_dir = match std::env::var(DATA_DIR_ENV_VAR) {
            Ok(custom) if !custom.trim().is_empty() => PathBuf::from(custom),
            _ => resolve_default_path()?,
        };

        Ok(Self { base_dir })
    }

    /// Use an explicit base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Settings file (`config.json`)
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Entity-type schema descriptors (`schema.json`)
    pub fn schema_file(&self) -> PathBuf {
        self.base_dir.join("schema.json")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    /// Entity tables of the reference store
    pub fn tables_file(&self) -> PathBuf {
        self.data_dir().join("tables.json")
    }

    /// Audit table, one JSON row per line
    pub fn history_log(&self) -> PathBuf {
        self.data_dir().join("history.jsonl")
    }

    /// Create the base and data directories
    pub fn ensure_directories(&self) -> AuditResult<()> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| AuditError::Io(format!("Failed to create base directory: {}", e)))?;

        std::fs::create_dir_all(self.data_dir())
            .map_err(|e| AuditError::Io(format!("Failed to create data directory: {}", e)))?;

        Ok(())
    }

    /// Whether `init` has run (settings file exists)
    pub fn is_initialized(&self) -> bool {
        self.settings_file().exists()
    }
}

#[cfg(not(windows))]
fn resolve_default_path() -> AuditResult<PathBuf> {
    let config_base = match std::env::var("XDG_CONFIG_HOME") {
        Ok(xdg) if !xdg.is_empty() => PathBuf::from(xdg),
        _ => {
            let home = std::env::var("HOME").map_err(|_| {
                AuditError::Config("Could not determine home directory".into())
            })?;
            PathBuf::from(home).join(".config")
        }
    };
    Ok(config_base.join("txhistory"))
}

#[cfg(windows)]
fn resolve_default_path() -> AuditResult<PathBuf> {
    let appdata = std::env::var("APPDATA")
        .map_err(|_| AuditError::Config("Could not determine APPDATA directory".into()))?;
    Ok(PathBuf::from(appdata).join("txhistory"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_custom_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        let paths = TxHistoryPaths::with_base_dir(temp_dir.path().to_path_buf());

        assert_eq!(paths.base_dir(), temp_dir.path());
        assert_eq!(paths.data_dir(), temp_dir.path().join("data"));
    }

    #[test]
    fn test_env_var_override() {
        let temp_dir = TempDir::new().unwrap();
        std::env::set_var(DATA_DIR_ENV_VAR, temp_dir.path());

        let paths = TxHistoryPaths::new().unwrap();
        assert_eq!(paths.base_dir(), temp_dir.path());

        std::env::remove_var(DATA_DIR_ENV_VAR);
    }

    #[test]
    fn test_ensure_directories() {
        let temp_dir = TempDir::new().unwrap();
        let paths = TxHistoryPaths::with_base_dir(temp_dir.path().join("nested"));

        paths.ensure_directories().unwrap();

        assert!(paths.data_dir().exists());
        assert!(!paths.is_initialized());
    }

    #[test]
    fn test_file_paths() {
        let temp_dir = TempDir::new().unwrap();
        let paths = TxHistoryPaths::with_base_dir(temp_dir.path().to_path_buf());

        assert_eq!(paths.settings_file(), temp_dir.path().join("config.json"));
        assert_eq!(paths.schema_file(), temp_dir.path().join("schema.json"));
        assert_eq!(
            paths.history_log(),
            temp_dir.path().join("data").join("history.jsonl")
        );
    }
}
