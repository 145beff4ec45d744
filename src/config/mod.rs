//! Configuration module for txhistory
//!
//! This module provides configuration management including:
//! - XDG-compliant path resolution
//! - Settings persistence (audit table location, ignored fields)

pub mod paths;
pub mod settings;

pub use paths::TxHistoryPaths;
pub use settings::Settings;
