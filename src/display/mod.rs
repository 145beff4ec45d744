//! Display formatting for terminal output
//!
//! Formats audit rows and records as plain-text tables and detail views.

pub mod history;

pub use history::{format_audit_record, format_history_details, format_history_list};
