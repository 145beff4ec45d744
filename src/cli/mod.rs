//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the capture engine.

pub mod apply;
pub mod history;

pub use apply::{apply_change_request, handle_apply_command, ChangeRequest, Operation};
pub use history::{handle_decode_command, handle_history_command, handle_show_command};
