//! Storage layer for txhistory
//!
//! The persistence collaborator the capture engine reads from, plus a
//! reference implementation: a JSON-file backed store and a change-tracking
//! unit of work on top of it.

pub mod context;
pub mod database;
pub mod file_io;
pub mod unit_of_work;

pub use context::PersistenceContext;
pub use database::Database;
pub use file_io::{load_json, save_json_atomic};
pub use unit_of_work::UnitOfWork;
