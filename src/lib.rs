//! txhistory - transaction audit capture over a unit of work
//!
//! When a unit of work is saved, every added, deleted and modified entity is
//! turned into field-level changes, foreign keys are resolved to readable
//! labels, and the whole transaction is written as one row to an audit table
//! in the same transaction as the changes themselves.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Configuration and path management
//! - `error`: Custom error types
//! - `logging`: Diagnostic logging setup
//! - `models`: Identity types, schema descriptors and entity snapshots
//! - `audit`: Diff extraction, label resolution, aggregation and the wire codec
//! - `interception`: Commands, the interceptor hook and the emission guard
//! - `storage`: Persistence collaborator and the reference store
//! - `display`, `cli`: Terminal output and command handlers
//!
//! # Example
//!
//! ```rust,ignore
//! use txhistory::audit::AuditEngine;
//! use txhistory::config::{paths::TxHistoryPaths, settings::Settings};
//! use txhistory::models::SchemaRegistry;
//! use txhistory::storage::{Database, UnitOfWork};
//!
//! let paths = TxHistoryPaths::new()?;
//! let settings = Settings::load_or_create(&paths)?;
//! let schemas = SchemaRegistry::load(&paths.schema_file())?;
//! let engine = AuditEngine::from_settings(schemas, &settings);
//! let database = Database::from_paths(&paths)?;
//!
//! let mut unit_of_work = UnitOfWork::new(&database, engine.schemas());
//! unit_of_work.modify("Orders", order_changes)?;
//!
//! let mut capture = engine.begin("alice");
//! unit_of_work.save_changes(&mut capture)?;
//! let record = capture.finish()?;
//! ```

pub mod audit;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod interception;
pub mod logging;
pub mod models;
pub mod storage;

pub use error::{AuditError, AuditResult};
