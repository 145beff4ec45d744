//! Transaction audit capture
//!
//! Turns the mutated entities of one unit of work into a single audit
//! record.
//!
//! # Architecture
//!
//! - `EntityDiffExtractor`: field-level changes of one entity.
//! - `RelationshipLabelResolver`: human-readable labels of referenced
//!   entities, looked up by foreign key.
//! - `TransactionDiffAggregator`: numbers entities per entity set, filters
//!   ignored fields and duplicates, and orders the result.
//! - `AuditRecordCodec`: the stable `TransactionDetail` wire format.
//! - `AuditEngine`: ties the above together and starts per-transaction
//!   captures.
//! - `AuditLog`: the JSONL-backed audit table.
//!
//! # Example
//!
//! ```rust,ignore
//! use txhistory::audit::{AuditEngine, CaptureOptions, LogTable};
//!
//! let engine = AuditEngine::new(schemas, CaptureOptions::default(), LogTable::default());
//! let mut capture = engine.begin("alice");
//! unit_of_work.save_changes(&mut capture)?;
//! if let Some(record) = capture.finish()? {
//!     println!("{}", record.detail);
//! }
//! ```

mod aggregator;
mod codec;
mod diff;
mod engine;
mod entry;
mod extractor;
mod history;
mod labels;
mod options;
mod record;

pub use aggregator::{collect_change_set, TransactionDiffAggregator};
pub use codec::AuditRecordCodec;
pub use diff::{format_entries, format_entry, summarize_entries};
pub use engine::AuditEngine;
pub use entry::{EntityChanges, EntryIndex, FieldChange, TransactionDiffEntry};
pub use extractor::EntityDiffExtractor;
pub use history::AuditLog;
pub use labels::RelationshipLabelResolver;
pub use options::{CaptureOptions, DedupScope, DEFAULT_IGNORED_FIELDS};
pub use record::{HistoryRow, LogTable, TransactionAuditRecord};
