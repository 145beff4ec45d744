//! Capture options
//!
//! The subset of settings the diff engine needs, resolved once per engine.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Default housekeeping columns left out of every audit record
pub const DEFAULT_IGNORED_FIELDS: [&str; 4] = ["AddUser", "ModUser", "AddDate", "ModDate"];

/// How far duplicate (field, old, new) tuples are filtered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DedupScope {
    /// A tuple is emitted once per entity set, across all its ordinals.
    /// Matches audit rows written by earlier versions.
    #[default]
    Transaction,
    /// A tuple is emitted once per `<ordinal>.<entitySet>` index
    Entity,
}

/// Options controlling diff extraction and aggregation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOptions {
    pub ignored_fields: BTreeSet<String>,
    pub dedup_scope: DedupScope,
}

impl CaptureOptions {
    pub fn new<I, S>(ignored_fields: I, dedup_scope: DedupScope) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ignored_fields: ignored_fields.into_iter().map(Into::into).collect(),
            dedup_scope,
        }
    }

    pub fn is_ignored(&self, field: &str) -> bool {
        self.ignored_fields.contains(field)
    }
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self::new(DEFAULT_IGNORED_FIELDS, DedupScope::default())
    }
}
