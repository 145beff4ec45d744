//! Capture engine facade

use tracing::debug;

use crate::config::settings::Settings;
use crate::error::AuditResult;
use crate::interception::TransactionCapture;
use crate::models::{ContextId, SchemaRegistry};
use crate::storage::PersistenceContext;

use super::aggregator::{collect_change_set, TransactionDiffAggregator};
use super::options::CaptureOptions;
use super::record::{LogTable, TransactionAuditRecord};

/// Schemas, options and log table shared by every transaction capture
#[derive(Debug)]
pub struct AuditEngine {
    schemas: SchemaRegistry,
    options: CaptureOptions,
    log_table: LogTable,
}

impl AuditEngine {
    pub fn new(schemas: SchemaRegistry, options: CaptureOptions, log_table: LogTable) -> Self {
        Self {
            schemas,
            options,
            log_table,
        }
    }

    pub fn from_settings(schemas: SchemaRegistry, settings: &Settings) -> Self {
        Self::new(schemas, settings.capture_options(), settings.log_table())
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    pub fn options(&self) -> &CaptureOptions {
        &self.options
    }

    pub fn log_table(&self) -> &LogTable {
        &self.log_table
    }

    /// Build the audit record for the unit of work behind `persistence`
    pub fn build_record<C: PersistenceContext + ?Sized>(
        &self,
        context: ContextId,
        persistence: &C,
        changing_user: &str,
    ) -> AuditResult<TransactionAuditRecord> {
        let change_set = collect_change_set(persistence)?;
        debug!(context = %context, entities = change_set.len(), "Collecting transaction diff");

        let entries = TransactionDiffAggregator::new(&self.schemas, &self.options)
            .build_diff(change_set, persistence)?;

        TransactionAuditRecord::new(context, entries, changing_user)
    }

    /// Start capturing one transaction on behalf of `changing_user`
    pub fn begin(&self, changing_user: impl Into<String>) -> TransactionCapture<'_> {
        TransactionCapture::new(self, changing_user.into())
    }
}
