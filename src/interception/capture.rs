//! Command interception hook
//!
//! The persistence layer hands every outgoing command to a
//! [`CommandInterceptor`] before executing it. [`TransactionCapture`] is the
//! interceptor that attaches the audit insert.

use tracing::{info, warn};

use crate::audit::{AuditEngine, TransactionAuditRecord};
use crate::error::AuditResult;
use crate::models::ContextId;
use crate::storage::PersistenceContext;

use super::guard::AuditEmissionGuard;
use super::statement::{Command, ExecutionKind};

/// What an interceptor learns about the transaction issuing a command
pub struct InterceptionContext<'a> {
    pub transaction: ContextId,
    pub persistence: &'a dyn PersistenceContext,
}

/// Hook invoked before each command executes
///
/// One callback per execution kind; an interceptor may rewrite the command.
pub trait CommandInterceptor {
    fn non_query_executing(
        &mut self,
        command: &mut Command,
        context: &InterceptionContext<'_>,
    ) -> AuditResult<()>;

    fn scalar_executing(
        &mut self,
        command: &mut Command,
        context: &InterceptionContext<'_>,
    ) -> AuditResult<()>;

    fn reader_executing(
        &mut self,
        command: &mut Command,
        context: &InterceptionContext<'_>,
    ) -> AuditResult<()>;
}

/// Route `command` to the callback matching its execution kind
pub fn dispatch(
    interceptor: &mut dyn CommandInterceptor,
    command: &mut Command,
    context: &InterceptionContext<'_>,
) -> AuditResult<()> {
    match command.execution {
        ExecutionKind::NonQuery => interceptor.non_query_executing(command, context),
        ExecutionKind::Scalar => interceptor.scalar_executing(command, context),
        ExecutionKind::Reader => interceptor.reader_executing(command, context),
    }
}

/// Interceptor that lets every command through untouched
#[derive(Debug, Default)]
pub struct PassThrough;

impl CommandInterceptor for PassThrough {
    fn non_query_executing(&mut self, _: &mut Command, _: &InterceptionContext<'_>) -> AuditResult<()> {
        Ok(())
    }

    fn scalar_executing(&mut self, _: &mut Command, _: &InterceptionContext<'_>) -> AuditResult<()> {
        Ok(())
    }

    fn reader_executing(&mut self, _: &mut Command, _: &InterceptionContext<'_>) -> AuditResult<()> {
        Ok(())
    }
}

/// Audit capture for one transaction
///
/// Created by [`AuditEngine::begin`] with the identity of the changing user.
/// The first data-mutating command gets the audit insert prepended; later
/// commands of the same transaction pass through.
pub struct TransactionCapture<'e> {
    engine: &'e AuditEngine,
    changing_user: String,
    guard: AuditEmissionGuard,
    emitted: Option<TransactionAuditRecord>,
}

impl<'e> TransactionCapture<'e> {
    pub(crate) fn new(engine: &'e AuditEngine, changing_user: String) -> Self {
        Self {
            engine,
            changing_user,
            guard: AuditEmissionGuard::new(),
            emitted: None,
        }
    }

    pub fn changing_user(&self) -> &str {
        &self.changing_user
    }

    /// Record attached so far, if any
    pub fn emitted(&self) -> Option<&TransactionAuditRecord> {
        self.emitted.as_ref()
    }

    /// End the capture and hand back the attached record
    pub fn finish(mut self) -> AuditResult<Option<TransactionAuditRecord>> {
        self.guard.dispose()?;
        Ok(self.emitted.take())
    }

    fn intercept(
        &mut self,
        command: &mut Command,
        context: &InterceptionContext<'_>,
    ) -> AuditResult<()> {
        self.guard.observe(context.transaction)?;
        if self.emitted.as_ref().map(|r| r.context) != Some(context.transaction) {
            self.emitted = None;
        }

        let log_table = self.engine.log_table();
        if !self.guard.should_emit(command, &log_table.name)? {
            return Ok(());
        }

        match self
            .engine
            .build_record(context.transaction, context.persistence, &self.changing_user)
        {
            Ok(record) => {
                command.prepend(record.to_statement(log_table));
                info!(
                    context = %record.context,
                    user = %record.changing_user,
                    entries = record.entries.len(),
                    execution = %command.execution,
                    "Attached transaction audit record"
                );
                self.emitted = Some(record);
            }
            Err(err) if err.is_recoverable() => {
                warn!(
                    context = %context.transaction,
                    error = %err,
                    "Could not build audit record, transaction proceeds unaudited"
                );
            }
            Err(err) => return Err(err),
        }

        self.guard.mark_logged()
    }
}

impl CommandInterceptor for TransactionCapture<'_> {
    fn non_query_executing(
        &mut self,
        command: &mut Command,
        context: &InterceptionContext<'_>,
    ) -> AuditResult<()> {
        self.intercept(command, context)
    }

    fn scalar_executing(
        &mut self,
        command: &mut Command,
        context: &InterceptionContext<'_>,
    ) -> AuditResult<()> {
        self.intercept(command, context)
    }

    fn reader_executing(
        &mut self,
        command: &mut Command,
        context: &InterceptionContext<'_>,
    ) -> AuditResult<()> {
        self.intercept(command, context)
    }
}
