//! Exactly-once emission control
//!
//! Saving a unit of work can run several commands, and each execution kind
//! (non-query, scalar, reader) passes through the interceptor. The guard
//! makes sure only the first qualifying command of a transaction carries
//! the audit insert.

use tracing::trace;

use crate::error::{AuditError, AuditResult};
use crate::models::ContextId;

use super::statement::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GuardState {
    Idle,
    Claimed { context: ContextId, logged: bool },
    Disposed,
}

/// Tracks whether the active transaction already has its audit write
#[derive(Debug)]
pub struct AuditEmissionGuard {
    state: GuardState,
}

impl AuditEmissionGuard {
    pub fn new() -> Self {
        Self {
            state: GuardState::Idle,
        }
    }

    /// Record that a command of `context` was intercepted
    ///
    /// Claims the context when idle. A different context means a new
    /// transaction started, so the guard re-arms for it.
    pub fn observe(&mut self, context: ContextId) -> AuditResult<()> {
        match self.state {
            GuardState::Disposed => Err(AuditError::GuardMisuse(
                "guard used after dispose".to_string(),
            )),
            GuardState::Claimed { context: claimed, .. } if claimed == context => Ok(()),
            GuardState::Claimed { context: claimed, .. } => {
                trace!(previous = %claimed, next = %context, "New transaction context, re-arming guard");
                self.state = GuardState::Claimed {
                    context,
                    logged: false,
                };
                Ok(())
            }
            GuardState::Idle => {
                trace!(context = %context, "Claiming transaction context");
                self.state = GuardState::Claimed {
                    context,
                    logged: false,
                };
                Ok(())
            }
        }
    }

    /// Whether `command` should carry the audit insert
    ///
    /// True only for a data-mutating command that does not write the log
    /// table itself, while the claimed transaction has not been logged.
    pub fn should_emit(&self, command: &Command, log_table_name: &str) -> AuditResult<bool> {
        let logged = match self.state {
            GuardState::Disposed => {
                return Err(AuditError::GuardMisuse(
                    "guard used after dispose".to_string(),
                ))
            }
            GuardState::Idle => return Ok(false),
            GuardState::Claimed { logged, .. } => logged,
        };

        if command.targets_table(log_table_name) {
            trace!("Skipping audit table write");
            return Ok(false);
        }
        if !command.is_data_mutating() {
            trace!("Skipping non-mutating command");
            return Ok(false);
        }
        if logged {
            trace!("Transaction already logged");
        }
        Ok(!logged)
    }

    /// Mark the claimed transaction as logged
    pub fn mark_logged(&mut self) -> AuditResult<()> {
        match self.state {
            GuardState::Claimed { context, .. } => {
                self.state = GuardState::Claimed {
                    context,
                    logged: true,
                };
                Ok(())
            }
            GuardState::Idle => Err(AuditError::GuardMisuse(
                "no transaction context claimed".to_string(),
            )),
            GuardState::Disposed => Err(AuditError::GuardMisuse(
                "guard used after dispose".to_string(),
            )),
        }
    }

    /// Context currently claimed, if any
    pub fn claimed(&self) -> Option<ContextId> {
        match self.state {
            GuardState::Claimed { context, .. } => Some(context),
            _ => None,
        }
    }

    pub fn is_logged(&self) -> bool {
        matches!(self.state, GuardState::Claimed { logged: true, .. })
    }

    pub fn is_disposed(&self) -> bool {
        self.state == GuardState::Disposed
    }

    /// Release the claimed context; a second call is an error
    pub fn dispose(&mut self) -> AuditResult<()> {
        if self.state == GuardState::Disposed {
            return Err(AuditError::GuardMisuse("guard disposed twice".to_string()));
        }
        self.state = GuardState::Disposed;
        Ok(())
    }
}

impl Default for AuditEmissionGuard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interception::statement::{ExecutionKind, Statement};

    fn command(sql: &str) -> Command {
        Command::new(
            ExecutionKind::NonQuery,
            Statement {
                sql: sql.to_string(),
                parameters: Vec::new(),
                write: None,
            },
        )
    }

    const TABLE: &str = "TransactionHistory";

    #[test]
    fn test_idle_never_emits() {
        let guard = AuditEmissionGuard::new();
        assert!(!guard.should_emit(&command("UPDATE [Orders] SET [A] = 1;"), TABLE).unwrap());
        assert_eq!(guard.claimed(), None);
    }

    #[test]
    fn test_first_mutating_command_emits_once() {
        let mut guard = AuditEmissionGuard::new();
        let context = ContextId::new();
        let update = command("UPDATE [Orders] SET [A] = 1;");

        guard.observe(context).unwrap();
        assert!(guard.should_emit(&update, TABLE).unwrap());
        guard.mark_logged().unwrap();

        guard.observe(context).unwrap();
        assert!(!guard.should_emit(&update, TABLE).unwrap());
        assert!(guard.is_logged());
    }

    #[test]
    fn test_skips_reads_and_audit_writes() {
        let mut guard = AuditEmissionGuard::new();
        guard.observe(ContextId::new()).unwrap();

        assert!(!guard.should_emit(&command("SELECT 1;"), TABLE).unwrap());
        assert!(!guard
            .should_emit(&command("INSERT INTO [test].[TransactionHistory] SELECT 1;"), TABLE)
            .unwrap());
        assert!(!guard.is_logged());
    }

    #[test]
    fn test_new_context_rearms() {
        let mut guard = AuditEmissionGuard::new();
        let first = ContextId::new();
        let second = ContextId::new();
        let delete = command("DELETE FROM [Orders] WHERE [Id] = 1;");

        guard.observe(first).unwrap();
        guard.mark_logged().unwrap();

        guard.observe(second).unwrap();
        assert_eq!(guard.claimed(), Some(second));
        assert!(guard.should_emit(&delete, TABLE).unwrap());
    }

    #[test]
    fn test_mark_logged_requires_claim() {
        let mut guard = AuditEmissionGuard::new();
        assert!(matches!(guard.mark_logged(), Err(AuditError::GuardMisuse(_))));
    }

    #[test]
    fn test_dispose_twice_is_misuse() {
        let mut guard = AuditEmissionGuard::new();
        guard.dispose().unwrap();
        assert!(guard.is_disposed());

        let err = guard.dispose().unwrap_err();
        assert!(matches!(err, AuditError::GuardMisuse(_)));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_use_after_dispose_is_misuse() {
        let mut guard = AuditEmissionGuard::new();
        guard.dispose().unwrap();

        assert!(guard.observe(ContextId::new()).is_err());
        assert!(guard.should_emit(&command("UPDATE x;"), TABLE).is_err());
        assert!(guard.mark_logged().is_err());
    }
}
