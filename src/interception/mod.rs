//! Statement interception
//!
//! Outgoing commands, the interceptor hook the persistence layer calls, and
//! the guard that keeps the audit insert to one per transaction.

mod capture;
mod guard;
mod statement;

pub use capture::{dispatch, CommandInterceptor, InterceptionContext, PassThrough, TransactionCapture};
pub use guard::AuditEmissionGuard;
pub use statement::{Command, ExecutionKind, Parameter, Statement, WriteOp};
