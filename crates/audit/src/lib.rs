pub mod entry;
pub mod log;

pub use entry::{AuditEntry, Decision, DenialReason, ExecutionStatus, SCHEMA_VERSION};
pub use log::{AuditError, AuditLog, AuditQuery};
