use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warden_policy::Category;

/// Schema version for persisted audit records.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Authorization decision recorded for a request.
///
/// `Warning` is reserved for system-origin entries (e.g. a store that had to
/// be recovered); request entries use the other four.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Granted,
    Denied,
    Timeout,
    Revoked,
    Warning,
}

/// Specific reason attached to a denial.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    UnknownAction,
    Unauthorized,
    GrantExpired,
    Declined,
}

/// Result reported by the executor, folded into the audit trail.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Failure,
}

/// One immutable record of an authorization decision or execution outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub entry_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub action_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    pub decision: Decision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenialReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ExecutionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AuditEntry {
    fn base(request_id: &str, action_id: &str, decision: Decision) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            entry_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            request_id: Some(request_id.to_string()),
            action_id: action_id.to_string(),
            category: None,
            decision,
            reason: None,
            grant_id: None,
            outcome: None,
            detail: None,
        }
    }

    /// Authorization succeeded; written before the execution order is
    /// released.
    pub fn granted(request_id: &str, action_id: &str, category: Category, grant_id: &str) -> Self {
        let mut entry = Self::base(request_id, action_id, Decision::Granted);
        entry.category = Some(category);
        entry.grant_id = Some(grant_id.to_string());
        entry
    }

    pub fn denied(
        request_id: &str,
        action_id: &str,
        category: Option<Category>,
        reason: DenialReason,
        detail: Option<String>,
    ) -> Self {
        let mut entry = Self::base(request_id, action_id, Decision::Denied);
        entry.category = category;
        entry.reason = Some(reason);
        entry.detail = detail;
        entry
    }

    /// No collector response within the bounded wait; equivalent to denial.
    pub fn timed_out(request_id: &str, action_id: &str, category: Category) -> Self {
        let mut entry = Self::base(request_id, action_id, Decision::Timeout);
        entry.category = Some(category);
        entry
    }

    /// A grant was revoked between approval and dispatch.
    pub fn revoked(request_id: &str, action_id: &str, category: Category, grant_id: &str) -> Self {
        let mut entry = Self::base(request_id, action_id, Decision::Revoked);
        entry.category = Some(category);
        entry.grant_id = Some(grant_id.to_string());
        entry
    }

    /// Execution outcome, recorded after the executor reports back.
    pub fn execution(
        request_id: &str,
        action_id: &str,
        category: Category,
        grant_id: &str,
        status: ExecutionStatus,
        detail: Option<String>,
    ) -> Self {
        let mut entry = Self::base(request_id, action_id, Decision::Granted);
        entry.category = Some(category);
        entry.grant_id = Some(grant_id.to_string());
        entry.outcome = Some(status);
        entry.detail = detail;
        entry
    }

    /// System-origin warning (e.g. persisted state recovered as empty).
    pub fn warning(action_id: &str, detail: &str) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            entry_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            request_id: None,
            action_id: action_id.to_string(),
            category: None,
            decision: Decision::Warning,
            reason: None,
            grant_id: None,
            outcome: None,
            detail: Some(detail.to_string()),
        }
    }

    pub fn validate_version(&self) -> Result<(), String> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(format!(
                "Schema version mismatch: expected {}, got {}",
                SCHEMA_VERSION, self.schema_version
            ));
        }
        Ok(())
    }
}
