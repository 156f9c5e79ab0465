//! Wire types exchanged with the intent layer, the consent collector, and
//! the action executor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use warden_audit::ExecutionStatus;
use warden_policy::{Category, RiskTier};

/// A structured request to perform one system-affecting operation.
///
/// Produced by the external intent layer; immutable once created. `params`
/// is an opaque payload the core passes through to the executor untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    pub request_id: String,
    pub action_id: String,
    pub action_type: String,
    pub params: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
    pub requested_at: DateTime<Utc>,
}

impl ActionRequest {
    pub fn new(action_id: &str, action_type: &str, params: serde_json::Value) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            action_id: action_id.to_string(),
            action_type: action_type.to_string(),
            params,
            justification: None,
            requested_at: Utc::now(),
        }
    }

    pub fn with_justification(mut self, justification: &str) -> Self {
        self.justification = Some(justification.to_string());
        self
    }
}

/// Prompt presented to the user when no valid grant covers a request.
#[derive(Debug, Clone)]
pub struct PermissionPrompt {
    pub action_id: String,
    pub category: Category,
    pub justification: String,
    pub risk_tier: RiskTier,
    pub host_requirements: Vec<String>,
}

/// Scope selected by the user when approving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentScope {
    /// This one action, once.
    Once,
    /// The whole category, until revoked.
    Category,
    /// The whole category, for a bounded duration.
    CategoryTimed(Duration),
}

/// The user's answer to a permission prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsentDecision {
    pub approved: bool,
    pub scope: ConsentScope,
}

impl ConsentDecision {
    pub fn approve(scope: ConsentScope) -> Self {
        Self {
            approved: true,
            scope,
        }
    }

    pub fn deny() -> Self {
        Self {
            approved: false,
            scope: ConsentScope::Once,
        }
    }
}

/// Validated order released to the executor. Exists only after the
/// authorization decision has been written to the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOrder {
    pub request_id: String,
    pub action_id: String,
    pub grant_id: String,
    pub params: serde_json::Value,
}

/// Outcome reported by the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub detail: Option<String>,
}

impl ExecutionResult {
    pub fn success(detail: Option<String>) -> Self {
        Self {
            status: ExecutionStatus::Success,
            detail,
        }
    }

    pub fn failure(detail: &str) -> Self {
        Self {
            status: ExecutionStatus::Failure,
            detail: Some(detail.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}
