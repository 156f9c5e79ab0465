//! Abstract interfaces for the gateway's external collaborators.

use crate::types::{ConsentDecision, ExecutionOrder, ExecutionResult, PermissionPrompt};
use async_trait::async_trait;

/// Presents permission prompts to the user and returns decisions.
///
/// The gateway treats the collector as a single shared resource: at most one
/// prompt is outstanding at a time, and the wait is bounded by the configured
/// consent timeout (no response means denial).
#[async_trait]
pub trait ConsentCollector: Send + Sync {
    async fn collect(&self, prompt: PermissionPrompt) -> ConsentDecision;
}

/// Performs the actual automation for a validated order.
///
/// Implementations never see a request that has not passed authorization;
/// the order carries the grant id its dispatch was authorized under.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, order: ExecutionOrder) -> ExecutionResult;
}
