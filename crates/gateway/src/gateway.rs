//! The permission gateway state machine.

use crate::interfaces::{ActionExecutor, ConsentCollector};
use crate::state::RequestState;
use crate::types::{
    ActionRequest, ConsentScope, ExecutionOrder, ExecutionResult, PermissionPrompt,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use warden_audit::{AuditEntry, AuditLog, Decision, DenialReason};
use warden_policy::{Category, PolicyResolver, Resolution};
use warden_registry::{GrantRegistry, LookupOutcome, PermissionGrant, ScopeKind};

/// Gateway tunables.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Bound on the consent wait; elapsing is equivalent to denial.
    pub consent_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            consent_timeout: Duration::from_secs(120),
        }
    }
}

/// Terminal report for one request.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub request_id: String,
    pub action_id: String,
    pub state: RequestState,
    pub decision: Decision,
    pub reason: Option<DenialReason>,
    pub grant_id: Option<String>,
    pub execution: Option<ExecutionResult>,
}

impl GatewayResponse {
    pub fn is_denied(&self) -> bool {
        self.state == RequestState::Denied
    }
}

/// Orchestrates authorization for every action request.
///
/// `Received → Resolving → (Granted | AwaitingUser) → (Granted | Denied) →
/// Executing → (Completed | Failed)`. The authorization decision is written
/// to the audit log and fsynced before any execution order is released, and
/// a registry re-validation directly before dispatch catches revocations
/// that landed while the request was queued.
///
/// The gateway is owned by the session and holds its collaborators
/// explicitly; there is no process-global state.
pub struct PermissionGateway {
    resolver: PolicyResolver,
    registry: Arc<GrantRegistry>,
    audit: Arc<AuditLog>,
    collector: Arc<dyn ConsentCollector>,
    executor: Arc<dyn ActionExecutor>,
    /// The collector is a single shared resource: one outstanding prompt at a
    /// time, requests queue in arrival order.
    consent_gate: tokio::sync::Mutex<()>,
    config: GatewayConfig,
}

impl PermissionGateway {
    pub fn new(
        resolver: PolicyResolver,
        registry: Arc<GrantRegistry>,
        audit: Arc<AuditLog>,
        collector: Arc<dyn ConsentCollector>,
        executor: Arc<dyn ActionExecutor>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            resolver,
            registry,
            audit,
            collector,
            executor,
            consent_gate: tokio::sync::Mutex::new(()),
            config,
        }
    }

    pub fn registry(&self) -> &Arc<GrantRegistry> {
        &self.registry
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    /// Drive one request through the state machine to a terminal state.
    pub async fn handle(&self, request: ActionRequest) -> GatewayResponse {
        debug!(
            "Request {} received ({} / {})",
            request.request_id, request.action_id, request.action_type
        );

        // Received -> Resolving. An unregistered action type denies by
        // default; the core never guesses a category.
        let resolution = match self.resolver.resolve(&request.action_type) {
            Ok(resolution) => resolution,
            Err(e) => {
                warn!("Request {} denied: {}", request.request_id, e);
                let entry = AuditEntry::denied(
                    &request.request_id,
                    &request.action_id,
                    None,
                    DenialReason::UnknownAction,
                    Some(e.to_string()),
                );
                return self.deny_with(&request, entry);
            }
        };
        let category = resolution.category;

        // Resolving -> Granted | AwaitingUser.
        let admitted = match self.registry.lookup(&request.action_id, category, Utc::now()) {
            Some(grant) => grant,
            None => match self.await_consent(&request, &resolution).await {
                Ok(grant) => grant,
                Err(response) => return *response,
            },
        };

        // Granted -> Executing, after the pre-dispatch double-check.
        let dispatch_grant_id = match self.revalidate(&request, category, &admitted.grant_id) {
            Ok(grant_id) => grant_id,
            Err(response) => return *response,
        };

        // The decision must be durable before the order exists.
        let decision_entry = AuditEntry::granted(
            &request.request_id,
            &request.action_id,
            category,
            &dispatch_grant_id,
        );
        if let Err(e) = self.audit.append(&decision_entry) {
            error!("Audit write failed, denying fail-closed: {}", e);
            crate::metrics::record_denied();
            return GatewayResponse {
                request_id: request.request_id.clone(),
                action_id: request.action_id.clone(),
                state: RequestState::Denied,
                decision: Decision::Denied,
                reason: Some(DenialReason::Unauthorized),
                grant_id: Some(dispatch_grant_id),
                execution: None,
            };
        }
        crate::metrics::record_granted();

        let order = ExecutionOrder {
            request_id: request.request_id.clone(),
            action_id: request.action_id.clone(),
            grant_id: dispatch_grant_id.clone(),
            params: request.params.clone(),
        };

        info!(
            "Request {} executing {} under grant {}",
            request.request_id, request.action_id, dispatch_grant_id
        );
        let mut result = self.executor.execute(order.clone()).await;

        // Failures are retried exactly once, and only for categories the
        // policy declares idempotent.
        if !result.is_success() && self.resolver.is_idempotent(category) {
            info!(
                "Retrying idempotent action {} once after failure",
                request.action_id
            );
            result = self.executor.execute(order).await;
        }

        if !result.is_success() {
            crate::metrics::record_execution_failure();
        }

        let outcome_entry = AuditEntry::execution(
            &request.request_id,
            &request.action_id,
            category,
            &dispatch_grant_id,
            result.status,
            result.detail.clone(),
        );
        if let Err(e) = self.audit.append(&outcome_entry) {
            // The action already ran; surface the gap without pretending it
            // can be undone.
            error!(
                "Failed to audit execution outcome for request {}: {}",
                request.request_id, e
            );
        }

        let state = if result.is_success() {
            RequestState::Completed
        } else {
            RequestState::Failed
        };

        GatewayResponse {
            request_id: request.request_id.clone(),
            action_id: request.action_id.clone(),
            state,
            decision: Decision::Granted,
            reason: None,
            grant_id: Some(dispatch_grant_id),
            execution: Some(result),
        }
    }

    /// User-initiated category revocation. Takes effect immediately for any
    /// request not yet executing, via the pre-dispatch re-validation.
    pub fn revoke_category(&self, category: Category) -> usize {
        self.registry.revoke_category(category)
    }

    /// Session teardown: revoke session-scoped grants. Audit appends are
    /// individually fsynced, so there is nothing further to flush.
    pub fn shutdown(&self) {
        let revoked = self.registry.revoke_session_scoped();
        info!(
            "Gateway shutdown: revoked {} session-scoped grant(s)",
            revoked
        );
    }

    /// AwaitingUser: suspend until the collector answers or the bounded wait
    /// elapses. Fail-closed in every non-approval outcome.
    async fn await_consent(
        &self,
        request: &ActionRequest,
        resolution: &Resolution,
    ) -> Result<PermissionGrant, Box<GatewayResponse>> {
        let category = resolution.category;

        let _gate = self.consent_gate.lock().await;

        // The request ahead in the queue may have granted the category.
        if let Some(grant) = self.registry.lookup(&request.action_id, category, Utc::now()) {
            debug!(
                "Request {} granted while queued for consent",
                request.request_id
            );
            return Ok(grant);
        }

        let policy = self.resolver.policy(category);
        let mut justification = resolution.justification.clone();
        if let Some(reason) = &request.justification {
            justification.push_str(" Reason given: ");
            justification.push_str(reason);
        }
        let prompt = PermissionPrompt {
            action_id: request.action_id.clone(),
            category,
            justification,
            risk_tier: resolution.risk_tier,
            host_requirements: policy
                .host_requirements
                .iter()
                .map(|s| s.to_string())
                .collect(),
        };

        debug!(
            "Request {} awaiting user consent for {}",
            request.request_id, category
        );
        crate::metrics::record_prompt();

        let decision = match timeout(self.config.consent_timeout, self.collector.collect(prompt))
            .await
        {
            Ok(decision) => decision,
            Err(_) => {
                warn!(
                    "Consent wait for request {} timed out after {:?}; denying",
                    request.request_id, self.config.consent_timeout
                );
                crate::metrics::record_timeout();
                let entry =
                    AuditEntry::timed_out(&request.request_id, &request.action_id, category);
                return Err(Box::new(self.deny_with(request, entry)));
            }
        };

        if !decision.approved {
            info!("User declined request {}", request.request_id);
            let entry = AuditEntry::denied(
                &request.request_id,
                &request.action_id,
                Some(category),
                DenialReason::Declined,
                None,
            );
            return Err(Box::new(self.deny_with(request, entry)));
        }

        let now = Utc::now();
        let grant = match decision.scope {
            ConsentScope::Once => {
                PermissionGrant::single_action(category, &request.action_id, now)
            }
            ConsentScope::Category => PermissionGrant::category(category, now),
            ConsentScope::CategoryTimed(duration) => {
                let ttl = chrono::Duration::from_std(duration)
                    .unwrap_or_else(|_| chrono::Duration::days(36_500));
                PermissionGrant::category_timed(category, now, ttl)
            }
        };
        self.registry.issue(grant.clone());
        Ok(grant)
    }

    /// Double-check directly before dispatch: the grant that admitted the
    /// request may have been revoked or expired while it was queued. A
    /// single-action grant is consumed here, under the registry write lock,
    /// so at most one dispatch can ever spend it.
    pub(crate) fn revalidate(
        &self,
        request: &ActionRequest,
        category: Category,
        admitted_grant_id: &str,
    ) -> Result<String, Box<GatewayResponse>> {
        let now = Utc::now();

        match self.registry.lookup_outcome(&request.action_id, category, now) {
            LookupOutcome::Active(grant) => {
                if grant.scope.kind() == ScopeKind::SingleAction {
                    if self.registry.consume(&grant.grant_id, now) {
                        Ok(grant.grant_id)
                    } else {
                        // Lost the race to a concurrent dispatch.
                        let entry = AuditEntry::revoked(
                            &request.request_id,
                            &request.action_id,
                            category,
                            &grant.grant_id,
                        );
                        Err(Box::new(self.deny_with(request, entry)))
                    }
                } else {
                    Ok(grant.grant_id)
                }
            }
            LookupOutcome::Expired => {
                let entry = AuditEntry::denied(
                    &request.request_id,
                    &request.action_id,
                    Some(category),
                    DenialReason::GrantExpired,
                    Some("grant expired before dispatch".to_string()),
                );
                Err(Box::new(self.deny_with(request, entry)))
            }
            LookupOutcome::Miss => {
                let entry = AuditEntry::revoked(
                    &request.request_id,
                    &request.action_id,
                    category,
                    admitted_grant_id,
                );
                Err(Box::new(self.deny_with(request, entry)))
            }
        }
    }

    /// Record a terminal denial and build the response from the entry.
    fn deny_with(&self, request: &ActionRequest, entry: AuditEntry) -> GatewayResponse {
        let decision = entry.decision;
        let reason = entry.reason;
        let grant_id = entry.grant_id.clone();

        if let Err(e) = self.audit.append(&entry) {
            // Already denying; the trail gap is logged rather than silently
            // dropped.
            error!(
                "Failed to audit denial for request {}: {}",
                request.request_id, e
            );
        }
        crate::metrics::record_denied();

        GatewayResponse {
            request_id: request.request_id.clone(),
            action_id: request.action_id.clone(),
            state: RequestState::Denied,
            decision,
            reason,
            grant_id,
            execution: None,
        }
    }
}
