//! Metrics instrumentation for gateway decisions.

/// Increment the granted-dispatch counter.
pub fn record_granted() {
    metrics::counter!("gateway_granted_total", 1);
}

/// Increment the denial counter.
pub fn record_denied() {
    metrics::counter!("gateway_denied_total", 1);
}

/// Increment the consent-timeout counter.
pub fn record_timeout() {
    metrics::counter!("gateway_consent_timeout_total", 1);
}

/// Increment the prompts-shown counter.
pub fn record_prompt() {
    metrics::counter!("gateway_prompts_total", 1);
}

/// Increment the execution-failure counter.
pub fn record_execution_failure() {
    metrics::counter!("gateway_execution_failures_total", 1);
}
