//! Warden terminal front end.
//!
//! Wires the permission gateway to a terminal consent collector and a small
//! local executor, and drives it from a command loop.

mod config;
mod consent;
mod executor;

use anyhow::Result;
use chrono::Utc;
use config::WardenConfig;
use consent::TerminalConsentCollector;
use executor::SystemExecutor;
use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use warden_audit::{AuditEntry, AuditLog, AuditQuery};
use warden_gateway::{
    ActionRequest, ExpirySweeper, GatewayConfig, GatewayResponse, PermissionGateway,
};
use warden_policy::{Category, PolicyResolver};
use warden_registry::{GrantRegistry, GrantStore};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║                   Warden Permission Gateway                      ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "warden.yaml".to_string());
    let config = WardenConfig::load_or_default(Path::new(&config_path))?;

    let (audit, audit_recovered) = AuditLog::open(config.data_dir.join("audit.jsonl"))?;
    let audit = Arc::new(audit);
    if audit_recovered {
        let _ = audit.append(&AuditEntry::warning(
            "audit_recovery",
            "audit log had a corrupt tail; continuing from the valid prefix",
        ));
    }

    let (registry, registry_recovered) = if config.persist_grants {
        GrantRegistry::with_store(GrantStore::new(config.data_dir.join("grants.jsonl")))
    } else {
        (GrantRegistry::in_memory(), false)
    };
    let registry = Arc::new(registry);
    if registry_recovered {
        let _ = audit.append(&AuditEntry::warning(
            "registry_recovery",
            "grant store was unreadable; starting with an empty registry",
        ));
    }

    let gateway = Arc::new(PermissionGateway::new(
        PolicyResolver::builtin(),
        Arc::clone(&registry),
        Arc::clone(&audit),
        Arc::new(TerminalConsentCollector::new()),
        Arc::new(SystemExecutor::new()),
        GatewayConfig {
            consent_timeout: config.consent_timeout(),
        },
    ));

    let sweeper = ExpirySweeper::start(Arc::clone(&registry), config.sweep_interval());

    println!("Type 'help' for commands. Ctrl-C or 'exit' to quit.");

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    loop {
        print!("> ");
        let _ = std::io::stdout().flush();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if !run_command(&gateway, line.trim()).await {
                            break;
                        }
                    }
                    _ => break, // EOF
                }
            }
        }
    }

    // Termination: stop the sweeper, revoke session-scoped grants, and let
    // the (already fsynced) audit trail rest.
    sweeper.stop();
    gateway.shutdown();
    info!("Warden stopped");
    println!("Goodbye.");
    Ok(())
}

async fn run_command(gateway: &Arc<PermissionGateway>, line: &str) -> bool {
    let (command, rest) = match line.split_once(' ') {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    match command {
        "" => {}
        "help" => print_help(),
        "exit" | "quit" => return false,
        "request" => match parse_request_line(rest) {
            Some(request) => {
                let response = gateway.handle(request).await;
                print_response(&response);
            }
            None => println!("usage: request <action_type> [action_id] [params-json]"),
        },
        "revoke" => match rest.parse::<Category>() {
            Ok(category) => {
                let revoked = gateway.revoke_category(category);
                println!("revoked {} grant(s) for {}", revoked, category);
            }
            Err(e) => println!("{}", e),
        },
        "grants" => {
            let now = Utc::now();
            let mut shown = 0;
            for grant in gateway.registry().snapshot() {
                if !grant.is_active(now) {
                    continue;
                }
                shown += 1;
                let expiry = grant
                    .expires_at
                    .map(|e| e.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "{}  {}  {:?}  expires: {}",
                    grant.grant_id,
                    grant.category,
                    grant.scope.kind(),
                    expiry
                );
            }
            if shown == 0 {
                println!("no active grants");
            }
        }
        "audit" => {
            let query = match rest.parse::<Category>() {
                Ok(category) => AuditQuery {
                    category: Some(category),
                    ..Default::default()
                },
                Err(_) => AuditQuery::default(),
            };
            let entries = gateway.audit().query(&query);
            for entry in entries.iter().rev().take(10).rev() {
                println!(
                    "{}  {}  {:?}  {:?}",
                    entry.timestamp.to_rfc3339(),
                    entry.action_id,
                    entry.decision,
                    entry.outcome
                );
            }
            println!("{} entr(ies) total", entries.len());
        }
        "verify" => match verify_audit(gateway.audit()) {
            Ok(()) => println!("audit chain intact"),
            Err(e) => println!("audit chain verification FAILED: {}", e),
        },
        other => println!("unknown command: {} (try 'help')", other),
    }

    true
}

fn verify_audit(audit: &Arc<AuditLog>) -> Result<(), warden_audit::AuditError> {
    audit.verify_integrity()
}

/// `<action_type> [action_id] [params-json]`; the action id defaults to the
/// action type.
fn parse_request_line(rest: &str) -> Option<ActionRequest> {
    let rest = rest.trim();
    if rest.is_empty() {
        return None;
    }

    let (head, params_json) = match rest.find('{') {
        Some(idx) => (rest[..idx].trim(), Some(rest[idx..].trim())),
        None => (rest, None),
    };

    let mut tokens = head.split_whitespace();
    let action_type = tokens.next()?;
    let action_id = tokens.next().unwrap_or(action_type);

    let params = match params_json {
        Some(json) => serde_json::from_str(json).ok()?,
        None => serde_json::json!({}),
    };

    Some(ActionRequest::new(action_id, action_type, params))
}

fn print_response(response: &GatewayResponse) {
    match response.state {
        warden_gateway::RequestState::Completed => {
            println!("✅ completed: {}", response.action_id);
            if let Some(execution) = &response.execution {
                if let Some(detail) = &execution.detail {
                    println!("{}", detail);
                }
            }
        }
        warden_gateway::RequestState::Failed => {
            let detail = response
                .execution
                .as_ref()
                .and_then(|e| e.detail.as_deref())
                .unwrap_or("no detail");
            println!("❌ execution failed: {}", detail);
        }
        _ => {
            let reason = response
                .reason
                .map(|r| format!("{:?}", r))
                .unwrap_or_else(|| format!("{:?}", response.decision));
            println!("🚫 denied ({})", reason);
        }
    }
}

fn print_help() {
    println!("commands:");
    println!("  request <action_type> [action_id] [params-json]   submit an action request");
    println!("      e.g. request app_open open_safari");
    println!("           request file_read {{\"path\": \"/tmp/notes.txt\"}}");
    println!("  revoke <category>    revoke every active grant in a category");
    println!("  grants               list active grants");
    println!("  audit [category]     show recent audit entries");
    println!("  verify               verify the audit hash chain");
    println!("  exit                 quit");
    println!(
        "action types: {}",
        PolicyResolver::builtin().known_actions().join(", ")
    );
}
