//! Terminal consent collector.

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use warden_gateway::{ConsentCollector, ConsentDecision, ConsentScope, PermissionPrompt};

/// Presents permission prompts on the terminal and reads the answer from
/// stdin. One prompt is outstanding at a time; the gateway serializes access.
pub struct TerminalConsentCollector;

impl TerminalConsentCollector {
    pub fn new() -> Self {
        Self
    }

    async fn send(&self, message: &str) {
        let mut stdout = tokio::io::stdout();
        let _ = stdout.write_all(message.as_bytes()).await;
        let _ = stdout.write_all(b"\n").await;
        let _ = stdout.flush().await;
    }

    async fn receive(&self) -> Option<String> {
        let stdin = tokio::io::stdin();
        let mut reader = BufReader::new(stdin);
        let mut line = String::new();

        match reader.read_line(&mut line).await {
            Ok(0) => None,
            Ok(_) => Some(line.trim().to_string()),
            Err(_) => None,
        }
    }
}

impl Default for TerminalConsentCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConsentCollector for TerminalConsentCollector {
    async fn collect(&self, prompt: PermissionPrompt) -> ConsentDecision {
        self.send("").await;
        self.send(&format!("⚠️  PERMISSION REQUEST: {}", prompt.justification))
            .await;
        self.send(&format!(
            "    action: {}  category: {}  risk: {}",
            prompt.action_id, prompt.category, prompt.risk_tier
        ))
        .await;
        if !prompt.host_requirements.is_empty() {
            self.send(&format!(
                "    host permissions involved: {}",
                prompt.host_requirements.join(", ")
            ))
            .await;
        }
        self.send("Allow? [y] once / [c] whole category / [t <seconds>] timed / [n] deny: ")
            .await;

        match self.receive().await {
            Some(answer) => parse_decision(&answer),
            None => ConsentDecision::deny(),
        }
    }
}

/// Parse a user answer into a consent decision. Anything unrecognized is a
/// denial.
pub fn parse_decision(answer: &str) -> ConsentDecision {
    let answer = answer.trim().to_lowercase();
    let mut parts = answer.split_whitespace();

    match parts.next() {
        Some("y") | Some("yes") => ConsentDecision::approve(ConsentScope::Once),
        Some("c") | Some("category") | Some("a") | Some("always") => {
            ConsentDecision::approve(ConsentScope::Category)
        }
        Some("t") | Some("timed") => match parts.next().and_then(|s| s.parse::<u64>().ok()) {
            Some(secs) if secs > 0 => {
                ConsentDecision::approve(ConsentScope::CategoryTimed(Duration::from_secs(secs)))
            }
            _ => ConsentDecision::deny(),
        },
        _ => ConsentDecision::deny(),
    }
}
