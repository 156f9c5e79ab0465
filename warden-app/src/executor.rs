//! Local executor adapters for a handful of read-only actions.
//!
//! The automation mechanics live outside the core; this executor implements
//! just enough to drive the gateway end to end from the terminal.

use async_trait::async_trait;
use sysinfo::System;
use tracing::info;
use warden_gateway::{ActionExecutor, ExecutionOrder, ExecutionResult};

const MAX_LISTED_PROCESSES: usize = 20;
const MAX_READ_BYTES: usize = 4096;

pub struct SystemExecutor;

impl SystemExecutor {
    pub fn new() -> Self {
        Self
    }

    fn list_processes(&self) -> ExecutionResult {
        let mut system = System::new_all();
        system.refresh_all();

        let mut names: Vec<String> = system
            .processes()
            .values()
            .map(|process| process.name().to_string())
            .collect();
        names.sort_unstable();
        names.dedup();

        let total = names.len();
        let shown: Vec<_> = names.into_iter().take(MAX_LISTED_PROCESSES).collect();
        ExecutionResult::success(Some(format!(
            "{} distinct processes (showing {}): {}",
            total,
            shown.len(),
            shown.join(", ")
        )))
    }

    fn list_files(&self, order: &ExecutionOrder) -> ExecutionResult {
        let path = order
            .params
            .get("path")
            .and_then(|v| v.as_str())
            .unwrap_or(".");

        match std::fs::read_dir(path) {
            Ok(entries) => {
                let mut names: Vec<String> = entries
                    .filter_map(|entry| entry.ok())
                    .map(|entry| entry.file_name().to_string_lossy().to_string())
                    .collect();
                names.sort_unstable();
                ExecutionResult::success(Some(format!(
                    "{} entries in {}: {}",
                    names.len(),
                    path,
                    names.join(", ")
                )))
            }
            Err(e) => ExecutionResult::failure(&format!("failed to list {}: {}", path, e)),
        }
    }

    fn read_file(&self, order: &ExecutionOrder) -> ExecutionResult {
        let Some(path) = order.params.get("path").and_then(|v| v.as_str()) else {
            return ExecutionResult::failure("file_read requires a 'path' parameter");
        };

        match std::fs::read_to_string(path) {
            Ok(content) => {
                let truncated: String = content.chars().take(MAX_READ_BYTES).collect();
                ExecutionResult::success(Some(truncated))
            }
            Err(e) => ExecutionResult::failure(&format!("failed to read {}: {}", path, e)),
        }
    }
}

impl Default for SystemExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionExecutor for SystemExecutor {
    async fn execute(&self, order: ExecutionOrder) -> ExecutionResult {
        info!(
            "Executing {} for request {} under grant {}",
            order.action_id, order.request_id, order.grant_id
        );

        match order.action_id.as_str() {
            "app_list" => self.list_processes(),
            "file_list" => self.list_files(&order),
            "file_read" => self.read_file(&order),
            other => {
                ExecutionResult::failure(&format!("no local adapter for action '{}'", other))
            }
        }
    }
}
