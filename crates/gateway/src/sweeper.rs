//! Background expiry sweep over the grant registry.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use warden_registry::GrantRegistry;

/// Periodic task marking timed-out grants revoked.
///
/// Cleanup only: lookups already check expiry lazily, so correctness never
/// depends on the sweep running. The task touches grants, never requests.
pub struct ExpirySweeper {
    handle: JoinHandle<()>,
}

impl ExpirySweeper {
    pub fn start(registry: Arc<GrantRegistry>, period: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let purged = registry.purge_expired(Utc::now());
                if purged > 0 {
                    debug!("Expiry sweep revoked {} grant(s)", purged);
                }
            }
        });

        Self { handle }
    }

    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
