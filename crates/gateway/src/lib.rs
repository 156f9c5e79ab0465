//! Permission-gated execution core.
//!
//! Every action request passes through the [`PermissionGateway`]: category
//! resolution, grant lookup, interactive consent when no grant covers the
//! action, a durable audit write, and only then dispatch to the executor.

pub mod gateway;
pub mod interfaces;
pub mod metrics;
pub mod state;
pub mod sweeper;
pub mod types;

pub use gateway::{GatewayConfig, GatewayResponse, PermissionGateway};
pub use interfaces::{ActionExecutor, ConsentCollector};
pub use state::RequestState;
pub use sweeper::ExpirySweeper;
pub use types::{
    ActionRequest, ConsentDecision, ConsentScope, ExecutionOrder, ExecutionResult,
    PermissionPrompt,
};
