pub mod grant;
pub mod registry;
pub mod store;

pub use grant::{GrantScope, PermissionGrant, ScopeKind, SCHEMA_VERSION};
pub use registry::{GrantRegistry, LookupOutcome};
pub use store::{GrantStore, StoreError};
