use crate::category::{Category, RiskTier};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolicyError {
    #[error("Unknown action type: {0}")]
    UnknownAction(String),

    #[error("Composite action contains no constituents")]
    EmptyComposite,
}

/// Static per-category policy: how to explain a request to the user and how
/// to treat its outcome.
#[derive(Debug, Clone)]
pub struct CategoryPolicy {
    pub justification_template: &'static str,
    pub risk_tier: RiskTier,
    /// Idempotent categories may be retried once after an execution failure.
    pub idempotent: bool,
    /// Host-level permissions the OS will itself demand for this category.
    /// Surfaced in prompts only; the core never checks them.
    pub host_requirements: &'static [&'static str],
}

/// Resolution of an action type against the static policy table.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub category: Category,
    pub justification: String,
    pub risk_tier: RiskTier,
}

/// Maps raw action types to categories and justification text.
///
/// The tables are built once at construction and never mutated. Resolution of
/// an unregistered action type is an error; the gateway denies such requests
/// rather than guessing a category.
pub struct PolicyResolver {
    policies: HashMap<Category, CategoryPolicy>,
    actions: HashMap<&'static str, Category>,
}

const ACTION_TABLE: &[(&str, Category)] = &[
    ("app_open", Category::ApplicationControl),
    ("app_close", Category::ApplicationControl),
    ("app_list", Category::ApplicationControl),
    ("file_read", Category::FileAccess),
    ("file_write", Category::FileAccess),
    ("file_create", Category::FileAccess),
    ("file_delete", Category::FileAccess),
    ("file_list", Category::FileAccess),
    ("folder_create", Category::FileAccess),
    ("keyboard_type", Category::InputSimulation),
    ("mouse_move", Category::InputSimulation),
    ("mouse_click", Category::InputSimulation),
    ("screen_capture", Category::ScreenCapture),
    ("screen_record", Category::ScreenCapture),
    ("browser_open", Category::BrowserControl),
    ("browser_navigate", Category::BrowserControl),
    ("browser_click", Category::BrowserControl),
    ("browser_read", Category::BrowserControl),
    ("browser_search", Category::BrowserControl),
];

impl PolicyResolver {
    /// Build the resolver with the built-in policy tables.
    pub fn builtin() -> Self {
        let mut policies = HashMap::new();

        policies.insert(
            Category::ApplicationControl,
            CategoryPolicy {
                justification_template:
                    "The agent wants to control an application ({action}).",
                risk_tier: RiskTier::Standard,
                idempotent: false,
                host_requirements: &["Automation"],
            },
        );
        policies.insert(
            Category::FileAccess,
            CategoryPolicy {
                justification_template:
                    "The agent wants to access files on this machine ({action}).",
                risk_tier: RiskTier::Elevated,
                idempotent: false,
                host_requirements: &["Files and Folders"],
            },
        );
        policies.insert(
            Category::InputSimulation,
            CategoryPolicy {
                justification_template:
                    "The agent wants to simulate keyboard or mouse input ({action}).",
                risk_tier: RiskTier::Elevated,
                idempotent: false,
                host_requirements: &["Accessibility"],
            },
        );
        policies.insert(
            Category::ScreenCapture,
            CategoryPolicy {
                justification_template:
                    "The agent wants to capture the screen ({action}).",
                risk_tier: RiskTier::ReadOnly,
                idempotent: true,
                host_requirements: &["Screen Recording"],
            },
        );
        policies.insert(
            Category::BrowserControl,
            CategoryPolicy {
                justification_template:
                    "The agent wants to control the browser ({action}).",
                risk_tier: RiskTier::Standard,
                idempotent: false,
                host_requirements: &["Automation"],
            },
        );

        let actions = ACTION_TABLE.iter().copied().collect();

        Self { policies, actions }
    }

    /// Resolve an action type to its category and justification.
    pub fn resolve(&self, action_type: &str) -> Result<Resolution, PolicyError> {
        let category = self
            .actions
            .get(action_type)
            .copied()
            .ok_or_else(|| PolicyError::UnknownAction(action_type.to_string()))?;

        let policy = self.policy(category);

        Ok(Resolution {
            category,
            justification: policy.justification_template.replace("{action}", action_type),
            risk_tier: policy.risk_tier,
        })
    }

    /// Resolve a batched action to the single most restrictive category among
    /// its constituents. Any unknown constituent fails the whole batch.
    pub fn resolve_composite(&self, action_types: &[&str]) -> Result<Resolution, PolicyError> {
        if action_types.is_empty() {
            return Err(PolicyError::EmptyComposite);
        }

        let mut most_restrictive: Option<Resolution> = None;
        for action_type in action_types {
            let resolution = self.resolve(action_type)?;
            match &most_restrictive {
                Some(current) if current.category >= resolution.category => {}
                _ => most_restrictive = Some(resolution),
            }
        }

        // Non-empty input guarantees a value.
        most_restrictive.ok_or(PolicyError::EmptyComposite)
    }

    pub fn policy(&self, category: Category) -> &CategoryPolicy {
        // Every category is seeded in builtin(); the closed enum makes a miss
        // unreachable.
        &self.policies[&category]
    }

    /// Whether execution failures in this category may be retried once.
    pub fn is_idempotent(&self, category: Category) -> bool {
        self.policy(category).idempotent
    }

    pub fn known_actions(&self) -> Vec<&'static str> {
        let mut actions: Vec<_> = self.actions.keys().copied().collect();
        actions.sort_unstable();
        actions
    }
}

impl Default for PolicyResolver {
    fn default() -> Self {
        Self::builtin()
    }
}
