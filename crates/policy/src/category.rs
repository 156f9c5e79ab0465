use serde::{Deserialize, Serialize};
use std::fmt;

/// Authorization category for an action.
///
/// The set is closed: an action type that does not map to one of these
/// categories is rejected by the resolver instead of creating a new bucket.
/// Variant order is the restrictiveness ranking used when a composite action
/// must collapse to a single category (later variants are more restrictive).
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    ScreenCapture,
    BrowserControl,
    ApplicationControl,
    FileAccess,
    InputSimulation,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::ScreenCapture,
        Category::BrowserControl,
        Category::ApplicationControl,
        Category::FileAccess,
        Category::InputSimulation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::ScreenCapture => "screen-capture",
            Category::BrowserControl => "browser-control",
            Category::ApplicationControl => "application-control",
            Category::FileAccess => "file-access",
            Category::InputSimulation => "input-simulation",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| format!("unknown category: {}", s))
    }
}

/// Static risk classification of a category.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum RiskTier {
    ReadOnly,
    Standard,
    Elevated,
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskTier::ReadOnly => "read-only",
            RiskTier::Standard => "standard",
            RiskTier::Elevated => "elevated",
        };
        f.write_str(s)
    }
}
