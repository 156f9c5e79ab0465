use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use warden_policy::Category;

/// Schema version for persisted grant records.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// What a grant covers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "scope", rename_all = "kebab-case")]
pub enum GrantScope {
    /// One specific action id, consumed on its first dispatch.
    SingleAction { action_id: String },
    /// Every action in the category, until revoked.
    Category,
    /// Every action in the category, until the grant expires.
    CategoryTimed,
}

/// Scope kind without payload, used for supersession matching and precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    SingleAction,
    Category,
    CategoryTimed,
}

impl GrantScope {
    pub fn kind(&self) -> ScopeKind {
        match self {
            GrantScope::SingleAction { .. } => ScopeKind::SingleAction,
            GrantScope::Category => ScopeKind::Category,
            GrantScope::CategoryTimed => ScopeKind::CategoryTimed,
        }
    }

    /// Precedence when several grants could authorize the same action.
    pub fn specificity(&self) -> u8 {
        match self {
            GrantScope::SingleAction { .. } => 3,
            GrantScope::CategoryTimed => 2,
            GrantScope::Category => 1,
        }
    }
}

/// A recorded authorization covering one action or a category.
///
/// Mutated only by revocation (explicit, supersession, consumption, or
/// expiry sweep); never resurrected afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PermissionGrant {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub grant_id: String,
    pub category: Category,
    #[serde(flatten)]
    pub scope: GrantScope,
    pub issued_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked: bool,
}

impl PermissionGrant {
    /// Grant for exactly one action id, no expiry, consumed on dispatch.
    pub fn single_action(category: Category, action_id: &str, now: DateTime<Utc>) -> Self {
        Self::new(
            category,
            GrantScope::SingleAction {
                action_id: action_id.to_string(),
            },
            now,
            None,
        )
    }

    /// Category-wide grant without expiry.
    pub fn category(category: Category, now: DateTime<Utc>) -> Self {
        Self::new(category, GrantScope::Category, now, None)
    }

    /// Category-wide grant valid for `ttl` from `now`.
    pub fn category_timed(category: Category, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self::new(category, GrantScope::CategoryTimed, now, Some(now + ttl))
    }

    fn new(
        category: Category,
        scope: GrantScope,
        now: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            grant_id: uuid::Uuid::new_v4().to_string(),
            category,
            scope,
            issued_at: now,
            expires_at,
            revoked: false,
        }
    }

    /// Active iff not revoked and not past expiry. The expiry instant itself
    /// counts as inactive (strict `<`).
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at.map_or(true, |expiry| now < expiry)
    }

    /// Whether this grant can authorize the given action.
    pub fn covers(&self, action_id: &str, category: Category) -> bool {
        if self.category != category {
            return false;
        }
        match &self.scope {
            GrantScope::SingleAction { action_id: granted } => granted == action_id,
            GrantScope::Category | GrantScope::CategoryTimed => true,
        }
    }

    /// Remaining validity in milliseconds; grants without expiry report
    /// `i64::MAX` so they outrank any timed grant in tie-breaks.
    pub fn remaining_validity_ms(&self, now: DateTime<Utc>) -> i64 {
        match self.expires_at {
            None => i64::MAX,
            Some(expiry) => (expiry - now).num_milliseconds(),
        }
    }

    pub fn validate_version(&self) -> Result<(), String> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(format!(
                "Schema version mismatch: expected {}, got {}",
                SCHEMA_VERSION, self.schema_version
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timed_grant_active_strictly_before_expiry() {
        let now = Utc::now();
        let grant = PermissionGrant::category_timed(Category::BrowserControl, now, Duration::seconds(60));

        assert!(grant.is_active(now));
        assert!(grant.is_active(now + Duration::milliseconds(59_999)));
        assert!(!grant.is_active(now + Duration::seconds(60)));
        assert!(!grant.is_active(now + Duration::seconds(61)));
    }

    #[test]
    fn untimed_grant_never_expires() {
        let now = Utc::now();
        let grant = PermissionGrant::category(Category::FileAccess, now);
        assert!(grant.is_active(now + Duration::days(365)));
    }

    #[test]
    fn revoked_grant_is_inactive() {
        let now = Utc::now();
        let mut grant = PermissionGrant::category(Category::FileAccess, now);
        grant.revoked = true;
        assert!(!grant.is_active(now));
    }

    #[test]
    fn single_action_covers_only_its_action() {
        let now = Utc::now();
        let grant = PermissionGrant::single_action(Category::BrowserControl, "open_safari", now);

        assert!(grant.covers("open_safari", Category::BrowserControl));
        assert!(!grant.covers("open_chrome", Category::BrowserControl));
        assert!(!grant.covers("open_safari", Category::FileAccess));
    }

    #[test]
    fn category_grant_covers_any_action_in_category() {
        let now = Utc::now();
        let grant = PermissionGrant::category(Category::BrowserControl, now);
        assert!(grant.covers("open_safari", Category::BrowserControl));
        assert!(grant.covers("open_chrome", Category::BrowserControl));
        assert!(!grant.covers("read_file", Category::FileAccess));
    }

    #[test]
    fn specificity_ranks_single_action_highest() {
        let now = Utc::now();
        let single = PermissionGrant::single_action(Category::FileAccess, "read_notes", now);
        let timed = PermissionGrant::category_timed(Category::FileAccess, now, Duration::seconds(60));
        let broad = PermissionGrant::category(Category::FileAccess, now);

        assert!(single.scope.specificity() > timed.scope.specificity());
        assert!(timed.scope.specificity() > broad.scope.specificity());
    }

    #[test]
    fn serde_roundtrip() {
        let now = Utc::now();
        let grant = PermissionGrant::single_action(Category::ScreenCapture, "grab_frame", now);

        let json = serde_json::to_string(&grant).unwrap();
        let parsed: PermissionGrant = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, grant);
    }

    #[test]
    fn missing_schema_version_defaults() {
        let json = r#"{
            "grant_id": "g1",
            "category": "browser-control",
            "scope": "category",
            "issued_at": "2026-01-01T00:00:00Z",
            "revoked": false
        }"#;
        let grant: PermissionGrant = serde_json::from_str(json).unwrap();
        assert_eq!(grant.schema_version, SCHEMA_VERSION);
        assert!(grant.validate_version().is_ok());
    }

    #[test]
    fn version_mismatch_is_detected() {
        let json = r#"{
            "schema_version": 99,
            "grant_id": "g1",
            "category": "browser-control",
            "scope": "category",
            "issued_at": "2026-01-01T00:00:00Z",
            "revoked": false
        }"#;
        let grant: PermissionGrant = serde_json::from_str(json).unwrap();
        assert!(grant.validate_version().is_err());
    }
}
