use crate::grant::{PermissionGrant, ScopeKind};
use crate::store::GrantStore;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, info, warn};
use warden_policy::Category;

/// Result of a registry lookup, distinguishing "nothing ever covered this"
/// from "only an expired grant covers this" for audit reasons.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Active(PermissionGrant),
    Expired,
    Miss,
}

/// Stores, looks up, revokes, and expires permission grants.
///
/// Writers (`issue`, `revoke_*`, `consume`, `purge_expired`) take the write
/// lock; lookups share the read lock. A lookup that starts after a revoke
/// returns can therefore never observe the revoked grant as active.
pub struct GrantRegistry {
    grants: RwLock<Vec<PermissionGrant>>,
    store: Option<GrantStore>,
}

impl GrantRegistry {
    /// Registry without persistence; all grants are session-scoped.
    pub fn in_memory() -> Self {
        Self {
            grants: RwLock::new(Vec::new()),
            store: None,
        }
    }

    /// Registry backed by an on-disk store. The flag reports whether the
    /// persisted state was unreadable and the registry started empty, so the
    /// caller can record a warning audit entry.
    pub fn with_store(store: GrantStore) -> (Self, bool) {
        let (grants, recovered) = store.load_or_recover();
        if recovered {
            warn!("Grant registry recovered from corrupt store; starting empty");
        } else {
            info!("Grant registry loaded {} persisted grant(s)", grants.len());
        }

        (
            Self {
                grants: RwLock::new(grants),
                store: Some(store),
            },
            recovered,
        )
    }

    /// Insert a grant, superseding any active grant for the same coverage.
    ///
    /// For category scopes the supersession key is (category, scope kind);
    /// for single-action scopes the exact action id is part of the key.
    /// Returns the new grant's id.
    pub fn issue(&self, grant: PermissionGrant) -> String {
        let grant_id = grant.grant_id.clone();
        let mut grants = self.grants.write();

        for existing in grants.iter_mut() {
            if existing.revoked || existing.category != grant.category {
                continue;
            }
            if existing.scope.kind() != grant.scope.kind() {
                continue;
            }
            if existing.scope.kind() == ScopeKind::SingleAction && existing.scope != grant.scope {
                continue;
            }
            debug!(
                "Superseding grant {} for category {}",
                existing.grant_id, existing.category
            );
            existing.revoked = true;
        }

        info!(
            "Issued grant {} ({} / {:?})",
            grant.grant_id,
            grant.category,
            grant.scope.kind()
        );
        grants.push(grant);
        self.persist(&grants);
        grant_id
    }

    /// Most specific active grant covering the action, if any.
    ///
    /// Precedence: single-action over category-timed over category; between
    /// equally specific grants the one with longer remaining validity wins.
    pub fn lookup(
        &self,
        action_id: &str,
        category: Category,
        now: DateTime<Utc>,
    ) -> Option<PermissionGrant> {
        match self.lookup_outcome(action_id, category, now) {
            LookupOutcome::Active(grant) => Some(grant),
            _ => None,
        }
    }

    /// Lookup that distinguishes an expired-only match from a plain miss.
    pub fn lookup_outcome(
        &self,
        action_id: &str,
        category: Category,
        now: DateTime<Utc>,
    ) -> LookupOutcome {
        let grants = self.grants.read();

        let best = grants
            .iter()
            .filter(|g| g.covers(action_id, category) && g.is_active(now))
            .max_by_key(|g| (g.scope.specificity(), g.remaining_validity_ms(now)));

        if let Some(grant) = best {
            return LookupOutcome::Active(grant.clone());
        }

        let expired_only = grants
            .iter()
            .any(|g| g.covers(action_id, category) && !g.revoked && !g.is_active(now));

        if expired_only {
            LookupOutcome::Expired
        } else {
            LookupOutcome::Miss
        }
    }

    /// Consume a single-action grant at dispatch time.
    ///
    /// Returns true exactly once per grant: the call marks the grant revoked
    /// under the write lock, so a concurrent dispatch attempt observes it as
    /// spent and fails closed.
    pub fn consume(&self, grant_id: &str, now: DateTime<Utc>) -> bool {
        let mut grants = self.grants.write();

        let Some(grant) = grants.iter_mut().find(|g| g.grant_id == grant_id) else {
            return false;
        };
        if grant.scope.kind() != ScopeKind::SingleAction || !grant.is_active(now) {
            return false;
        }

        grant.revoked = true;
        debug!("Consumed single-action grant {}", grant_id);
        self.persist(&grants);
        true
    }

    /// Revoke all active grants for a category. Idempotent.
    pub fn revoke_category(&self, category: Category) -> usize {
        self.revoke_where(|g| g.category == category)
    }

    /// Revoke active single-action grants for an exact action id. Idempotent.
    pub fn revoke_action(&self, action_id: &str) -> usize {
        self.revoke_where(|g| {
            matches!(&g.scope, crate::grant::GrantScope::SingleAction { action_id: granted } if granted == action_id)
        })
    }

    /// Revoke everything. Session teardown.
    pub fn revoke_all(&self) -> usize {
        self.revoke_where(|_| true)
    }

    /// Revoke the session-scoped class of grants: single-action grants that
    /// were approved but never dispatched.
    pub fn revoke_session_scoped(&self) -> usize {
        self.revoke_where(|g| g.scope.kind() == ScopeKind::SingleAction)
    }

    fn revoke_where<F: Fn(&PermissionGrant) -> bool>(&self, predicate: F) -> usize {
        let mut grants = self.grants.write();
        let mut revoked = 0;

        for grant in grants.iter_mut() {
            if !grant.revoked && predicate(grant) {
                grant.revoked = true;
                revoked += 1;
            }
        }

        if revoked > 0 {
            info!("Revoked {} grant(s)", revoked);
            self.persist(&grants);
        }
        revoked
    }

    /// Mark timed-out grants revoked. Cleanup only: lookups already check
    /// expiry, so correctness never depends on this running.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut grants = self.grants.write();
        let mut purged = 0;

        for grant in grants.iter_mut() {
            if !grant.revoked && !grant.is_active(now) {
                grant.revoked = true;
                purged += 1;
            }
        }

        if purged > 0 {
            debug!("Expiry sweep revoked {} grant(s)", purged);
            self.persist(&grants);
        }
        purged
    }

    pub fn active_count(&self, now: DateTime<Utc>) -> usize {
        self.grants.read().iter().filter(|g| g.is_active(now)).count()
    }

    /// Copy of every record, revoked ones included.
    pub fn snapshot(&self) -> Vec<PermissionGrant> {
        self.grants.read().clone()
    }

    fn persist(&self, grants: &[PermissionGrant]) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(grants) {
                // Degraded mode: grants stay in memory, denial-by-default is
                // unaffected, so log and continue.
                warn!("Grant store write failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grant::GrantScope;
    use chrono::Duration;

    #[test]
    fn lookup_on_empty_registry_misses() {
        let registry = GrantRegistry::in_memory();
        let outcome = registry.lookup_outcome("open_safari", Category::BrowserControl, Utc::now());
        assert_eq!(outcome, LookupOutcome::Miss);
    }

    #[test]
    fn category_grant_covers_other_actions_in_category() {
        let registry = GrantRegistry::in_memory();
        let now = Utc::now();
        registry.issue(PermissionGrant::category(Category::BrowserControl, now));

        assert!(registry.lookup("open_safari", Category::BrowserControl, now).is_some());
        assert!(registry.lookup("open_chrome", Category::BrowserControl, now).is_some());
        assert!(registry.lookup("read_notes", Category::FileAccess, now).is_none());
    }

    #[test]
    fn issuing_supersedes_same_coverage() {
        let registry = GrantRegistry::in_memory();
        let now = Utc::now();

        let first = registry.issue(PermissionGrant::category(Category::FileAccess, now));
        let second = registry.issue(PermissionGrant::category(Category::FileAccess, now));

        let active: Vec<_> = registry
            .snapshot()
            .into_iter()
            .filter(|g| g.is_active(now))
            .collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].grant_id, second);
        assert_ne!(active[0].grant_id, first);
    }

    #[test]
    fn supersession_keys_single_action_grants_by_action_id() {
        let registry = GrantRegistry::in_memory();
        let now = Utc::now();

        registry.issue(PermissionGrant::single_action(
            Category::BrowserControl,
            "open_safari",
            now,
        ));
        registry.issue(PermissionGrant::single_action(
            Category::BrowserControl,
            "open_chrome",
            now,
        ));

        // Different action ids coexist; a reissue for the same id supersedes.
        assert_eq!(registry.active_count(now), 2);
        registry.issue(PermissionGrant::single_action(
            Category::BrowserControl,
            "open_safari",
            now,
        ));
        assert_eq!(registry.active_count(now), 2);
    }

    #[test]
    fn precedence_prefers_most_specific() {
        let registry = GrantRegistry::in_memory();
        let now = Utc::now();

        registry.issue(PermissionGrant::category(Category::FileAccess, now));
        registry.issue(PermissionGrant::category_timed(
            Category::FileAccess,
            now,
            Duration::seconds(300),
        ));
        let single = registry.issue(PermissionGrant::single_action(
            Category::FileAccess,
            "read_notes",
            now,
        ));

        let found = registry.lookup("read_notes", Category::FileAccess, now).unwrap();
        assert_eq!(found.grant_id, single);
        assert_eq!(found.scope.kind(), ScopeKind::SingleAction);

        // An action not covered by the single-action grant falls back to the
        // timed grant, which outranks the untimed category grant.
        let other = registry.lookup("write_notes", Category::FileAccess, now).unwrap();
        assert_eq!(other.scope.kind(), ScopeKind::CategoryTimed);
    }

    #[test]
    fn consume_spends_a_single_action_grant_exactly_once() {
        let registry = GrantRegistry::in_memory();
        let now = Utc::now();
        let grant_id = registry.issue(PermissionGrant::single_action(
            Category::BrowserControl,
            "open_safari",
            now,
        ));

        assert!(registry.consume(&grant_id, now));
        assert!(!registry.consume(&grant_id, now));
        assert!(registry.lookup("open_safari", Category::BrowserControl, now).is_none());
    }

    #[test]
    fn consume_rejects_category_grants() {
        let registry = GrantRegistry::in_memory();
        let now = Utc::now();
        let grant_id = registry.issue(PermissionGrant::category(Category::BrowserControl, now));
        assert!(!registry.consume(&grant_id, now));
        // The category grant stays active.
        assert!(registry.lookup("open_safari", Category::BrowserControl, now).is_some());
    }

    #[test]
    fn expired_grant_reports_expired_not_miss() {
        let registry = GrantRegistry::in_memory();
        let now = Utc::now();
        registry.issue(PermissionGrant::category_timed(
            Category::BrowserControl,
            now,
            Duration::seconds(60),
        ));

        let later = now + Duration::seconds(61);
        assert_eq!(
            registry.lookup_outcome("open_safari", Category::BrowserControl, later),
            LookupOutcome::Expired
        );
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let registry = GrantRegistry::in_memory();
        let now = Utc::now();
        registry.issue(PermissionGrant::category_timed(
            Category::BrowserControl,
            now,
            Duration::seconds(60),
        ));

        let just_before = now + Duration::seconds(60) - Duration::milliseconds(1);
        assert!(registry.lookup("open_safari", Category::BrowserControl, just_before).is_some());

        let boundary = now + Duration::seconds(60);
        assert!(registry.lookup("open_safari", Category::BrowserControl, boundary).is_none());
    }

    #[test]
    fn revoke_category_is_idempotent() {
        let registry = GrantRegistry::in_memory();
        let now = Utc::now();
        registry.issue(PermissionGrant::category(Category::FileAccess, now));

        assert_eq!(registry.revoke_category(Category::FileAccess), 1);
        assert_eq!(registry.revoke_category(Category::FileAccess), 0);
        assert!(registry.lookup("read_notes", Category::FileAccess, now).is_none());
    }

    #[test]
    fn revoke_action_targets_only_that_single_action_grant() {
        let registry = GrantRegistry::in_memory();
        let now = Utc::now();
        registry.issue(PermissionGrant::single_action(
            Category::BrowserControl,
            "open_safari",
            now,
        ));
        registry.issue(PermissionGrant::category(Category::BrowserControl, now));

        assert_eq!(registry.revoke_action("open_safari"), 1);
        assert_eq!(registry.revoke_action("open_safari"), 0);
        // The category grant still authorizes the action.
        assert!(registry.lookup("open_safari", Category::BrowserControl, now).is_some());
    }

    #[test]
    fn revoked_grant_is_not_resurrected_by_purge() {
        let registry = GrantRegistry::in_memory();
        let now = Utc::now();
        registry.issue(PermissionGrant::category(Category::FileAccess, now));
        registry.revoke_category(Category::FileAccess);
        registry.purge_expired(now);

        assert_eq!(registry.active_count(now), 0);
    }

    #[test]
    fn purge_marks_only_expired_grants() {
        let registry = GrantRegistry::in_memory();
        let now = Utc::now();
        registry.issue(PermissionGrant::category(Category::FileAccess, now));
        registry.issue(PermissionGrant::category_timed(
            Category::BrowserControl,
            now,
            Duration::seconds(10),
        ));

        let later = now + Duration::seconds(11);
        assert_eq!(registry.purge_expired(later), 1);
        assert!(registry.lookup("read_notes", Category::FileAccess, later).is_some());
        assert!(registry.lookup("open_safari", Category::BrowserControl, later).is_none());
    }

    #[test]
    fn revoke_session_scoped_leaves_category_grants() {
        let registry = GrantRegistry::in_memory();
        let now = Utc::now();
        registry.issue(PermissionGrant::single_action(
            Category::BrowserControl,
            "open_safari",
            now,
        ));
        registry.issue(PermissionGrant::category(Category::FileAccess, now));

        assert_eq!(registry.revoke_session_scoped(), 1);
        assert!(registry.lookup("open_safari", Category::BrowserControl, now).is_none());
        assert!(registry.lookup("read_notes", Category::FileAccess, now).is_some());
    }

    #[test]
    fn lookup_after_revoke_never_sees_revoked_grant() {
        use std::sync::Arc;
        use std::thread;

        let registry = Arc::new(GrantRegistry::in_memory());
        let now = Utc::now();
        registry.issue(PermissionGrant::category(Category::FileAccess, now));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    registry.revoke_category(Category::FileAccess);
                    // The revoke call has returned; a fresh lookup must miss.
                    assert!(registry.lookup("read_notes", Category::FileAccess, now).is_none());
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn matches_scope_field_shapes() {
        let now = Utc::now();
        let grant = PermissionGrant::single_action(Category::FileAccess, "read_notes", now);
        match &grant.scope {
            GrantScope::SingleAction { action_id } => assert_eq!(action_id, "read_notes"),
            other => panic!("unexpected scope: {:?}", other),
        }
    }
}
