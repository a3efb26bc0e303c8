//! Role-scoped navigation.
//!
//! Links are derived from the route policy on every identity change and are
//! never carried over from a previous principal.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::identity::IdentitySnapshot;
use crate::{Principal, RoutePolicy};

/// Icon reference resolved by the presentation layer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IconRef {
    Home,
    Truck,
    Compass,
    DollarSign,
    User,
    Users,
    Settings,
    FileText,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavLink {
    pub path: dsl_core::RoutePath,
    pub label: String,
    pub icon: IconRef,
}

/// Navigation presenter state.
///
/// Hidden unless the principal is established and holds a valid role.
#[derive(Debug, Clone)]
pub struct Navigator {
    policy: Arc<RoutePolicy>,
    revision: Option<u64>,
    links: Vec<NavLink>,
}

impl Navigator {
    pub fn new(policy: Arc<RoutePolicy>) -> Self {
        Self {
            policy,
            revision: None,
            links: Vec::new(),
        }
    }

    /// Pure derivation used by [`Navigator::observe`].
    pub fn links_for(policy: &RoutePolicy, principal: &Principal) -> Vec<NavLink> {
        if !principal.is_established {
            return Vec::new();
        }
        policy.nav_links_for(principal.role())
    }

    /// Apply an identity snapshot. Snapshots older than the last applied one
    /// are ignored; returns whether the snapshot was applied.
    pub fn observe(&mut self, snapshot: &IdentitySnapshot) -> bool {
        if self.revision.is_some_and(|seen| snapshot.revision() <= seen) {
            tracing::trace!(
                revision = snapshot.revision(),
                "ignoring stale identity snapshot"
            );
            return false;
        }

        self.links = Self::links_for(&self.policy, snapshot.principal());
        self.revision = Some(snapshot.revision());
        true
    }

    pub fn is_visible(&self) -> bool {
        !self.links.is_empty()
    }

    pub fn links(&self) -> &[NavLink] {
        &self.links
    }
}

#[cfg(test)]
mod tests {
    use dsl_core::UserId;

    use super::*;
    use crate::identity::IdentityStore;
    use crate::policy::tests::builtin;
    use crate::Role;

    #[test]
    fn hidden_until_established_with_role() {
        let store = IdentityStore::new();
        let mut nav = Navigator::new(Arc::new(builtin()));

        assert!(nav.observe(&store.snapshot()));
        assert!(!nav.is_visible());

        store.clear();
        nav.observe(&store.snapshot());
        assert!(!nav.is_visible());

        let pending = store.begin();
        store.commit(pending, Principal::authenticated(UserId::new(), "d@x.io", Role::Driver));
        nav.observe(&store.snapshot());
        assert!(nav.is_visible());
        assert_eq!(nav.links()[0].path.as_str(), "/driver-dashboard");
    }

    #[test]
    fn role_change_replaces_links_wholesale() {
        let store = IdentityStore::new();
        let mut nav = Navigator::new(Arc::new(builtin()));

        let pending = store.begin();
        store.commit(pending, Principal::authenticated(UserId::new(), "a@x.io", Role::Admin));
        nav.observe(&store.snapshot());
        let admin_links = nav.links().len();

        store.clear();
        nav.observe(&store.snapshot());
        assert!(nav.links().is_empty());

        let pending = store.begin();
        nav.observe(&store.snapshot());
        assert!(nav.links().is_empty(), "resolving state shows nothing");

        store.commit(pending, Principal::authenticated(UserId::new(), "b@x.io", Role::Broker));
        nav.observe(&store.snapshot());
        assert!(nav.links().len() < admin_links);
        assert!(nav.links().iter().all(|l| l.path.as_str() != "/payroll"));
    }

    #[test]
    fn stale_snapshot_is_ignored() {
        let store = IdentityStore::new();
        let mut nav = Navigator::new(Arc::new(builtin()));

        let pending = store.begin();
        store.commit(pending, Principal::authenticated(UserId::new(), "d@x.io", Role::Driver));
        let old = store.snapshot();

        let pending = store.begin();
        store.commit(pending, Principal::authenticated(UserId::new(), "b@x.io", Role::Broker));
        assert!(nav.observe(&store.snapshot()));
        assert!(!nav.observe(&old));
        assert_eq!(nav.links()[0].path.as_str(), "/broker-dashboard");
    }

    #[test]
    fn icon_refs_are_kebab_case() {
        assert_eq!(
            serde_json::to_string(&IconRef::DollarSign).unwrap(),
            "\"dollar-sign\""
        );
    }
}
