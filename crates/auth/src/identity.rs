//! Identity store: the single owned source of "who is signed in".
//!
//! One writer (the session pipeline), many synchronous readers. Every update
//! replaces the whole [`Principal`] snapshot, so readers never observe a
//! partially applied session.

use std::sync::Arc;

use tokio::sync::watch;

use crate::Principal;

/// An immutable, versioned view of the current principal.
#[derive(Debug, Clone)]
pub struct IdentitySnapshot {
    generation: u64,
    revision: u64,
    principal: Arc<Principal>,
}

impl IdentitySnapshot {
    /// Session generation this snapshot belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Strictly increasing across every publish.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn principal_arc(&self) -> Arc<Principal> {
        Arc::clone(&self.principal)
    }
}

/// Token for an in-flight session resolution.
///
/// Consumed by [`IdentityStore::commit`] or [`IdentityStore::fail`]; a token
/// whose generation has been superseded commits nothing.
#[derive(Debug)]
#[must_use = "a pending identity must be committed or failed"]
pub struct PendingIdentity {
    generation: u64,
}

impl PendingIdentity {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug)]
pub struct IdentityStore {
    tx: watch::Sender<IdentitySnapshot>,
}

impl Default for IdentityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityStore {
    /// Empty store: not established until the first session resolves.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(IdentitySnapshot {
            generation: 0,
            revision: 0,
            principal: Arc::new(Principal::resolving()),
        });
        Self { tx }
    }

    pub fn current(&self) -> Arc<Principal> {
        self.tx.borrow().principal_arc()
    }

    pub fn snapshot(&self) -> IdentitySnapshot {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> IdentityWatch {
        IdentityWatch {
            rx: self.tx.subscribe(),
        }
    }

    /// Start resolving a new session.
    ///
    /// Publishes the resolving state immediately so nothing derived from the
    /// previous principal stays visible while the new one is looked up.
    pub fn begin(&self) -> PendingIdentity {
        let mut generation = 0;
        self.tx.send_modify(|snap| {
            snap.generation += 1;
            snap.revision += 1;
            snap.principal = Arc::new(Principal::resolving());
            generation = snap.generation;
        });
        tracing::debug!(generation, "session resolution started");
        PendingIdentity { generation }
    }

    /// Start re-resolving the session already established.
    ///
    /// Opens a new generation without publishing: the current principal stays
    /// visible until the renewed one commits or fails.
    pub fn renew(&self) -> PendingIdentity {
        let mut generation = 0;
        self.tx.send_if_modified(|snap| {
            snap.generation += 1;
            generation = snap.generation;
            false
        });
        tracing::debug!(generation, "session renewal started");
        PendingIdentity { generation }
    }

    /// Publish the resolved principal unless a newer session superseded it.
    pub fn commit(&self, pending: PendingIdentity, principal: Principal) -> bool {
        let principal = Principal {
            is_established: true,
            ..principal
        };
        let applied = self.publish_if_current(pending.generation, principal);
        if applied {
            tracing::info!(generation = pending.generation, "identity established");
        } else {
            tracing::debug!(
                generation = pending.generation,
                "discarding superseded session resolution"
            );
        }
        applied
    }

    /// Resolution failed: settle on anonymous and ask the user to sign in again.
    pub fn fail(&self, pending: PendingIdentity, reason: &str) -> bool {
        let applied = self.publish_if_current(pending.generation, Principal::unresolvable());
        if applied {
            tracing::warn!(generation = pending.generation, reason, "identity resolution failed");
        }
        applied
    }

    /// Sign-out teardown: back to an established, empty principal.
    ///
    /// Also supersedes any resolution still in flight.
    pub fn clear(&self) -> u64 {
        let mut generation = 0;
        self.tx.send_modify(|snap| {
            snap.generation += 1;
            snap.revision += 1;
            snap.principal = Arc::new(Principal::anonymous());
            generation = snap.generation;
        });
        tracing::info!(generation, "identity cleared");
        generation
    }

    pub fn is_current(&self, pending: &PendingIdentity) -> bool {
        self.tx.borrow().generation == pending.generation
    }

    fn publish_if_current(&self, generation: u64, principal: Principal) -> bool {
        self.tx.send_if_modified(|snap| {
            if snap.generation != generation {
                return false;
            }
            snap.revision += 1;
            snap.principal = Arc::new(principal);
            true
        })
    }
}

/// Async subscription to identity changes.
#[derive(Debug, Clone)]
pub struct IdentityWatch {
    rx: watch::Receiver<IdentitySnapshot>,
}

impl IdentityWatch {
    /// Wait for the next published snapshot. `None` once the store is gone.
    pub async fn changed(&mut self) -> Option<IdentitySnapshot> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Latest snapshot, marking it as seen.
    pub fn latest(&mut self) -> IdentitySnapshot {
        self.rx.borrow_and_update().clone()
    }
}

#[cfg(test)]
mod tests {
    use dsl_core::UserId;

    use super::*;
    use crate::Role;

    fn driver() -> Principal {
        Principal::authenticated(UserId::new(), "driver@dsltransport.com", Role::Driver)
    }

    #[test]
    fn starts_unestablished() {
        let store = IdentityStore::new();
        assert!(!store.current().is_established);
        assert_eq!(store.snapshot().generation(), 0);
    }

    #[test]
    fn superseded_commit_is_discarded() {
        let store = IdentityStore::new();
        let first = store.begin();
        let second = store.begin();

        let broker = Principal::authenticated(UserId::new(), "b@x.io", Role::Broker);
        assert!(store.commit(second, broker));
        assert!(!store.commit(first, driver()));
        assert_eq!(store.current().role(), Some(Role::Broker));
    }

    #[test]
    fn begin_hides_previous_principal() {
        let store = IdentityStore::new();
        let pending = store.begin();
        store.commit(pending, driver());

        let _next = store.begin();
        let current = store.current();
        assert!(!current.is_established);
        assert_eq!(current.id, None);
        assert_eq!(current.role(), None);
    }

    #[test]
    fn clear_supersedes_in_flight_resolution() {
        let store = IdentityStore::new();
        let pending = store.begin();
        store.clear();
        assert!(!store.is_current(&pending));
        assert!(!store.commit(pending, driver()));
        assert!(store.current().is_established);
        assert!(!store.current().is_signed_in());
    }

    #[test]
    fn failure_settles_on_anonymous() {
        let store = IdentityStore::new();
        let pending = store.begin();
        assert!(store.fail(pending, "auth provider unreachable"));
        let current = store.current();
        assert!(current.is_established);
        assert!(current.resolution_failed);
        assert_eq!(current.role(), None);
    }

    #[test]
    fn revisions_strictly_increase() {
        let store = IdentityStore::new();
        let mut last = store.snapshot().revision();
        let pending = store.begin();
        assert!(store.snapshot().revision() > last);
        last = store.snapshot().revision();
        store.commit(pending, driver());
        assert!(store.snapshot().revision() > last);
    }

    #[test]
    fn renew_keeps_the_established_principal_visible() {
        let store = IdentityStore::new();
        let pending = store.begin();
        store.commit(pending, driver());
        let before = store.snapshot();

        let renewal = store.renew();
        let during = store.snapshot();
        assert_eq!(during.revision(), before.revision());
        assert!(during.principal().is_established);
        assert_eq!(during.principal().role(), Some(Role::Driver));

        assert!(store.commit(renewal, driver()));
        assert_eq!(store.snapshot().revision(), before.revision() + 1);
    }

    #[test]
    fn renewal_is_superseded_like_any_resolution() {
        let store = IdentityStore::new();
        let pending = store.begin();
        store.commit(pending, driver());

        let renewal = store.renew();
        store.clear();
        assert!(!store.commit(renewal, driver()));
        assert!(!store.current().is_signed_in());
    }

    #[tokio::test]
    async fn renew_does_not_wake_watchers() {
        let store = IdentityStore::new();
        let pending = store.begin();
        store.commit(pending, driver());

        let mut watch = store.subscribe();
        watch.latest();
        let renewal = store.renew();
        let woke = tokio::time::timeout(std::time::Duration::from_millis(20), watch.changed()).await;
        assert!(woke.is_err(), "renewal published a snapshot");

        store.fail(renewal, "session expired");
        let snap = watch.changed().await.unwrap();
        assert!(snap.principal().resolution_failed);
    }

    #[tokio::test]
    async fn watchers_see_whole_snapshots() {
        let store = IdentityStore::new();
        let mut watch = store.subscribe();

        let pending = store.begin();
        store.commit(pending, driver());

        let snap = watch.changed().await.unwrap();
        let principal = snap.principal();
        assert!(principal.is_established);
        assert!(principal.id.is_some());
        assert_eq!(principal.role(), Some(Role::Driver));
    }
}
