//! Session pipeline: auth collaborator notifications → identity store.
//!
//! Notifications are accepted in arrival order (each one opens a new store
//! generation), while the profile lookups they trigger may finish in any
//! order. A lookup whose generation has been superseded is discarded by the
//! store, so the last notification always wins.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use dsl_auth::{IdentityStore, PendingIdentity, Principal, Session, validate_session};

use crate::auth_provider::{AuthCollaborator, SessionEvent, SessionEventKind};
use crate::profile::ProfileResolver;

pub struct SessionSync {
    store: Arc<IdentityStore>,
    auth: Arc<dyn AuthCollaborator>,
    profiles: ProfileResolver,
}

impl SessionSync {
    pub fn new(store: Arc<IdentityStore>, auth: Arc<dyn AuthCollaborator>, profiles: ProfileResolver) -> Self {
        Self {
            store,
            auth,
            profiles,
        }
    }

    pub fn store(&self) -> &Arc<IdentityStore> {
        &self.store
    }

    /// Resolve whatever session the provider already holds (process start).
    pub async fn bootstrap(&self) {
        let pending = self.store.begin();
        match self.auth.current_session().await {
            Ok(Some(session)) => self.resolve(pending, session).await,
            Ok(None) => {
                self.store.commit(pending, Principal::anonymous());
            }
            Err(err) => {
                self.store.fail(pending, &err.to_string());
            }
        }
    }

    /// Apply one session-changed notification and wait for it to settle.
    pub async fn on_session_changed(&self, session: Option<Session>) {
        if let Some((pending, session)) = self.accept(SessionEventKind::SignedIn, session) {
            self.resolve(pending, session).await;
        }
    }

    /// Re-establish the current session after a token refresh.
    pub async fn on_session_refreshed(&self, session: Session) {
        if let Some((pending, session)) = self.accept(SessionEventKind::TokenRefreshed, Some(session)) {
            self.resolve(pending, session).await;
        }
    }

    /// Open a generation for an incoming notification. Sign-out clears the
    /// store immediately and needs no resolution.
    ///
    /// A refresh or update of the user already established renews quietly;
    /// anything else hides the previous principal while it resolves.
    fn accept(&self, kind: SessionEventKind, session: Option<Session>) -> Option<(PendingIdentity, Session)> {
        let Some(session) = session else {
            self.store.clear();
            return None;
        };

        let renewal = matches!(kind, SessionEventKind::TokenRefreshed | SessionEventKind::UserUpdated);
        let current = self.store.current();
        let pending = if renewal && current.is_established && current.id == Some(session.user.id) {
            self.store.renew()
        } else {
            self.store.begin()
        };
        Some((pending, session))
    }

    async fn resolve(&self, pending: PendingIdentity, session: Session) {
        if let Err(err) = validate_session(&session, Utc::now()) {
            self.store.fail(pending, &err.to_string());
            return;
        }

        let principal = Principal::from_session(&session);

        if !self.store.is_current(&pending) {
            tracing::debug!(generation = pending.generation(), "skipping profile lookup for superseded session");
            return;
        }

        let principal = match self.profiles.resolve(&session, principal.role()).await {
            Ok(profile) => principal.with_display_name(profile.display_name),
            Err(err) => {
                // Access does not depend on the derived profile.
                tracing::warn!(user_id = %session.user.id, error = %err, "profile lookup failed");
                principal
            }
        };

        self.store.commit(pending, principal);
    }

    /// Follow the provider's notifications until it goes away.
    ///
    /// Each notification's resolution runs on its own task so a newer
    /// notification never waits behind an older, slower lookup.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let mut events = self.auth.subscribe();

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SessionEvent { kind, session }) => {
                        tracing::debug!(?kind, "session notification");
                        if let Some((pending, session)) = self.accept(kind, session) {
                            let this = Arc::clone(&self);
                            tokio::spawn(async move { this.resolve(pending, session).await });
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "session notifications lagged; re-reading current session");
                        self.bootstrap().await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            tracing::debug!("session notification stream closed");
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use dsl_auth::Role;

    use super::*;
    use crate::auth_provider::{Credentials, InMemoryAuthProvider, SignUpAttributes};
    use crate::backend::InMemoryDataBackend;

    async fn provider_with(users: &[(&str, &str)]) -> Arc<InMemoryAuthProvider> {
        let provider = Arc::new(InMemoryAuthProvider::new());
        for (email, role) in users {
            let user = provider
                .sign_up(&Credentials::new(*email, "hunter22"), &SignUpAttributes::default())
                .await
                .unwrap();
            provider.assign_role(user.id, role).unwrap();
        }
        provider
    }

    fn sync_for(provider: Arc<InMemoryAuthProvider>) -> SessionSync {
        SessionSync::new(
            Arc::new(IdentityStore::new()),
            provider,
            ProfileResolver::new(Arc::new(InMemoryDataBackend::new())),
        )
    }

    #[tokio::test]
    async fn bootstrap_without_session_is_anonymous() {
        let sync = sync_for(provider_with(&[]).await);
        sync.bootstrap().await;
        let principal = sync.store().current();
        assert!(principal.is_established);
        assert!(!principal.is_signed_in());
        assert!(!principal.resolution_failed);
    }

    #[tokio::test]
    async fn unreachable_provider_settles_on_sign_in_again() {
        let provider = provider_with(&[]).await;
        provider.set_reachable(false);
        let sync = sync_for(provider);
        sync.bootstrap().await;
        let principal = sync.store().current();
        assert!(principal.is_established);
        assert!(principal.resolution_failed);
    }

    #[tokio::test]
    async fn sign_in_and_out_round_trip() {
        let provider = provider_with(&[("d@dsltransport.com", "driver")]).await;
        let sync = sync_for(provider.clone());

        let session = provider
            .sign_in(&Credentials::new("d@dsltransport.com", "hunter22"))
            .await
            .unwrap();
        sync.on_session_changed(Some(session)).await;
        assert_eq!(sync.store().current().role(), Some(Role::Driver));
        assert_eq!(sync.store().current().display_name.as_deref(), Some("d"));

        sync.on_session_changed(None).await;
        let principal = sync.store().current();
        assert!(principal.is_established);
        assert_eq!(principal.id, None);
    }

    #[tokio::test]
    async fn inverted_session_window_is_a_resolution_failure() {
        let provider = Arc::new(InMemoryAuthProvider::new().with_session_ttl(Duration::seconds(-1)));
        provider
            .sign_up(&Credentials::new("e@dsltransport.com", "hunter22"), &SignUpAttributes::default())
            .await
            .unwrap();
        let session = provider
            .sign_in(&Credentials::new("e@dsltransport.com", "hunter22"))
            .await
            .unwrap();

        let sync = sync_for(provider);
        sync.on_session_changed(Some(session)).await;
        assert!(sync.store().current().resolution_failed);
        assert_eq!(sync.store().current().role(), None);
    }

    #[tokio::test]
    async fn token_refresh_keeps_the_principal_established() {
        let provider = provider_with(&[("d@dsltransport.com", "driver")]).await;
        let sync = sync_for(provider.clone());
        let session = provider
            .sign_in(&Credentials::new("d@dsltransport.com", "hunter22"))
            .await
            .unwrap();
        sync.on_session_changed(Some(session)).await;
        let before = sync.store().snapshot();

        let refreshed = provider.refresh_session().unwrap().unwrap();
        sync.on_session_refreshed(refreshed).await;

        // One publish: the renewed principal, with no resolving snapshot before it.
        let after = sync.store().snapshot();
        assert_eq!(after.revision(), before.revision() + 1);
        assert!(after.generation() > before.generation());
        assert!(after.principal().is_established);
        assert_eq!(after.principal().role(), Some(Role::Driver));
        assert_eq!(after.principal().id, before.principal().id);
    }

    #[tokio::test]
    async fn expired_refresh_settles_on_sign_in_again() {
        let provider = provider_with(&[("d@dsltransport.com", "driver")]).await;
        let sync = sync_for(provider.clone());
        let session = provider
            .sign_in(&Credentials::new("d@dsltransport.com", "hunter22"))
            .await
            .unwrap();
        sync.on_session_changed(Some(session.clone())).await;

        let now = Utc::now();
        let expired = Session {
            issued_at: now - Duration::hours(2),
            expires_at: now - Duration::hours(1),
            ..session
        };
        sync.on_session_refreshed(expired).await;

        let principal = sync.store().current();
        assert!(principal.is_established);
        assert!(principal.resolution_failed);
        assert_eq!(principal.role(), None);
    }

    #[tokio::test]
    async fn refresh_for_another_user_resolves_from_scratch() {
        let provider = provider_with(&[("d@dsltransport.com", "driver"), ("b@dsltransport.com", "broker")]).await;
        let sync = sync_for(provider.clone());
        let driver = provider
            .sign_in(&Credentials::new("d@dsltransport.com", "hunter22"))
            .await
            .unwrap();
        sync.on_session_changed(Some(driver)).await;
        let before = sync.store().snapshot();

        let broker = provider
            .sign_in(&Credentials::new("b@dsltransport.com", "hunter22"))
            .await
            .unwrap();
        sync.on_session_refreshed(broker).await;

        let after = sync.store().snapshot();
        assert_eq!(after.revision(), before.revision() + 2, "resolving snapshot is published first");
        assert_eq!(after.principal().role(), Some(Role::Broker));
    }

    #[tokio::test]
    async fn spawned_listener_renews_on_token_refresh() {
        let provider = provider_with(&[("d@dsltransport.com", "driver")]).await;
        let sync = Arc::new(sync_for(provider.clone()));
        let listener = Arc::clone(&sync).spawn();
        sync.bootstrap().await;

        let mut watch = sync.store().subscribe();
        provider
            .sign_in(&Credentials::new("d@dsltransport.com", "hunter22"))
            .await
            .unwrap();
        let established = loop {
            let snap = watch.changed().await.unwrap();
            if snap.principal().is_established && snap.principal().is_signed_in() {
                break snap;
            }
        };

        provider.refresh_session().unwrap();
        let next = watch.changed().await.unwrap();
        assert!(next.principal().is_established, "refresh exposed a resolving principal");
        assert_eq!(next.principal().role(), Some(Role::Driver));
        assert!(next.generation() > established.generation());

        listener.abort();
    }

    #[tokio::test]
    async fn unknown_role_is_established_without_access() {
        let provider = provider_with(&[("s@dsltransport.com", "superadmin")]).await;
        let sync = sync_for(provider.clone());
        let session = provider
            .sign_in(&Credentials::new("s@dsltransport.com", "hunter22"))
            .await
            .unwrap();
        sync.on_session_changed(Some(session)).await;

        let principal = sync.store().current();
        assert!(principal.is_signed_in());
        assert_eq!(principal.role(), None);
        assert!(principal.role.is_unrecognized());
    }
}
