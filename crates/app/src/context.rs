//! Explicit application context.
//!
//! One `AppContext` owns the identity store for one running shell. It starts
//! empty (resolving), follows the auth collaborator's notifications on a
//! background task, and is reset on sign-out. Nothing here is global.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use dsl_auth::{AccessError, AccessGate, GateDecision, IdentityStore, Navigator, Principal, RoutePolicy, SessionUser};
use dsl_core::RoutePath;
use dsl_infra::{
    AuthCollaborator, Collection, Credentials, DataBackend, Filter, ProfileResolver, Record, SessionSync,
    SignUpAttributes,
};

use crate::config::AppConfig;
use crate::error::{AppError, ConfigError};
use crate::views;

/// Upper bound on waiting for a sign-in to show up in the identity store.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct AppContext {
    store: Arc<IdentityStore>,
    policy: Arc<RoutePolicy>,
    gate: AccessGate,
    auth: Arc<dyn AuthCollaborator>,
    backend: Arc<dyn DataBackend>,
    listener: JoinHandle<()>,
}

impl AppContext {
    /// Load and validate the route policy, then start following sessions.
    pub async fn start(
        config: &AppConfig,
        auth: Arc<dyn AuthCollaborator>,
        backend: Arc<dyn DataBackend>,
    ) -> Result<Self, ConfigError> {
        let policy = config.load_policy()?;
        Ok(Self::with_policy(policy, auth, backend).await)
    }

    pub async fn with_policy(
        policy: RoutePolicy,
        auth: Arc<dyn AuthCollaborator>,
        backend: Arc<dyn DataBackend>,
    ) -> Self {
        let store = Arc::new(IdentityStore::new());
        let sync = Arc::new(SessionSync::new(
            Arc::clone(&store),
            Arc::clone(&auth),
            ProfileResolver::new(Arc::clone(&backend)),
        ));

        // Subscribe before reading the current session so nothing falls between.
        let listener = Arc::clone(&sync).spawn();
        sync.bootstrap().await;

        let policy = Arc::new(policy);
        Self {
            store,
            gate: AccessGate::new(Arc::clone(&policy)),
            policy,
            auth,
            backend,
            listener,
        }
    }

    pub fn identity(&self) -> &Arc<IdentityStore> {
        &self.store
    }

    pub fn policy(&self) -> &Arc<RoutePolicy> {
        &self.policy
    }

    pub fn gate(&self) -> &AccessGate {
        &self.gate
    }

    pub fn principal(&self) -> Arc<Principal> {
        self.store.current()
    }

    /// Gate decision for a requested location.
    pub fn navigate(&self, path: &str) -> Result<GateDecision, AppError> {
        let path = RoutePath::parse(path)?;
        Ok(self.gate.decide(&self.store.current(), &path))
    }

    /// A navigator already showing the current principal's links.
    pub fn navigator(&self) -> Navigator {
        let mut navigator = Navigator::new(Arc::clone(&self.policy));
        navigator.observe(&self.store.snapshot());
        navigator
    }

    /// Sign in and wait until the resulting identity is established.
    pub async fn sign_in(&self, credentials: &Credentials) -> Result<Arc<Principal>, AccessError> {
        let before = self.store.snapshot().generation();
        self.auth.sign_in(credentials).await?;
        self.settled_after(before).await
    }

    /// Sign out. The store is reset immediately, before the provider's own
    /// notification arrives.
    pub async fn sign_out(&self) -> Result<(), AccessError> {
        let result = self.auth.sign_out().await;
        self.store.clear();
        result.map_err(AccessError::from)
    }

    pub async fn sign_up(
        &self,
        credentials: &Credentials,
        attributes: &SignUpAttributes,
    ) -> Result<SessionUser, AccessError> {
        Ok(self.auth.sign_up(credentials, attributes).await?)
    }

    /// Wait for the identity store to settle.
    pub async fn settled(&self) -> Result<Arc<Principal>, AccessError> {
        let snapshot = self.store.snapshot();
        if snapshot.principal().is_established {
            return Ok(snapshot.principal_arc());
        }
        self.settled_after(snapshot.generation().saturating_sub(1)).await
    }

    /// Records backing a guarded view.
    ///
    /// Only declared views that read `collection` serve it, and only to a
    /// principal the gate admits to that view.
    pub async fn records(
        &self,
        view: &str,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Vec<Record>, AppError> {
        let path = RoutePath::parse(view)?;
        let served = match views::find(&path) {
            Some(view) if self.policy.is_known(&path) => view,
            _ => return Err(AppError::UnknownView(path)),
        };
        if !served.serves(collection) {
            tracing::warn!(view = %path, %collection, "collection requested through a view that does not read it");
            return Err(AppError::NotServed { view: path, collection });
        }

        self.gate.authorize(&self.store.current(), &path)?;
        Ok(self.backend.select(collection, filter).await?)
    }

    async fn settled_after(&self, generation: u64) -> Result<Arc<Principal>, AccessError> {
        let mut watch = self.store.subscribe();
        let wait = async move {
            let mut snapshot = watch.latest();
            loop {
                if snapshot.generation() > generation && snapshot.principal().is_established {
                    return Ok::<_, AccessError>(snapshot.principal_arc());
                }
                snapshot = watch
                    .changed()
                    .await
                    .ok_or_else(|| AccessError::identity_resolution("identity store closed"))?;
            }
        };

        tokio::time::timeout(SETTLE_TIMEOUT, wait)
            .await
            .map_err(|_| AccessError::identity_resolution("timed out waiting for the session to resolve"))?
    }
}

impl Drop for AppContext {
    fn drop(&mut self) {
        self.listener.abort();
    }
}
