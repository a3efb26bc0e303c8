use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use argon2::{Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use password_hash::{PasswordHash, SaltString};
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use dsl_auth::claims::{FULL_NAME_KEY, ROLE_KEY};
use dsl_auth::{Role, Session, SessionUser};
use dsl_core::UserId;

use super::{AuthCollaborator, AuthError, Credentials, SessionEvent, SessionEventKind, SignUpAttributes};

const MIN_PASSWORD_LEN: usize = 6;
const EVENT_BUFFER: usize = 64;

// Low hashing cost: dev/test accounts only.
const HASH_MEMORY_KIB: u32 = 4096;

#[derive(Debug)]
struct Account {
    user: SessionUser,
    password_hash: String,
}

/// In-memory identity provider for tests/dev.
///
/// Plays both sides of the hosted provider: the client SDK surface
/// ([`AuthCollaborator`]) and the privileged server calls used to assign and
/// validate roles.
#[derive(Debug)]
pub struct InMemoryAuthProvider {
    accounts: RwLock<HashMap<String, Account>>,
    current: RwLock<Option<Session>>,
    events: broadcast::Sender<SessionEvent>,
    session_ttl: Duration,
    reachable: AtomicBool,
}

impl Default for InMemoryAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAuthProvider {
    pub fn new() -> Self {
        let (events, _rx) = broadcast::channel(EVENT_BUFFER);
        Self {
            accounts: RwLock::new(HashMap::new()),
            current: RwLock::new(None),
            events,
            session_ttl: Duration::hours(1),
            reachable: AtomicBool::new(true),
        }
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Simulate an outage: every client call fails with `Unavailable`.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Server-side role assignment (writes the authoritative channel).
    ///
    /// Takes a raw string on purpose: the provider stores whatever it is
    /// given, and validation happens on the consuming side.
    pub fn assign_role(&self, user_id: UserId, role: &str) -> Result<(), AuthError> {
        let user = self.update_user(user_id, |user| {
            user.app_metadata
                .insert(ROLE_KEY.to_string(), Value::String(role.to_string()));
        })?;
        self.notify_if_current(user);
        Ok(())
    }

    /// Check the server role against the closed set; revoke it when invalid.
    pub fn validate_role(&self, user_id: UserId) -> Result<Role, AuthError> {
        let raw = self
            .with_account(user_id, |account| {
                account.user.app_metadata.get(ROLE_KEY).cloned()
            })?
            .unwrap_or(Value::Null);

        if let Some(role) = raw.as_str().and_then(|r| r.parse::<Role>().ok()) {
            return Ok(role);
        }

        tracing::warn!(%user_id, role = %raw, "revoking invalid role");
        let user = self.update_user(user_id, |user| {
            user.app_metadata.insert(ROLE_KEY.to_string(), Value::Null);
            user.user_metadata.insert(ROLE_KEY.to_string(), Value::Null);
        })?;
        self.notify_if_current(user);

        Err(AuthError::InvalidRole(match raw {
            Value::String(s) => s,
            other => other.to_string(),
        }))
    }

    /// Re-issue the current session with a fresh time window.
    pub fn refresh_session(&self) -> Result<Option<Session>, AuthError> {
        self.ensure_reachable()?;
        let refreshed = {
            let mut current = self.current.write().map_err(|_| poisoned())?;
            let refreshed = current.as_ref().map(|s| self.issue(s.user.clone()));
            *current = refreshed.clone();
            refreshed
        };
        if refreshed.is_some() {
            self.emit(SessionEventKind::TokenRefreshed, refreshed.clone());
        }
        Ok(refreshed)
    }

    fn ensure_reachable(&self) -> Result<(), AuthError> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AuthError::Unavailable("connection refused".to_string()))
        }
    }

    fn issue(&self, user: SessionUser) -> Session {
        let now = Utc::now();
        Session {
            user,
            issued_at: now,
            expires_at: now + self.session_ttl,
        }
    }

    fn emit(&self, kind: SessionEventKind, session: Option<Session>) {
        // No subscribers is fine.
        let _ = self.events.send(SessionEvent { kind, session });
    }

    fn with_account<T>(&self, user_id: UserId, f: impl FnOnce(&Account) -> T) -> Result<T, AuthError> {
        let accounts = self.accounts.read().map_err(|_| poisoned())?;
        accounts
            .values()
            .find(|a| a.user.id == user_id)
            .map(f)
            .ok_or(AuthError::UnknownUser)
    }

    fn update_user(&self, user_id: UserId, f: impl FnOnce(&mut SessionUser)) -> Result<SessionUser, AuthError> {
        let mut accounts = self.accounts.write().map_err(|_| poisoned())?;
        let account = accounts
            .values_mut()
            .find(|a| a.user.id == user_id)
            .ok_or(AuthError::UnknownUser)?;
        f(&mut account.user);
        Ok(account.user.clone())
    }

    fn notify_if_current(&self, user: SessionUser) {
        let updated = match self.current.write() {
            Ok(mut current) => match current.as_mut() {
                Some(session) if session.user.id == user.id => {
                    session.user = user;
                    Some(session.clone())
                }
                _ => None,
            },
            Err(_) => None,
        };
        if updated.is_some() {
            self.emit(SessionEventKind::UserUpdated, updated);
        }
    }
}

fn poisoned() -> AuthError {
    AuthError::Unavailable("in-memory provider lock poisoned".to_string())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| AuthError::Unavailable(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AuthError::Unavailable(e.to_string()))?;
    let params = Params::new(HASH_MEMORY_KIB, 1, 1, None).map_err(|e| AuthError::Unavailable(e.to_string()))?;
    let phc = Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Unavailable(e.to_string()))?
        .to_string();
    Ok(phc)
}

fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[async_trait]
impl AuthCollaborator for InMemoryAuthProvider {
    async fn current_session(&self) -> Result<Option<Session>, AuthError> {
        self.ensure_reachable()?;
        let current = self.current.read().map_err(|_| poisoned())?;
        Ok(current.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        self.ensure_reachable()?;
        let user = {
            let accounts = self.accounts.read().map_err(|_| poisoned())?;
            let account = accounts
                .get(&normalize_email(&credentials.email))
                .ok_or(AuthError::InvalidCredentials)?;
            if !verify_password(&account.password_hash, &credentials.password) {
                return Err(AuthError::InvalidCredentials);
            }
            account.user.clone()
        };

        let session = self.issue(user);
        *self.current.write().map_err(|_| poisoned())? = Some(session.clone());
        tracing::info!(user_id = %session.user.id, "signed in");
        self.emit(SessionEventKind::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.ensure_reachable()?;
        let previous = self.current.write().map_err(|_| poisoned())?.take();
        if let Some(session) = previous {
            tracing::info!(user_id = %session.user.id, "signed out");
        }
        self.emit(SessionEventKind::SignedOut, None);
        Ok(())
    }

    async fn sign_up(
        &self,
        credentials: &Credentials,
        attributes: &SignUpAttributes,
    ) -> Result<SessionUser, AuthError> {
        self.ensure_reachable()?;

        let email = normalize_email(&credentials.email);
        let valid_email = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
        if !valid_email {
            return Err(AuthError::InvalidEmail(credentials.email.clone()));
        }
        if credentials.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword(MIN_PASSWORD_LEN));
        }

        let password_hash = hash_password(&credentials.password)?;

        let mut user_metadata = Map::new();
        if let Some(name) = &attributes.full_name {
            user_metadata.insert(FULL_NAME_KEY.to_string(), Value::String(name.clone()));
        }
        if let Some(role) = &attributes.requested_role {
            user_metadata.insert(ROLE_KEY.to_string(), Value::String(role.clone()));
        }

        let user = SessionUser {
            id: UserId::new(),
            email: email.clone(),
            app_metadata: Map::new(),
            user_metadata,
        };

        let mut accounts = self.accounts.write().map_err(|_| poisoned())?;
        if accounts.contains_key(&email) {
            return Err(AuthError::EmailTaken);
        }
        accounts.insert(
            email,
            Account {
                user: user.clone(),
                password_hash,
            },
        );
        tracing::info!(user_id = %user.id, "account created");
        Ok(user)
    }
}
