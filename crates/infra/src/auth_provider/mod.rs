//! Identity provider boundary.
//!
//! The policy core treats sessions as opaque apart from user id, email and
//! the server-assigned role attribute.

pub mod in_memory;

pub use in_memory::InMemoryAuthProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use dsl_auth::{AccessError, InvalidRole, Session, SessionUser};

#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Attributes captured at sign-up. They land in client-settable metadata, so
/// `requested_role` has no effect on access until a server assigns it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SignUpAttributes {
    pub full_name: Option<String>,
    pub requested_role: Option<String>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEventKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// Session-changed notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub kind: SessionEventKind,
    pub session: Option<Session>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("identity provider unreachable: {0}")]
    Unavailable(String),

    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("an account with this email already exists")]
    EmailTaken,

    #[error("password must be at least {0} characters")]
    WeakPassword(usize),

    #[error("malformed session: {0}")]
    MalformedSession(String),

    #[error("unknown user")]
    UnknownUser,

    #[error("role '{0}' is not valid and has been revoked")]
    InvalidRole(String),
}

impl From<AuthError> for AccessError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidRole(raw) => AccessError::InvalidRole(InvalidRole(raw)),
            other => AccessError::IdentityResolution(other.to_string()),
        }
    }
}

#[async_trait]
pub trait AuthCollaborator: Send + Sync {
    async fn current_session(&self) -> Result<Option<Session>, AuthError>;

    /// Subscribe to session-changed notifications.
    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    async fn sign_up(
        &self,
        credentials: &Credentials,
        attributes: &SignUpAttributes,
    ) -> Result<SessionUser, AuthError>;
}
