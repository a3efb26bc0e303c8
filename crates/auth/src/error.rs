//! Access error taxonomy.
//!
//! Collaborator failures are converted into these kinds at the boundary; the
//! gate and navigator never see a raw transport error.

use thiserror::Error;

use dsl_core::RoutePath;

use crate::claims::SessionValidationError;
use crate::policy::PolicyConfigError;
use crate::{InvalidRole, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// The auth collaborator was unreachable or returned an unusable session.
    #[error("identity could not be resolved: {0}")]
    IdentityResolution(String),

    #[error(transparent)]
    InvalidRole(#[from] InvalidRole),

    /// An established identity asked for a path it may not reach.
    #[error("forbidden: {path} is not permitted for {}", .role.map_or("an unassigned role", |r| r.as_str()))]
    Forbidden { path: RoutePath, role: Option<Role> },

    /// Anonymous caller asked for a protected path.
    #[error("authentication required for {0}")]
    Unauthenticated(RoutePath),

    /// Still resolving; the caller should wait for the next identity update.
    #[error("identity is still being resolved")]
    Pending,

    /// Startup-only: the route table cannot be trusted.
    #[error("route policy misconfigured: {0}")]
    PolicyConfiguration(#[from] PolicyConfigError),
}

impl AccessError {
    pub fn identity_resolution(msg: impl Into<String>) -> Self {
        Self::IdentityResolution(msg.into())
    }
}

impl From<SessionValidationError> for AccessError {
    fn from(value: SessionValidationError) -> Self {
        Self::IdentityResolution(value.to_string())
    }
}
