use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use dsl_core::UserId;

use crate::RoleClaim;

/// Metadata key carrying the role in either metadata channel.
pub const ROLE_KEY: &str = "role";

/// Metadata key carrying the user's chosen display name.
pub const FULL_NAME_KEY: &str = "full_name";

/// The identity provider's view of a signed-in user.
///
/// Only `id`, `email` and the role attribute are interpreted by the policy;
/// everything else is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: UserId,
    pub email: String,

    /// Server-authoritative metadata. Only privileged server code writes here.
    #[serde(default)]
    pub app_metadata: Map<String, Value>,

    /// Client-settable metadata (sign-up attributes, profile edits).
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
}

/// Session model (transport-agnostic).
///
/// This is the shape the session pipeline expects once the auth collaborator
/// has verified the underlying token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user: SessionUser,

    /// Issued-at timestamp.
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp.
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionValidationError {
    #[error("session has expired")]
    Expired,

    #[error("session not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid session time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate a session's time window.
///
/// Note: this validates the *claims* only. Token signature verification is
/// the auth collaborator's job.
pub fn validate_session(session: &Session, now: DateTime<Utc>) -> Result<(), SessionValidationError> {
    if session.expires_at <= session.issued_at {
        return Err(SessionValidationError::InvalidTimeWindow);
    }
    if now < session.issued_at {
        return Err(SessionValidationError::NotYetValid);
    }
    if now >= session.expires_at {
        return Err(SessionValidationError::Expired);
    }
    Ok(())
}

/// Read the role from the server-authoritative channel only.
///
/// A role that appears solely in `user_metadata` is ignored: end users can
/// write that channel themselves.
pub fn extract_role(user: &SessionUser) -> RoleClaim {
    match user.app_metadata.get(ROLE_KEY) {
        None | Some(Value::Null) => {
            if let Some(client_role) = user.user_metadata.get(ROLE_KEY).filter(|v| !v.is_null()) {
                tracing::warn!(
                    user_id = %user.id,
                    client_role = %client_role,
                    "ignoring client-supplied role; no server-assigned role present"
                );
            }
            RoleClaim::Unassigned
        }
        Some(Value::String(raw)) => {
            let claim = RoleClaim::from_raw(Some(raw));
            if claim.is_unrecognized() {
                tracing::warn!(user_id = %user.id, role = %raw, "rejecting unrecognized role");
            }
            claim
        }
        Some(other) => {
            tracing::warn!(user_id = %user.id, role = %other, "rejecting non-string role attribute");
            RoleClaim::Unrecognized(other.to_string())
        }
    }
}

/// Human-facing name: `full_name` when set, otherwise the email's local part.
pub fn display_name(user: &SessionUser) -> String {
    user.user_metadata
        .get(FULL_NAME_KEY)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            user.email
                .split('@')
                .next()
                .unwrap_or_default()
                .to_string()
        })
}
