use serde::Serialize;

use dsl_core::UserId;

use crate::claims::{self, Session};
use crate::{Role, RoleClaim};

/// The resolved identity of the current session.
///
/// A `Principal` is always published whole; consumers never see a role
/// without the id it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Principal {
    pub id: Option<UserId>,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub role: RoleClaim,

    /// `false` while the session is still being resolved.
    pub is_established: bool,

    /// Set when resolution failed and the user must sign in again.
    pub resolution_failed: bool,
}

impl Principal {
    /// Empty, not-yet-resolved state (process start, pending session change).
    pub fn resolving() -> Self {
        Self::default()
    }

    /// Resolved to "nobody is signed in".
    pub fn anonymous() -> Self {
        Self {
            is_established: true,
            ..Self::default()
        }
    }

    /// Resolved to anonymous because the identity could not be resolved.
    pub fn unresolvable() -> Self {
        Self {
            resolution_failed: true,
            ..Self::anonymous()
        }
    }

    pub fn authenticated(id: UserId, email: impl Into<String>, role: impl Into<RoleClaim>) -> Self {
        Self {
            id: Some(id),
            email: Some(email.into()),
            display_name: None,
            role: role.into(),
            is_established: true,
            resolution_failed: false,
        }
    }

    /// Build from a verified session (role from the server channel only).
    pub fn from_session(session: &Session) -> Self {
        Self {
            display_name: Some(claims::display_name(&session.user)),
            ..Self::authenticated(
                session.user.id,
                session.user.email.clone(),
                claims::extract_role(&session.user),
            )
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// The role usable for permission checks.
    pub fn role(&self) -> Option<Role> {
        self.role.role()
    }

    pub fn is_signed_in(&self) -> bool {
        self.is_established && self.id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use serde_json::json;

    use super::*;
    use crate::claims::SessionUser;

    #[test]
    fn from_session_uses_server_role_and_profile_name() {
        let now = Utc::now();
        let session = Session {
            user: SessionUser {
                id: UserId::new(),
                email: "ops@dsltransport.com".to_string(),
                app_metadata: json!({ "role": "broker" }).as_object().cloned().unwrap(),
                user_metadata: json!({ "role": "admin", "full_name": "Ops Desk" })
                    .as_object()
                    .cloned()
                    .unwrap(),
            },
            issued_at: now,
            expires_at: now + Duration::hours(1),
        };

        let principal = Principal::from_session(&session);
        assert!(principal.is_signed_in());
        assert_eq!(principal.role(), Some(Role::Broker));
        assert_eq!(principal.display_name.as_deref(), Some("Ops Desk"));
    }

    #[test]
    fn lifecycle_states_are_distinct() {
        assert!(!Principal::resolving().is_established);
        assert!(Principal::anonymous().is_established);
        assert!(!Principal::anonymous().is_signed_in());
        assert!(Principal::unresolvable().resolution_failed);
        assert_eq!(Principal::unresolvable().role(), None);
    }
}
