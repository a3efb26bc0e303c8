use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role identifier used for RBAC.
///
/// The set is closed: anything the identity provider sends outside of it is
/// rejected, never coerced to the nearest match.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Driver,
    Broker,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Driver, Role::Broker];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Driver => "driver",
            Role::Broker => "broker",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("'{0}' is not a recognized role")]
pub struct InvalidRole(pub String);

impl FromStr for Role {
    type Err = InvalidRole;

    /// Exact, case-sensitive match. `"Admin"` is as foreign as `"superadmin"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "driver" => Ok(Role::Driver),
            "broker" => Ok(Role::Broker),
            other => Err(InvalidRole(other.to_string())),
        }
    }
}

/// What the identity provider told us about a principal's role.
///
/// `Unrecognized` grants nothing; it only exists so the landing policy can
/// tell "signed in with a bogus role" apart from "no role at all".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RoleClaim {
    #[default]
    Unassigned,
    Assigned(Role),
    Unrecognized(String),
}

impl RoleClaim {
    /// Classify a raw role attribute.
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw {
            None => RoleClaim::Unassigned,
            Some(value) => match value.parse::<Role>() {
                Ok(role) => RoleClaim::Assigned(role),
                Err(InvalidRole(value)) => RoleClaim::Unrecognized(value),
            },
        }
    }

    /// The role usable for permission checks (`None` for anything invalid).
    pub fn role(&self) -> Option<Role> {
        match self {
            RoleClaim::Assigned(role) => Some(*role),
            RoleClaim::Unassigned | RoleClaim::Unrecognized(_) => None,
        }
    }

    pub fn is_unrecognized(&self) -> bool {
        matches!(self, RoleClaim::Unrecognized(_))
    }
}

impl From<Role> for RoleClaim {
    fn from(role: Role) -> Self {
        RoleClaim::Assigned(role)
    }
}

impl From<Option<Role>> for RoleClaim {
    fn from(role: Option<Role>) -> Self {
        role.map_or(RoleClaim::Unassigned, RoleClaim::Assigned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_only_the_closed_set() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert_eq!(
            "superadmin".parse::<Role>(),
            Err(InvalidRole("superadmin".to_string()))
        );
        assert!("Admin".parse::<Role>().is_err());
        assert!("".parse::<Role>().is_err());
    }

    #[test]
    fn unrecognized_claim_grants_no_role() {
        let claim = RoleClaim::from_raw(Some("superadmin"));
        assert!(claim.is_unrecognized());
        assert_eq!(claim.role(), None);
        assert_eq!(RoleClaim::from_raw(None), RoleClaim::Unassigned);
        assert_eq!(
            RoleClaim::from_raw(Some("broker")).role(),
            Some(Role::Broker)
        );
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Driver).unwrap(), "\"driver\"");
        assert!(serde_json::from_str::<Role>("\"root\"").is_err());
    }
}
