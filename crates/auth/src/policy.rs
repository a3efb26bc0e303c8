//! Route policy: which roles may reach which paths, and where each role lands.
//!
//! The route table is static configuration. It is validated once when loaded
//! and immutable afterwards; a table that fails validation must stop startup.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use dsl_core::RoutePath;

use crate::navigation::{IconRef, NavLink};
use crate::{Role, RoleClaim};

const BUILTIN_ROUTE_TABLE: &str = include_str!("default_routes.json");

/// Who may reach a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    /// Reachable without signing in.
    Public,
    /// Any principal holding a valid role.
    Authenticated,
    /// Only the listed roles (admin is always admitted as well).
    Roles(BTreeSet<Role>),
}

impl Access {
    /// Whether `role` satisfies this requirement.
    pub fn admits(&self, role: Option<Role>) -> bool {
        match (self, role) {
            (Access::Public, _) => true,
            (_, None) => false,
            (_, Some(Role::Admin)) => true,
            (Access::Authenticated, Some(_)) => true,
            (Access::Roles(roles), Some(role)) => roles.contains(&role),
        }
    }

    pub fn is_public(&self) -> bool {
        matches!(self, Access::Public)
    }

    /// Whether the rule names `role` explicitly (no admin override).
    pub fn names(&self, role: Role) -> bool {
        matches!(self, Access::Roles(roles) if roles.contains(&role))
    }
}

impl core::fmt::Display for Access {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Access::Public => f.write_str("public"),
            Access::Authenticated => f.write_str("any authenticated role"),
            Access::Roles(roles) => {
                let names: Vec<&str> = roles.iter().map(Role::as_str).collect();
                write!(f, "roles [{}]", names.join(", "))
            }
        }
    }
}

/// Navigation entry attached to a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavEntry {
    pub label: String,
    pub icon: IconRef,
}

/// Static declaration of which roles may reach a given path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    pub path: RoutePath,
    pub access: Access,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nav: Option<NavEntry>,
}

/// Fixed destinations used by redirects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandingRoutes {
    pub admin: RoutePath,
    pub driver: RoutePath,
    pub broker: RoutePath,
    pub login: RoutePath,
    pub unauthorized: RoutePath,
    #[serde(default = "RoutePath::root")]
    pub home: RoutePath,
}

impl LandingRoutes {
    pub fn for_role(&self, role: Role) -> &RoutePath {
        match role {
            Role::Admin => &self.admin,
            Role::Driver => &self.driver,
            Role::Broker => &self.broker,
        }
    }
}

/// On-disk route table shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTableConfig {
    pub landing: LandingRoutes,
    pub routes: Vec<RouteRule>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyConfigError {
    #[error("route table could not be parsed: {0}")]
    Parse(String),

    #[error("route {0} is declared more than once")]
    DuplicateRoute(RoutePath),

    #[error("route {0} declares an empty role set")]
    EmptyRoleSet(RoutePath),

    #[error("route {0} is public but carries a navigation entry")]
    NavOnPublicRoute(RoutePath),

    #[error("view {0} has no route rule and is not marked public")]
    UnguardedView(RoutePath),

    #[error("{which} landing route {path} has no route rule")]
    MissingLandingRoute { which: &'static str, path: RoutePath },

    #[error("{which} landing route {path} must be public")]
    LandingNotPublic { which: &'static str, path: RoutePath },

    #[error("landing route {path} is not reachable by role {role}")]
    LandingNotPermitted { role: Role, path: RoutePath },

    #[error("home route {0} must not be public")]
    PublicHome(RoutePath),
}

/// Pure role → route policy.
///
/// - No IO
/// - No panics
/// - Deterministic output for a given role
#[derive(Debug, Clone)]
pub struct RoutePolicy {
    rules: BTreeMap<RoutePath, RouteRule>,
    declared: Vec<RoutePath>,
    landing: LandingRoutes,
}

impl RoutePolicy {
    /// The route table the application ships with.
    pub fn builtin() -> Result<Self, PolicyConfigError> {
        Self::from_json(BUILTIN_ROUTE_TABLE)
    }

    pub fn from_json(json: &str) -> Result<Self, PolicyConfigError> {
        let config: RouteTableConfig =
            serde_json::from_str(json).map_err(|e| PolicyConfigError::Parse(e.to_string()))?;
        Self::from_config(config)
    }

    /// Build and validate a policy. Any inconsistency is fatal.
    pub fn from_config(config: RouteTableConfig) -> Result<Self, PolicyConfigError> {
        let mut rules = BTreeMap::new();
        let mut declared = Vec::with_capacity(config.routes.len());

        for rule in config.routes {
            if matches!(&rule.access, Access::Roles(roles) if roles.is_empty()) {
                return Err(PolicyConfigError::EmptyRoleSet(rule.path));
            }
            if rule.access.is_public() && rule.nav.is_some() {
                return Err(PolicyConfigError::NavOnPublicRoute(rule.path));
            }
            if rules.contains_key(&rule.path) {
                return Err(PolicyConfigError::DuplicateRoute(rule.path));
            }
            declared.push(rule.path.clone());
            rules.insert(rule.path.clone(), rule);
        }

        let policy = Self {
            rules,
            declared,
            landing: config.landing,
        };
        policy.check_landing()?;
        Ok(policy)
    }

    fn check_landing(&self) -> Result<(), PolicyConfigError> {
        for (which, path) in [
            ("login", &self.landing.login),
            ("unauthorized", &self.landing.unauthorized),
        ] {
            let rule = self
                .rules
                .get(path)
                .ok_or_else(|| PolicyConfigError::MissingLandingRoute {
                    which,
                    path: path.clone(),
                })?;
            if !rule.access.is_public() {
                return Err(PolicyConfigError::LandingNotPublic {
                    which,
                    path: path.clone(),
                });
            }
        }

        let home = self
            .rules
            .get(&self.landing.home)
            .ok_or_else(|| PolicyConfigError::MissingLandingRoute {
                which: "home",
                path: self.landing.home.clone(),
            })?;
        if home.access.is_public() {
            return Err(PolicyConfigError::PublicHome(self.landing.home.clone()));
        }

        for role in Role::ALL {
            let path = self.landing.for_role(role);
            let rule = self
                .rules
                .get(path)
                .ok_or_else(|| PolicyConfigError::MissingLandingRoute {
                    which: role.as_str(),
                    path: path.clone(),
                })?;
            if !rule.access.admits(Some(role)) {
                return Err(PolicyConfigError::LandingNotPermitted {
                    role,
                    path: path.clone(),
                });
            }
        }

        Ok(())
    }

    /// Fail fast unless every served view has a rule.
    pub fn ensure_covers<'a, I>(&self, views: I) -> Result<(), PolicyConfigError>
    where
        I: IntoIterator<Item = &'a RoutePath>,
    {
        for view in views {
            if !self.rules.contains_key(view) {
                return Err(PolicyConfigError::UnguardedView(view.clone()));
            }
        }
        Ok(())
    }

    pub fn landing(&self) -> &LandingRoutes {
        &self.landing
    }

    pub fn rule_for(&self, path: &RoutePath) -> Option<&RouteRule> {
        self.rules.get(path)
    }

    pub fn is_known(&self, path: &RoutePath) -> bool {
        self.rules.contains_key(path)
    }

    /// Rules in declaration order.
    pub fn rules(&self) -> impl Iterator<Item = &RouteRule> {
        self.declared.iter().filter_map(|path| self.rules.get(path))
    }

    /// Where a principal lands after sign-in (or when visiting the home route).
    ///
    /// Five distinct outcomes: the three dashboards, login for "no role",
    /// unauthorized for a role outside the closed set.
    pub fn default_landing_for(&self, claim: &RoleClaim) -> &RoutePath {
        match claim {
            RoleClaim::Assigned(role) => self.landing.for_role(*role),
            RoleClaim::Unassigned => &self.landing.login,
            RoleClaim::Unrecognized(_) => &self.landing.unauthorized,
        }
    }

    /// A path with no rule is public; admin passes every rule.
    ///
    /// This is the table's answer only. [`AccessGate`](crate::AccessGate)
    /// guards undeclared paths like the home route, and its decision takes
    /// precedence when a request is actually routed.
    pub fn is_permitted(&self, role: Option<Role>, path: &RoutePath) -> bool {
        match self.rules.get(path) {
            None => true,
            Some(rule) => rule.access.admits(role),
        }
    }

    /// Role-specific links first, then links common to every signed-in role.
    ///
    /// Role-specific means the route names the role explicitly; the admin
    /// override does not pull other roles' links into the admin menu.
    pub fn nav_links_for(&self, role: Option<Role>) -> Vec<NavLink> {
        let Some(role) = role else {
            return Vec::new();
        };

        let role_links = self.rules().filter(|rule| rule.access.names(role));
        let common_links = self
            .rules()
            .filter(|rule| matches!(rule.access, Access::Authenticated));

        role_links
            .chain(common_links)
            .filter_map(|rule| {
                rule.nav.as_ref().map(|nav| NavLink {
                    path: rule.path.clone(),
                    label: nav.label.clone(),
                    icon: nav.icon,
                })
            })
            .collect()
    }
}
