//! Access gate: render-vs-redirect decision for a requested view.
//!
//! `RESOLVING → {DENIED_ANONYMOUS, DENIED_FORBIDDEN, GRANTED}`
//!
//! Evaluation is a pure function of the principal and the route policy. It
//! keeps no counters or bypass flags, so repeating a request with the same
//! principal always yields the same decision.

use std::sync::Arc;

use serde::Serialize;

use dsl_core::RoutePath;

use crate::policy::Access;
use crate::{AccessError, Principal, Role, RoleClaim, RoutePolicy};

static ANY_AUTHENTICATED: Access = Access::Authenticated;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    /// Identity not settled yet; show a neutral loading state.
    Resolving,
    /// Nobody (with a role) is signed in.
    DeniedAnonymous,
    /// Signed in, but not allowed here.
    DeniedForbidden,
    Granted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "path", rename_all = "snake_case")]
pub enum GateOutcome {
    Loading,
    Render(RoutePath),
    Redirect(RoutePath),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateDecision {
    pub requested: RoutePath,
    pub state: GateState,
    pub outcome: GateOutcome,
}

#[derive(Debug, Clone)]
pub struct AccessGate {
    policy: Arc<RoutePolicy>,
}

impl AccessGate {
    pub fn new(policy: Arc<RoutePolicy>) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RoutePolicy {
        &self.policy
    }

    /// Core state machine over an explicit requirement.
    pub fn evaluate_requirement(principal: &Principal, access: &Access) -> GateState {
        if !principal.is_established {
            return GateState::Resolving;
        }
        if access.is_public() {
            return GateState::Granted;
        }
        match &principal.role {
            RoleClaim::Unrecognized(_) => GateState::DeniedForbidden,
            RoleClaim::Unassigned => GateState::DeniedAnonymous,
            RoleClaim::Assigned(role) if access.admits(Some(*role)) => GateState::Granted,
            RoleClaim::Assigned(_) => GateState::DeniedForbidden,
        }
    }

    /// Evaluate a path. Undeclared paths are guarded like the home route.
    pub fn evaluate(&self, principal: &Principal, path: &RoutePath) -> GateState {
        Self::evaluate_requirement(principal, self.requirement_for(path))
    }

    /// Evaluate and turn the state into what the shell should do.
    pub fn decide(&self, principal: &Principal, path: &RoutePath) -> GateDecision {
        let state = self.evaluate(principal, path);
        let landing = self.policy.landing();

        let outcome = match state {
            GateState::Resolving => GateOutcome::Loading,
            GateState::DeniedAnonymous => GateOutcome::Redirect(landing.login.clone()),
            GateState::DeniedForbidden => GateOutcome::Redirect(landing.unauthorized.clone()),
            GateState::Granted if self.routes_home(path) => GateOutcome::Redirect(
                self.policy.default_landing_for(&principal.role).clone(),
            ),
            GateState::Granted => GateOutcome::Render(path.clone()),
        };

        tracing::debug!(
            path = %path,
            state = ?state,
            outcome = ?outcome,
            role = ?principal.role(),
            "access gate decision"
        );

        GateDecision {
            requested: path.clone(),
            state,
            outcome,
        }
    }

    /// Result-shaped check for callers guarding an action rather than a view.
    pub fn authorize(&self, principal: &Principal, path: &RoutePath) -> Result<(), AccessError> {
        match self.evaluate(principal, path) {
            GateState::Granted => Ok(()),
            GateState::Resolving => Err(AccessError::Pending),
            GateState::DeniedAnonymous => Err(AccessError::Unauthenticated(path.clone())),
            GateState::DeniedForbidden => Err(AccessError::Forbidden {
                path: path.clone(),
                role: principal.role(),
            }),
        }
    }

    fn requirement_for(&self, path: &RoutePath) -> &Access {
        let target = if self.policy.is_known(path) {
            path
        } else {
            &self.policy.landing().home
        };
        self.policy
            .rule_for(target)
            .map(|rule| &rule.access)
            .unwrap_or(&ANY_AUTHENTICATED)
    }

    fn routes_home(&self, path: &RoutePath) -> bool {
        *path == self.policy.landing().home || !self.policy.is_known(path)
    }

    /// Explain a decision (audit / debugging aid).
    pub fn explain(&self, principal: &Principal, path: &RoutePath) -> AccessExplanation {
        let decision = self.decide(principal, path);
        let required = self.requirement_for(path).clone();

        let (reason, denial) = match decision.state {
            GateState::Granted => {
                let reason = if required.is_public() {
                    format!("{path} is public")
                } else if principal.role() == Some(Role::Admin)
                    && matches!(&required, Access::Roles(roles) if !roles.contains(&Role::Admin))
                {
                    format!("admin satisfies every rule ({path} requires {required})")
                } else {
                    format!("role satisfies {required}")
                };
                (reason, None)
            }
            GateState::Resolving => ("identity is still being resolved".to_string(), None),
            GateState::DeniedAnonymous => (
                format!("{path} requires {required}; no role is signed in"),
                Some(DenialReason {
                    kind: DenialKind::Anonymous,
                    message: "Authentication required".to_string(),
                    suggestions: vec!["Sign in with an account that holds a role".to_string()],
                }),
            ),
            GateState::DeniedForbidden => {
                let suggestions = match &principal.role {
                    RoleClaim::Unrecognized(raw) => vec![format!(
                        "The role '{raw}' is not recognized; ask an administrator to assign admin, driver or broker"
                    )],
                    _ => vec![format!("Ask an administrator for a role satisfying {required}")],
                };
                (
                    format!("{path} requires {required}"),
                    Some(DenialReason {
                        kind: DenialKind::Forbidden,
                        message: "Signed in without the required role".to_string(),
                        suggestions,
                    }),
                )
            }
        };

        AccessExplanation {
            decision,
            required,
            reason,
            principal: PrincipalState {
                signed_in: principal.is_signed_in(),
                established: principal.is_established,
                role: principal.role.clone(),
            },
            denial,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Decision Explanation
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed, serializable explanation of a gate decision.
#[derive(Debug, Clone, Serialize)]
pub struct AccessExplanation {
    pub decision: GateDecision,
    pub required: Access,
    pub reason: String,
    pub principal: PrincipalState,
    pub denial: Option<DenialReason>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrincipalState {
    pub signed_in: bool,
    pub established: bool,
    pub role: RoleClaim,
}

#[derive(Debug, Clone, Serialize)]
pub struct DenialReason {
    pub kind: DenialKind,
    pub message: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    Anonymous,
    Forbidden,
}
