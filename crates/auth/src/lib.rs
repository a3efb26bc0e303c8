//! `dsl-auth`: role-based access & navigation policy.
//!
//! No identity provider, data backend or UI types appear here; the crate
//! only sees sessions, principals and paths.

pub mod claims;
pub mod error;
pub mod gate;
pub mod identity;
pub mod navigation;
pub mod policy;
pub mod principal;
pub mod roles;

pub use claims::{Session, SessionUser, SessionValidationError, validate_session};
pub use error::AccessError;
pub use gate::{AccessGate, GateDecision, GateOutcome, GateState};
pub use identity::{IdentitySnapshot, IdentityStore, IdentityWatch, PendingIdentity};
pub use navigation::{IconRef, NavLink, Navigator};
pub use policy::{Access, PolicyConfigError, RoutePolicy, RouteRule};
pub use principal::Principal;
pub use roles::{InvalidRole, Role, RoleClaim};
