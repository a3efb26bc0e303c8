//! Infrastructure layer: identity provider and data backend collaborators,
//! plus the session pipeline that feeds the identity store.

pub mod auth_provider;
pub mod backend;
pub mod profile;
pub mod session_sync;

pub use auth_provider::{AuthCollaborator, AuthError, Credentials, SessionEvent, SessionEventKind, SignUpAttributes};
pub use backend::{BackendError, Collection, DataBackend, Filter, Record};
pub use profile::{Profile, ProfileResolver};
pub use session_sync::SessionSync;
