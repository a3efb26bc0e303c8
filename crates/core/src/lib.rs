//! `dsl-core`: foundation building blocks shared by the access policy crates.
//!
//! This crate contains **pure** primitives (no I/O, no transport concerns).

pub mod error;
pub mod id;
pub mod path;

pub use error::{DomainError, DomainResult};
pub use id::{RecordId, UserId};
pub use path::RoutePath;
