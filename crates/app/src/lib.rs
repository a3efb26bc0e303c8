//! Application shell: configuration, the served view catalog and the context
//! that owns the identity store for one running session.

pub mod config;
pub mod context;
pub mod error;
pub mod views;

pub use config::AppConfig;
pub use context::AppContext;
pub use error::{AppError, ConfigError};
