use std::path::PathBuf;

use thiserror::Error;

use dsl_auth::{AccessError, PolicyConfigError};
use dsl_core::{DomainError, RoutePath};
use dsl_infra::{BackendError, Collection};

/// Startup failures. All of them are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read route table {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Policy(#[from] PolicyConfigError),

    #[error("invalid view catalog entry: {0}")]
    View(#[from] DomainError),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Path(#[from] DomainError),

    #[error("no view is served at {0}")]
    UnknownView(RoutePath),

    #[error("{view} does not read {collection}")]
    NotServed { view: RoutePath, collection: Collection },
}
