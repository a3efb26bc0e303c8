//! Route paths (client-side locations such as `/driver-dashboard`).

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::{DomainError, DomainResult};

/// A validated, normalized application route path.
///
/// # Invariants
/// - Starts with `/`.
/// - No whitespace, query string, fragment or empty segment.
/// - No trailing `/` unless the path is the root itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoutePath(String);

impl RoutePath {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        if !raw.starts_with('/') {
            return Err(DomainError::invalid_path(raw, "must start with '/'"));
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(DomainError::invalid_path(raw, "must not contain whitespace"));
        }
        if raw.contains('?') || raw.contains('#') {
            return Err(DomainError::invalid_path(
                raw,
                "must not carry a query string or fragment",
            ));
        }

        let trimmed = if raw.len() > 1 {
            raw.trim_end_matches('/')
        } else {
            raw
        };
        if trimmed.is_empty() || trimmed.contains("//") {
            return Err(DomainError::invalid_path(raw, "must not contain empty segments"));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// The application root (`/`).
    pub fn root() -> Self {
        Self("/".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for RoutePath {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.pad(&self.0)
    }
}

impl FromStr for RoutePath {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RoutePath {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoutePath> for String {
    fn from(value: RoutePath) -> Self {
        value.0
    }
}
