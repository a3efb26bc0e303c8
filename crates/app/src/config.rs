//! Process configuration.
//!
//! - `DSL_ROUTE_TABLE`: path to a route table JSON file. Unset means the
//!   table embedded in `dsl-auth`.
//! - `RUST_LOG`: tracing filter, read by `dsl-observability`.

use std::ffi::OsString;
use std::path::PathBuf;

use dsl_auth::RoutePolicy;

use crate::error::ConfigError;
use crate::views;

pub const ROUTE_TABLE_ENV: &str = "DSL_ROUTE_TABLE";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppConfig {
    pub route_table: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var_os(key))
    }

    /// An empty value counts as unset.
    fn from_lookup(lookup: impl Fn(&str) -> Option<OsString>) -> Self {
        let route_table = lookup(ROUTE_TABLE_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        Self { route_table }
    }

    pub fn with_route_table(mut self, path: impl Into<PathBuf>) -> Self {
        self.route_table = Some(path.into());
        self
    }

    /// Load the route table and check it against the served views.
    pub fn load_policy(&self) -> Result<RoutePolicy, ConfigError> {
        let policy = match &self.route_table {
            Some(path) => {
                let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.clone(),
                    source,
                })?;
                RoutePolicy::from_json(&json)?
            }
            None => RoutePolicy::builtin()?,
        };

        policy.ensure_covers(views::catalog()?.iter())?;

        tracing::info!(
            source = %self.route_table.as_ref().map_or("builtin".into(), |p| p.display().to_string()),
            routes = policy.rules().count(),
            "route policy loaded"
        );
        Ok(policy)
    }
}

#[cfg(test)]
mod tests {
    use dsl_auth::PolicyConfigError;

    use super::*;

    fn write_table(json: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("dsl-routes-{}.json", uuid::Uuid::now_v7()));
        std::fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn route_table_comes_from_the_environment() {
        let config = AppConfig::from_lookup(|key| {
            (key == ROUTE_TABLE_ENV).then(|| OsString::from("/etc/dsl/routes.json"))
        });
        assert_eq!(config.route_table, Some(PathBuf::from("/etc/dsl/routes.json")));
    }

    #[test]
    fn empty_route_table_variable_means_builtin() {
        let config = AppConfig::from_lookup(|_| Some(OsString::new()));
        assert_eq!(config, AppConfig::default());
        assert_eq!(AppConfig::from_lookup(|_| None), AppConfig::default());
    }

    #[test]
    fn default_config_uses_builtin_table() {
        let policy = AppConfig::default().load_policy().unwrap();
        assert!(policy.rules().count() >= views::VIEWS.len());
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let config = AppConfig::default().with_route_table("/definitely/not/here.json");
        assert!(matches!(config.load_policy(), Err(ConfigError::Read { .. })));
    }

    #[test]
    fn table_missing_a_served_view_is_rejected() {
        let path = write_table(
            r#"{
                "landing": {
                    "admin": "/admin-dashboard",
                    "driver": "/driver-dashboard",
                    "broker": "/broker-dashboard",
                    "login": "/login",
                    "unauthorized": "/unauthorized",
                    "home": "/"
                },
                "routes": [
                    { "path": "/", "access": "authenticated" },
                    { "path": "/login", "access": "public" },
                    { "path": "/unauthorized", "access": "public" },
                    { "path": "/admin-dashboard", "access": { "roles": ["admin"] } },
                    { "path": "/driver-dashboard", "access": { "roles": ["driver"] } },
                    { "path": "/broker-dashboard", "access": { "roles": ["broker"] } }
                ]
            }"#,
        );

        let result = AppConfig::default().with_route_table(&path).load_policy();
        let _ = std::fs::remove_file(&path);

        match result {
            Err(ConfigError::Policy(PolicyConfigError::UnguardedView(view))) => {
                assert!(views::find(&view).is_some());
            }
            other => panic!("expected an unguarded view, got {other:?}"),
        }
    }

    #[test]
    fn malformed_table_is_a_policy_error() {
        let path = write_table("{ not json");
        let result = AppConfig::default().with_route_table(&path).load_policy();
        let _ = std::fs::remove_file(&path);
        assert!(matches!(result, Err(ConfigError::Policy(PolicyConfigError::Parse(_)))));
    }
}
