//! Derived profile lookup performed while a session is being resolved.

use std::sync::Arc;

use serde_json::{Map, Value};

use dsl_auth::claims;
use dsl_auth::{Role, Session, SessionUser};
use dsl_core::RecordId;

use crate::backend::{BackendError, Collection, DataBackend, Filter, ID_FIELD};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub display_name: String,
    /// The `drivers` record backing a driver principal.
    pub driver_record: Option<RecordId>,
}

#[derive(Clone)]
pub struct ProfileResolver {
    backend: Arc<dyn DataBackend>,
}

impl ProfileResolver {
    pub fn new(backend: Arc<dyn DataBackend>) -> Self {
        Self { backend }
    }

    /// Resolve the profile for a session whose role has already been validated.
    ///
    /// Drivers always get a `drivers` record; it is created on first sign-in.
    pub async fn resolve(&self, session: &Session, role: Option<Role>) -> Result<Profile, BackendError> {
        let display_name = claims::display_name(&session.user);

        let driver_record = match role {
            Some(Role::Driver) => Some(self.ensure_driver_record(&session.user, &display_name).await?),
            _ => None,
        };

        Ok(Profile {
            display_name,
            driver_record,
        })
    }

    async fn ensure_driver_record(&self, user: &SessionUser, display_name: &str) -> Result<RecordId, BackendError> {
        let filter = Filter::all().where_eq("user_id", user.id.to_string());

        if let Some(existing) = self.backend.find_one(Collection::Drivers, &filter).await? {
            return record_id(&existing);
        }

        let mut record = Map::new();
        record.insert("user_id".to_string(), Value::String(user.id.to_string()));
        record.insert("full_name".to_string(), Value::String(display_name.to_string()));
        record.insert("email".to_string(), Value::String(user.email.clone()));
        record.insert("status".to_string(), Value::String("active".to_string()));

        let stored = self.backend.insert(Collection::Drivers, record).await?;
        tracing::info!(user_id = %user.id, "created driver profile");
        record_id(&stored)
    }
}

fn record_id(record: &Map<String, Value>) -> Result<RecordId, BackendError> {
    record
        .get(ID_FIELD)
        .and_then(Value::as_str)
        .and_then(|raw| raw.parse().ok())
        .ok_or_else(|| BackendError::Rejected("drivers record without a valid id".to_string()))
}
