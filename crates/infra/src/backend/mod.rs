//! Generic data backend boundary.
//!
//! Query/insert/update/delete over named record collections. The access
//! policy neither shapes nor validates these payloads.

pub mod in_memory;

pub use in_memory::InMemoryDataBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// A record as the backend stores it (a JSON object).
pub type Record = Map<String, Value>;

/// Field holding the backend-assigned record id.
pub const ID_FIELD: &str = "id";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Drivers,
    Loads,
    Shipments,
    Payroll,
    Vehicles,
    MaintenanceRecords,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Drivers => "drivers",
            Collection::Loads => "loads",
            Collection::Shipments => "shipments",
            Collection::Payroll => "payroll",
            Collection::Vehicles => "vehicles",
            Collection::MaintenanceRecords => "maintenance_records",
        }
    }
}

impl core::fmt::Display for Collection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Equality filter (all conditions must hold).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.conditions
            .iter()
            .all(|(field, expected)| record.get(field) == Some(expected))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("data backend unavailable: {0}")]
    Unavailable(String),

    #[error("data backend rejected the request: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait DataBackend: Send + Sync {
    async fn select(&self, collection: Collection, filter: &Filter) -> Result<Vec<Record>, BackendError>;

    /// Insert a record; the backend assigns `id` when absent and returns the stored record.
    async fn insert(&self, collection: Collection, record: Record) -> Result<Record, BackendError>;

    /// Merge `changes` into every matching record; returns how many matched.
    async fn update(&self, collection: Collection, filter: &Filter, changes: Record) -> Result<usize, BackendError>;

    async fn delete(&self, collection: Collection, filter: &Filter) -> Result<usize, BackendError>;

    async fn find_one(&self, collection: Collection, filter: &Filter) -> Result<Option<Record>, BackendError> {
        Ok(self.select(collection, filter).await?.into_iter().next())
    }
}
