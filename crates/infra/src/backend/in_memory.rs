use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use dsl_core::RecordId;

use super::{BackendError, Collection, DataBackend, Filter, ID_FIELD, Record};

/// In-memory data backend for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryDataBackend {
    inner: RwLock<HashMap<Collection, Vec<Record>>>,
}

impl InMemoryDataBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, collection: Collection) -> usize {
        self.inner
            .read()
            .map(|map| map.get(&collection).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

fn poisoned() -> BackendError {
    BackendError::Unavailable("in-memory store lock poisoned".to_string())
}

#[async_trait]
impl DataBackend for InMemoryDataBackend {
    async fn select(&self, collection: Collection, filter: &Filter) -> Result<Vec<Record>, BackendError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map
            .get(&collection)
            .map(|records| records.iter().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default())
    }

    async fn insert(&self, collection: Collection, mut record: Record) -> Result<Record, BackendError> {
        if !record.contains_key(ID_FIELD) {
            record.insert(ID_FIELD.to_string(), Value::String(RecordId::new().to_string()));
        }

        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let records = map.entry(collection).or_default();
        if records.iter().any(|r| r.get(ID_FIELD) == record.get(ID_FIELD)) {
            return Err(BackendError::Rejected(format!(
                "duplicate id in {collection}"
            )));
        }
        records.push(record.clone());
        Ok(record)
    }

    async fn update(&self, collection: Collection, filter: &Filter, changes: Record) -> Result<usize, BackendError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let mut updated = 0;
        if let Some(records) = map.get_mut(&collection) {
            for record in records.iter_mut().filter(|r| filter.matches(r)) {
                for (field, value) in &changes {
                    record.insert(field.clone(), value.clone());
                }
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn delete(&self, collection: Collection, filter: &Filter) -> Result<usize, BackendError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let Some(records) = map.get_mut(&collection) else {
            return Ok(0);
        };
        let before = records.len();
        records.retain(|r| !filter.matches(r));
        Ok(before - records.len())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn insert_assigns_ids_and_select_filters() {
        let backend = InMemoryDataBackend::new();
        let stored = backend
            .insert(Collection::Loads, record(json!({ "status": "pending", "origin": "Reno" })))
            .await
            .unwrap();
        assert!(stored.contains_key(ID_FIELD));
        backend
            .insert(Collection::Loads, record(json!({ "status": "delivered" })))
            .await
            .unwrap();

        let pending = backend
            .select(Collection::Loads, &Filter::all().where_eq("status", "pending"))
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0]["origin"], "Reno");
        assert!(backend.select(Collection::Vehicles, &Filter::all()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_and_delete_report_counts() {
        let backend = InMemoryDataBackend::new();
        for unit in ["T-100", "T-200"] {
            backend
                .insert(Collection::Vehicles, record(json!({ "unit": unit, "status": "active" })))
                .await
                .unwrap();
        }

        let changed = backend
            .update(
                Collection::Vehicles,
                &Filter::all().where_eq("unit", "T-100"),
                record(json!({ "status": "in_shop" })),
            )
            .await
            .unwrap();
        assert_eq!(changed, 1);

        let in_shop = backend
            .find_one(Collection::Vehicles, &Filter::all().where_eq("status", "in_shop"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(in_shop["unit"], "T-100");

        let removed = backend.delete(Collection::Vehicles, &Filter::all()).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(backend.len(Collection::Vehicles), 0);
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let backend = InMemoryDataBackend::new();
        let stored = backend
            .insert(Collection::Payroll, record(json!({ "amount": 1200 })))
            .await
            .unwrap();
        let err = backend.insert(Collection::Payroll, stored).await.unwrap_err();
        assert!(matches!(err, BackendError::Rejected(_)));
    }
}
