//! In-process record store
//!
//! Used by tests and by embedders that push license status themselves.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use super::source::{RecordStore, StoredRecord};
use crate::error::StoreError;

#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<(String, String), StoredRecord>>,
    failure: RwLock<Option<String>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record.
    pub fn put(&self, namespace: &str, name: &str, record: StoredRecord) {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((namespace.to_string(), name.to_string()), record);
    }

    pub fn remove(&self, namespace: &str, name: &str) {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(namespace.to_string(), name.to_string()));
    }

    /// Make every lookup fail with `StoreError::Unavailable` until [`recover`](Self::recover).
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.write().unwrap_or_else(PoisonError::into_inner) = Some(message.into());
    }

    pub fn recover(&self) {
        *self.failure.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<StoredRecord>, StoreError> {
        let failure = self
            .failure
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(message) = failure {
            return Err(StoreError::Unavailable(message));
        }

        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }
}
