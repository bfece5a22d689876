//! License status lookup
//!
//! [`StatusSource`] reads the license record from a namespaced [`RecordStore`]
//! and turns the status annotation into a [`Violation`].

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::StatusConfig;
use crate::error::StoreError;
use crate::violation::{LicenseStatus, Violation};

/// A record as returned by the external store: only its annotations matter here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

impl StoredRecord {
    pub fn with_annotation(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut annotations = BTreeMap::new();
        annotations.insert(key.into(), value.into());
        Self { annotations }
    }
}

/// Namespaced key/value record lookup.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Look up one record.
    ///
    /// Returns `Ok(None)` if the record does not exist.
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<StoredRecord>, StoreError>;
}

/// Reads the license status record and derives the current violation.
#[derive(Clone)]
pub struct StatusSource {
    store: Arc<dyn RecordStore>,
    namespace: String,
    record_name: String,
    annotation: String,
}

impl StatusSource {
    pub fn new(store: Arc<dyn RecordStore>, config: &StatusConfig) -> Self {
        Self {
            store,
            namespace: config.namespace.clone(),
            record_name: config.record_name.clone(),
            annotation: config.annotation.clone(),
        }
    }

    /// Fetch the current violation.
    ///
    /// A missing record or an empty status annotation yields `EmptyLicense`;
    /// an undecodable annotation yields `FormatError`. Only store failures are
    /// returned as errors.
    pub async fn fetch(&self) -> Result<Violation, StoreError> {
        let record = match self.store.get(&self.namespace, &self.record_name).await? {
            Some(record) => record,
            None => {
                tracing::debug!(
                    namespace = %self.namespace,
                    name = %self.record_name,
                    "License record not found"
                );
                return Ok(Violation::empty_license());
            }
        };

        let raw = match record.annotations.get(&self.annotation) {
            Some(raw) if !raw.is_empty() => raw,
            _ => {
                tracing::debug!(
                    annotation = %self.annotation,
                    "License record has no status annotation"
                );
                return Ok(Violation::empty_license());
            }
        };

        match serde_json::from_str::<LicenseStatus>(raw) {
            Ok(status) => Ok(status.violation),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to decode license status");
                Ok(Violation::format_error())
            }
        }
    }
}
