//! Directory-backed record store
//!
//! Each record lives at `<root>/<namespace>/<name>.json` and holds a
//! [`StoredRecord`] document, e.g.
//!
//! ```json
//! { "annotations": { "license.kubesphere.io/status": "{\"violation\":{\"type\":\"NoViolation\"}}" } }
//! ```

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;

use super::source::{RecordStore, StoredRecord};
use crate::error::StoreError;

#[derive(Debug, Clone)]
pub struct FileRecordStore {
    root: PathBuf,
}

impl FileRecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn record_path(&self, namespace: &str, name: &str) -> PathBuf {
        self.root.join(namespace).join(format!("{name}.json"))
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<StoredRecord>, StoreError> {
        let path = self.record_path(namespace, name);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StoreError::Decode(format!("{}: {e}", path.display())))
    }
}
