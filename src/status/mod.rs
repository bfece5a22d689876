//! License status retrieval from the external record store

pub mod file;
pub mod kube;
pub mod memory;
pub mod source;

pub use file::FileRecordStore;
pub use kube::{KubeClient, KubeClusterRole};
pub use memory::MemoryRecordStore;
pub use source::{RecordStore, StatusSource, StoredRecord};
