//! Builds the status store and cluster role provider named by the config.

use std::sync::Arc;

use crate::config::{ClusterRoleConfig, GateConfig, KubeConfig, StoreConfig};
use crate::error::GateError;
use crate::role::{ClusterRole, ClusterRoleProvider, StaticClusterRole};
use crate::status::{FileRecordStore, KubeClient, KubeClusterRole, RecordStore};

pub struct Backends {
    pub store: Arc<dyn RecordStore>,
    pub roles: Arc<dyn ClusterRoleProvider>,
}

impl Backends {
    /// The store and the role lookup share one Kubernetes client when both use it.
    pub fn from_config(config: &GateConfig) -> Result<Self, GateError> {
        let mut kube: Option<Arc<KubeClient>> = None;
        let mut kube_client = |kube_config: &KubeConfig| -> Result<Arc<KubeClient>, GateError> {
            if let Some(client) = &kube {
                return Ok(client.clone());
            }
            let client = Arc::new(KubeClient::from_config(kube_config)?);
            kube = Some(client.clone());
            Ok(client)
        };

        let store: Arc<dyn RecordStore> = match &config.store {
            StoreConfig::Kube(kube_config) => kube_client(kube_config)?,
            StoreConfig::File { root } => Arc::new(FileRecordStore::new(root.clone())),
        };

        let roles: Arc<dyn ClusterRoleProvider> = match &config.cluster_role {
            ClusterRoleConfig::Static { role } => {
                Arc::new(StaticClusterRole(ClusterRole::new(role.clone())))
            }
            ClusterRoleConfig::Kube {
                namespace,
                config_map,
                key,
            } => {
                let kube_config = match &config.store {
                    StoreConfig::Kube(kube_config) => kube_config.clone(),
                    StoreConfig::File { .. } => KubeConfig::default(),
                };
                Arc::new(KubeClusterRole::new(
                    kube_client(&kube_config)?,
                    namespace.clone(),
                    config_map.clone(),
                    key.clone(),
                ))
            }
        };

        Ok(Self { store, roles })
    }
}
