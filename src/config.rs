//! Gateway configuration
//!
//! Loaded from YAML (every section optional) and overridden from env vars:
//!   LICENSE_GATE_CONFIG    - path of the YAML file (defaults used if unset)
//!   LICENSE_GATE_BIND_ADDR - listen address (default: 0.0.0.0:9090)
//!   LICENSE_GATE_UPSTREAM  - base URL of the API server behind the gate

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::policy::{default_exemptions, Exemption};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:9090";
const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Root configuration for the license gate.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub bind_addr: String,
    pub upstream: Option<String>,
    pub refresh: RefreshConfig,
    pub status: StatusConfig,
    pub store: StoreConfig,
    pub cluster_role: ClusterRoleConfig,
    pub policy: PolicyConfig,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            upstream: None,
            refresh: RefreshConfig::default(),
            status: StatusConfig::default(),
            store: StoreConfig::default(),
            cluster_role: ClusterRoleConfig::default(),
            policy: PolicyConfig::default(),
        }
    }
}

/// How often and how patiently the license status is re-read.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub interval_ms: u64,
    pub fetch_timeout_ms: u64,
    /// Consecutive store failures that keep the last published state before
    /// falling back to `EmptyLicense`. Zero falls back on the first failure.
    pub tolerated_failures: u32,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            fetch_timeout_ms: 5000,
            tolerated_failures: 0,
        }
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

/// Where the license status document lives.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub namespace: String,
    pub record_name: String,
    pub annotation: String,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            namespace: "kubesphere-system".to_string(),
            record_name: "kubesphere-license".to_string(),
            annotation: "license.kubesphere.io/status".to_string(),
        }
    }
}

/// Backend holding the license record.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    Kube(KubeConfig),
    File { root: PathBuf },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Kube(KubeConfig::default())
    }
}

/// Kubernetes API access, defaulting to the in-cluster service account.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KubeConfig {
    pub api_server: String,
    pub token_file: Option<PathBuf>,
    pub ca_file: Option<PathBuf>,
}

impl Default for KubeConfig {
    fn default() -> Self {
        Self {
            api_server: "https://kubernetes.default.svc".to_string(),
            token_file: Some(PathBuf::from(SERVICE_ACCOUNT_DIR).join("token")),
            ca_file: Some(PathBuf::from(SERVICE_ACCOUNT_DIR).join("ca.crt")),
        }
    }
}

/// Where the cluster role comes from.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ClusterRoleConfig {
    Static {
        role: String,
    },
    /// Read `multicluster.clusterRole` from YAML embedded in a config map.
    Kube {
        #[serde(default = "default_platform_namespace")]
        namespace: String,
        #[serde(default = "default_platform_config_map")]
        config_map: String,
        #[serde(default = "default_platform_config_key")]
        key: String,
    },
}

fn default_platform_namespace() -> String {
    "kubesphere-system".to_string()
}

fn default_platform_config_map() -> String {
    "kubesphere-config".to_string()
}

fn default_platform_config_key() -> String {
    "kubesphere.yaml".to_string()
}

impl Default for ClusterRoleConfig {
    fn default() -> Self {
        ClusterRoleConfig::Kube {
            namespace: default_platform_namespace(),
            config_map: default_platform_config_map(),
            key: default_platform_config_key(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Paths that stay writable while the license is violated.
    pub exemptions: Vec<Exemption>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            exemptions: default_exemptions(),
        }
    }
}

impl GateConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: GateConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `LICENSE_GATE_CONFIG` (if set) and apply env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("LICENSE_GATE_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };

        if let Ok(addr) = std::env::var("LICENSE_GATE_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(upstream) = std::env::var("LICENSE_GATE_UPSTREAM") {
            config.upstream = Some(upstream);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh.interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "refresh.interval_ms must be greater than zero".into(),
            ));
        }
        if self.refresh.fetch_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "refresh.fetch_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.status.record_name.is_empty() || self.status.annotation.is_empty() {
            return Err(ConfigError::Invalid(
                "status.record_name and status.annotation must be set".into(),
            ));
        }
        if let Some(bad) = self
            .policy
            .exemptions
            .iter()
            .find(|e| !e.prefix.starts_with('/'))
        {
            return Err(ConfigError::Invalid(format!(
                "exemption prefix must start with '/': {}",
                bad.prefix
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = GateConfig::from_yaml("{}").unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:9090");
        assert_eq!(config.refresh.interval(), Duration::from_secs(1));
        assert_eq!(config.refresh.tolerated_failures, 0);
        assert_eq!(config.status.record_name, "kubesphere-license");
        assert!(matches!(config.store, StoreConfig::Kube(_)));
        assert!(matches!(config.cluster_role, ClusterRoleConfig::Kube { .. }));
        assert_eq!(config.policy.exemptions.len(), 3);
    }

    #[test]
    fn test_parse_config() {
        let yaml = r#"
bind_addr: "127.0.0.1:8080"
upstream: "http://ks-apiserver.kubesphere-system.svc"
refresh:
  interval_ms: 250
  tolerated_failures: 3
store:
  kind: file
  root: /etc/license-gate/records
cluster_role:
  source: static
  role: member
policy:
  exemptions:
    - prefix: /kapis/license.v1
    - prefix: /kapis/cluster
      verbs: [delete]
"#;
        let config = GateConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.refresh.interval(), Duration::from_millis(250));
        assert_eq!(config.refresh.fetch_timeout(), Duration::from_secs(5));
        assert_eq!(config.refresh.tolerated_failures, 3);
        assert!(matches!(
            config.store,
            StoreConfig::File { ref root } if root == &PathBuf::from("/etc/license-gate/records")
        ));
        assert!(matches!(
            config.cluster_role,
            ClusterRoleConfig::Static { ref role } if role == "member"
        ));
        assert_eq!(config.policy.exemptions.len(), 2);
        assert_eq!(
            config.policy.exemptions[1].verbs,
            Some(vec!["delete".to_string()])
        );
    }

    #[test]
    fn test_shipped_config_parses() {
        let config = GateConfig::from_yaml(include_str!("../config/license-gate.yaml")).unwrap();
        assert_eq!(
            config.upstream.as_deref(),
            Some("http://ks-apiserver.kubesphere-system.svc")
        );
        assert_eq!(config.policy.exemptions, default_exemptions());
    }

    #[test]
    fn test_kube_role_source_defaults() {
        let config = GateConfig::from_yaml("cluster_role:\n  source: kube\n").unwrap();
        match config.cluster_role {
            ClusterRoleConfig::Kube {
                namespace,
                config_map,
                key,
            } => {
                assert_eq!(namespace, "kubesphere-system");
                assert_eq!(config_map, "kubesphere-config");
                assert_eq!(key, "kubesphere.yaml");
            }
            other => panic!("unexpected role source: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            GateConfig::from_yaml("refresh:\n  interval_ms: 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            GateConfig::from_yaml("policy:\n  exemptions:\n    - prefix: oauth\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            GateConfig::from_yaml("store:\n  kind: etcd\n"),
            Err(ConfigError::Yaml(_))
        ));
    }
}
