//! Kubernetes API access
//!
//! The license record is a Secret whose annotations carry the status
//! document. The cluster role comes from the platform ConfigMap, which embeds
//! the platform configuration as YAML under a single key.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::source::{RecordStore, StoredRecord};
use crate::config::KubeConfig;
use crate::error::{RoleError, StoreError};
use crate::role::{ClusterRole, ClusterRoleProvider};

#[derive(Debug, Default, Deserialize)]
struct ObjectMeta {
    #[serde(default)]
    annotations: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct Secret {
    #[serde(default)]
    metadata: ObjectMeta,
}

#[derive(Debug, Deserialize)]
struct ConfigMap {
    #[serde(default)]
    data: Option<BTreeMap<String, String>>,
}

/// Minimal client for namespaced object lookups.
#[derive(Debug, Clone)]
pub struct KubeClient {
    http: reqwest::Client,
    api_server: String,
    token: Option<String>,
}

impl KubeClient {
    /// Build a client from config. Missing token or CA files are skipped so
    /// the same config works against a local, unauthenticated API proxy.
    pub fn from_config(config: &KubeConfig) -> Result<Self, StoreError> {
        let mut builder = reqwest::Client::builder();

        if let Some(ca_file) = &config.ca_file {
            match std::fs::read(ca_file) {
                Ok(pem) => {
                    let cert = reqwest::Certificate::from_pem(&pem)?;
                    builder = builder.add_root_certificate(cert);
                }
                Err(e) => {
                    tracing::warn!(path = %ca_file.display(), error = %e, "Skipping cluster CA");
                }
            }
        }

        let token = match &config.token_file {
            Some(token_file) => match std::fs::read_to_string(token_file) {
                Ok(token) => Some(token.trim().to_string()),
                Err(e) => {
                    tracing::warn!(
                        path = %token_file.display(),
                        error = %e,
                        "Skipping service account token"
                    );
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            http: builder.build()?,
            api_server: config.api_server.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// GET an object by API path. Returns `Ok(None)` on 404.
    async fn get_object<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, StoreError> {
        let mut request = self.http.get(format!("{}{}", self.api_server, path));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json::<T>().await?)),
            status => Err(StoreError::Unavailable(format!("GET {path} returned {status}"))),
        }
    }
}

#[async_trait]
impl RecordStore for KubeClient {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<StoredRecord>, StoreError> {
        let path = format!("/api/v1/namespaces/{namespace}/secrets/{name}");
        let secret: Option<Secret> = self.get_object(&path).await?;
        Ok(secret.map(|s| StoredRecord {
            annotations: s.metadata.annotations.unwrap_or_default(),
        }))
    }
}

#[derive(Debug, Default, Deserialize)]
struct PlatformConfig {
    #[serde(default)]
    multicluster: Option<MultiClusterOptions>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MultiClusterOptions {
    #[serde(default)]
    cluster_role: Option<String>,
}

/// Extract the cluster role from the embedded platform YAML.
///
/// A deployment without multi-cluster settings is a standalone host.
fn parse_cluster_role(platform_yaml: &str) -> Result<ClusterRole, RoleError> {
    let config: Option<PlatformConfig> = serde_yaml::from_str(platform_yaml)?;
    let role = config
        .and_then(|c| c.multicluster)
        .and_then(|m| m.cluster_role)
        .filter(|r| !r.is_empty());
    Ok(role.map(ClusterRole::new).unwrap_or_else(ClusterRole::host))
}

/// Reads the cluster role from the platform ConfigMap.
#[derive(Debug, Clone)]
pub struct KubeClusterRole {
    client: Arc<KubeClient>,
    namespace: String,
    config_map: String,
    key: String,
}

impl KubeClusterRole {
    pub fn new(
        client: Arc<KubeClient>,
        namespace: impl Into<String>,
        config_map: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            config_map: config_map.into(),
            key: key.into(),
        }
    }
}

#[async_trait]
impl ClusterRoleProvider for KubeClusterRole {
    async fn cluster_role(&self) -> Result<ClusterRole, RoleError> {
        let path = format!(
            "/api/v1/namespaces/{}/configmaps/{}",
            self.namespace, self.config_map
        );
        let config_map: ConfigMap = self
            .client
            .get_object(&path)
            .await?
            .ok_or_else(|| RoleError::NotFound(format!("{}/{}", self.namespace, self.config_map)))?;

        let platform_yaml = config_map
            .data
            .and_then(|mut data| data.remove(&self.key))
            .ok_or_else(|| {
                RoleError::NotFound(format!(
                    "{}/{} has no key {}",
                    self.namespace, self.config_map, self.key
                ))
            })?;

        parse_cluster_role(&platform_yaml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Path, http::StatusCode as HttpStatus, routing::get, Json, Router};
    use tokio::net::TcpListener;

    async fn fake_secret(
        Path((namespace, name)): Path<(String, String)>,
    ) -> Result<Json<serde_json::Value>, HttpStatus> {
        match (namespace.as_str(), name.as_str()) {
            ("kubesphere-system", "kubesphere-license") => Ok(Json(serde_json::json!({
                "kind": "Secret",
                "metadata": {
                    "name": "kubesphere-license",
                    "annotations": { "license.kubesphere.io/status": "{\"violation\":{\"type\":\"NoViolation\"}}" }
                },
                "data": { "license": "ZXhhbXBsZQ==" }
            }))),
            ("kubesphere-system", "bare") => Ok(Json(serde_json::json!({
                "kind": "Secret",
                "metadata": { "name": "bare" }
            }))),
            ("broken", _) => Err(HttpStatus::INTERNAL_SERVER_ERROR),
            _ => Err(HttpStatus::NOT_FOUND),
        }
    }

    async fn fake_config_map(
        Path((_namespace, name)): Path<(String, String)>,
    ) -> Result<Json<serde_json::Value>, HttpStatus> {
        match name.as_str() {
            "kubesphere-config" => Ok(Json(serde_json::json!({
                "data": { "kubesphere.yaml": "multicluster:\n  clusterRole: member\n" }
            }))),
            _ => Err(HttpStatus::NOT_FOUND),
        }
    }

    async fn spawn_fake_apiserver() -> KubeClient {
        let app = Router::new()
            .route("/api/v1/namespaces/:ns/secrets/:name", get(fake_secret))
            .route("/api/v1/namespaces/:ns/configmaps/:name", get(fake_config_map));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        KubeClient::from_config(&KubeConfig {
            api_server: format!("http://{addr}/"),
            token_file: None,
            ca_file: None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_secret_annotations_are_returned() {
        let client = spawn_fake_apiserver().await;

        let record = client
            .get("kubesphere-system", "kubesphere-license")
            .await
            .unwrap()
            .unwrap();
        assert!(record
            .annotations
            .contains_key("license.kubesphere.io/status"));

        let bare = client.get("kubesphere-system", "bare").await.unwrap().unwrap();
        assert!(bare.annotations.is_empty());
    }

    #[tokio::test]
    async fn test_missing_secret_and_server_errors() {
        let client = spawn_fake_apiserver().await;

        assert!(client.get("kubesphere-system", "nope").await.unwrap().is_none());
        assert!(matches!(
            client.get("broken", "kubesphere-license").await,
            Err(StoreError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_cluster_role_from_config_map() {
        let client = Arc::new(spawn_fake_apiserver().await);

        let provider = KubeClusterRole::new(
            client.clone(),
            "kubesphere-system",
            "kubesphere-config",
            "kubesphere.yaml",
        );
        assert_eq!(provider.cluster_role().await.unwrap(), ClusterRole::member());

        let missing = KubeClusterRole::new(client.clone(), "kubesphere-system", "absent", "k");
        assert!(matches!(
            missing.cluster_role().await,
            Err(RoleError::NotFound(_))
        ));

        let wrong_key =
            KubeClusterRole::new(client, "kubesphere-system", "kubesphere-config", "other");
        assert!(matches!(
            wrong_key.cluster_role().await,
            Err(RoleError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_apiserver() {
        let client = KubeClient::from_config(&KubeConfig {
            api_server: "http://127.0.0.1:1".to_string(),
            token_file: None,
            ca_file: None,
        })
        .unwrap();
        assert!(matches!(
            client.get("ns", "name").await,
            Err(StoreError::Unavailable(_))
        ));
    }

    #[test]
    fn test_parse_cluster_role() {
        assert_eq!(
            parse_cluster_role("multicluster:\n  clusterRole: host\n").unwrap(),
            ClusterRole::host()
        );
        assert_eq!(
            parse_cluster_role("authentication:\n  jwtSecret: x\n").unwrap(),
            ClusterRole::host()
        );
        assert_eq!(
            parse_cluster_role("multicluster:\n  clusterRole: \"\"\n").unwrap(),
            ClusterRole::host()
        );
        assert!(parse_cluster_role("multicluster: [").is_err());
    }
}
