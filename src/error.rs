use std::time::Duration;

use thiserror::Error;

/// Top-level error for gateway construction and wiring.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("status store error: {0}")]
    Store(#[from] StoreError),
}

/// Failures talking to the external status store.
///
/// A missing record is not an error; stores report it as `Ok(None)`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("malformed store response: {0}")]
    Decode(String),

    #[error("store lookup timed out after {0:?}")]
    Timeout(Duration),
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            StoreError::Decode(e.to_string())
        } else {
            StoreError::Unavailable(e.to_string())
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum RoleError {
    #[error("role source unavailable: {0}")]
    Unavailable(#[from] StoreError),

    #[error("cluster configuration not found: {0}")]
    NotFound(String),

    #[error("invalid cluster configuration: {0}")]
    Invalid(#[from] serde_yaml::Error),
}

/// Failures forwarding a request to the upstream API server.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("unsupported method: {0}")]
    Method(String),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("upstream returned invalid status {0}")]
    Status(u16),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
