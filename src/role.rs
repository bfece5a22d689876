//! Cluster role lookup
//!
//! The role is read once when the license gate is built. Member clusters are
//! governed by their host cluster's license and never enforce it themselves.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RoleError;

const MEMBER: &str = "member";
const HOST: &str = "host";

/// Role of this cluster in a multi-cluster deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterRole(String);

impl ClusterRole {
    pub fn new(role: impl Into<String>) -> Self {
        Self(role.into())
    }

    pub fn host() -> Self {
        Self::new(HOST)
    }

    pub fn member() -> Self {
        Self::new(MEMBER)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Every role except `member` enforces the license.
    pub fn enforces_license(&self) -> bool {
        self.0 != MEMBER
    }
}

impl fmt::Display for ClusterRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
pub trait ClusterRoleProvider: Send + Sync {
    async fn cluster_role(&self) -> Result<ClusterRole, RoleError>;
}

/// A role fixed by configuration.
#[derive(Debug, Clone)]
pub struct StaticClusterRole(pub ClusterRole);

#[async_trait]
impl ClusterRoleProvider for StaticClusterRole {
    async fn cluster_role(&self) -> Result<ClusterRole, RoleError> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_member_skips_enforcement() {
        assert!(!ClusterRole::member().enforces_license());
        assert!(ClusterRole::host().enforces_license());
        assert!(ClusterRole::new("none").enforces_license());
        assert!(ClusterRole::new("").enforces_license());
        // role strings are matched exactly
        assert!(ClusterRole::new("Member").enforces_license());
    }

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticClusterRole(ClusterRole::member());
        assert_eq!(provider.cluster_role().await.unwrap(), ClusterRole::member());
    }
}
