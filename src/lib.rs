//! License Gate - license-enforcement filter for the control-plane API
//!
//! The gate sits in front of the API server and keeps mutating requests from
//! proceeding while the license is violated. License state is read off the
//! request path: a background refresher fetches it once per interval and
//! publishes it atomically, and each request only loads the published value.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Record store (Kubernetes Secret / file / memory)               │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │  StatusSource::fetch
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Refresher (background task, every interval)                    │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │  StatusCache::publish
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  StatusCache (ArcSwap<Violation>)                               │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │  StatusCache::current
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  LicenseGate filter → PolicyEvaluator → Allow / Deny / Annotate │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//!                         inner API handler
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use license_gate::{Backends, GateConfig, LicenseGate, PolicyEvaluator, StatusCache, StatusSource};
//!
//! let config = GateConfig::load()?;
//! let backends = Backends::from_config(&config)?;
//!
//! let gate = LicenseGate::bootstrap(
//!     backends.roles.as_ref(),
//!     StatusCache::new(),
//!     PolicyEvaluator::new(config.policy.exemptions.clone()),
//! )
//! .await;
//! let refresher = gate.start_refresher(
//!     StatusSource::new(backends.store, &config.status),
//!     &config.refresh,
//! );
//!
//! let app = license_gate::build_router(&gate, api_router);
//! ```

pub mod backends;
pub mod cache;
pub mod config;
pub mod error;
pub mod policy;
pub mod refresh;
pub mod role;
pub mod server;
pub mod status;
pub mod violation;

// Re-export main types
pub use backends::Backends;
pub use cache::StatusCache;
pub use config::GateConfig;
pub use error::{ConfigError, GateError, ProxyError, RoleError, StoreError};
pub use policy::{Exemption, PolicyEvaluator, Verdict};
pub use refresh::{Refresher, RefresherHandle};
pub use role::{ClusterRole, ClusterRoleProvider, StaticClusterRole};
pub use server::{build_router, GateMode, LicenseGate, RequestInfo, LICENSE_VIOLATION_STATUS};
pub use status::{RecordStore, StatusSource, StoredRecord};
pub use violation::{LicenseStatus, Violation, ViolationType};
