//! License filter - wraps the API router and enforces the published license state.
//!
//! The cluster role is checked once when the gate is bootstrapped. On member
//! clusters (or when the role cannot be determined) the gate is disabled: it
//! adds no middleware and never starts a refresher.
//!
//! When enabled, every request is checked against the cached violation:
//! - `Allow` forwards the request untouched
//! - `Deny` answers [`LICENSE_VIOLATION_STATUS`] without forwarding
//! - `AllowWithAnnotation` forwards and adds the `violation-*` headers

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::{self as axum_mw, Next},
    response::{IntoResponse, Response},
    Router,
};
use chrono::{DateTime, SecondsFormat, Utc};

use super::request_info::RequestInfo;
use crate::cache::StatusCache;
use crate::config::RefreshConfig;
use crate::policy::{PolicyEvaluator, Verdict};
use crate::refresh::{Refresher, RefresherHandle};
use crate::role::ClusterRoleProvider;
use crate::status::StatusSource;
use crate::violation::Violation;

/// Status returned for writes blocked by a license violation.
///
/// Part of the client contract; do not change between releases.
pub const LICENSE_VIOLATION_STATUS: StatusCode = StatusCode::PAYMENT_REQUIRED;

pub const VIOLATION_TYPE: HeaderName = HeaderName::from_static("violation-type");
pub const VIOLATION_EXPECTED: HeaderName = HeaderName::from_static("violation-expected");
pub const VIOLATION_CURRENT: HeaderName = HeaderName::from_static("violation-current");
pub const VIOLATION_START_TIME: HeaderName = HeaderName::from_static("violation-start-time");
pub const VIOLATION_END_TIME: HeaderName = HeaderName::from_static("violation-end-time");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateMode {
    /// Pass-through; set at bootstrap and never left.
    Disabled,
    Enabled,
}

/// The license filter and the state it reads.
#[derive(Debug, Clone)]
pub struct LicenseGate {
    mode: GateMode,
    cache: StatusCache,
    policy: Arc<PolicyEvaluator>,
}

impl LicenseGate {
    /// Check the cluster role once and build the gate accordingly.
    pub async fn bootstrap(
        roles: &dyn ClusterRoleProvider,
        cache: StatusCache,
        policy: PolicyEvaluator,
    ) -> Self {
        let mode = match roles.cluster_role().await {
            Ok(role) if role.enforces_license() => {
                tracing::info!(role = %role, "License enforcement enabled");
                GateMode::Enabled
            }
            Ok(role) => {
                tracing::info!(role = %role, "Member cluster, skipping license check");
                GateMode::Disabled
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to get cluster role, skipping license check");
                GateMode::Disabled
            }
        };

        Self::with_mode(mode, cache, policy)
    }

    pub fn with_mode(mode: GateMode, cache: StatusCache, policy: PolicyEvaluator) -> Self {
        Self {
            mode,
            cache,
            policy: Arc::new(policy),
        }
    }

    pub fn mode(&self) -> GateMode {
        self.mode
    }

    pub fn is_enabled(&self) -> bool {
        self.mode == GateMode::Enabled
    }

    pub fn cache(&self) -> &StatusCache {
        &self.cache
    }

    /// Start refreshing the cache in the background.
    ///
    /// Returns `None` on a disabled gate; nothing is spawned.
    pub fn start_refresher(
        &self,
        source: StatusSource,
        config: &RefreshConfig,
    ) -> Option<RefresherHandle> {
        if !self.is_enabled() {
            return None;
        }
        Some(Refresher::new(source, self.cache.clone(), config).spawn())
    }

    /// Decide a request against the currently published state.
    pub fn check(&self, info: &RequestInfo) -> (Verdict, Arc<Violation>) {
        let violation = self.cache.current();
        let verdict = self.policy.decide(&violation, &info.verb, &info.path);
        (verdict, violation)
    }

    /// Wrap `router` with the filter. A disabled gate returns it unchanged.
    ///
    /// The filter reads [`RequestInfo`], so a resolver layer must be applied
    /// outside this one.
    pub fn wrap<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        match self.mode {
            GateMode::Disabled => router,
            GateMode::Enabled => {
                router.layer(axum_mw::from_fn_with_state(self.clone(), license_filter))
            }
        }
    }
}

async fn license_filter(State(gate): State<LicenseGate>, request: Request, next: Next) -> Response {
    let Some(info) = request.extensions().get::<RequestInfo>().cloned() else {
        tracing::error!(uri = %request.uri(), "Unable to retrieve request info from request");
        return next.run(request).await;
    };

    let (verdict, violation) = gate.check(&info);
    match verdict {
        Verdict::Allow => next.run(request).await,
        Verdict::Deny => {
            tracing::debug!(
                path = %info.path,
                verb = %info.verb,
                reason = %violation.kind,
                "Forbidden by license"
            );
            let mut response = LICENSE_VIOLATION_STATUS.into_response();
            if let Some(value) = header_value(violation.kind.as_str()) {
                response.headers_mut().insert(VIOLATION_TYPE, value);
            }
            response
        }
        Verdict::AllowWithAnnotation => {
            tracing::debug!(
                path = %info.path,
                violation = %violation.kind,
                expected = violation.expected,
                current = violation.current,
                "Annotating response with license violation"
            );
            let mut response = next.run(request).await;
            response.headers_mut().extend(violation_headers(&violation));
            response
        }
    }
}

/// Headers describing `violation` to the client.
///
/// Each count is only emitted when non-zero and each time only when present.
pub fn violation_headers(violation: &Violation) -> HeaderMap {
    let mut headers = HeaderMap::new();

    if let Some(value) = header_value(violation.kind.as_str()) {
        headers.insert(VIOLATION_TYPE, value);
    }

    if violation.expected != 0 {
        headers.insert(VIOLATION_EXPECTED, HeaderValue::from(violation.expected));
    }
    if violation.current != 0 {
        headers.insert(VIOLATION_CURRENT, HeaderValue::from(violation.current));
    }

    if let Some(value) = violation.start_time.as_ref().and_then(time_value) {
        headers.insert(VIOLATION_START_TIME, value);
    }
    if let Some(value) = violation.end_time.as_ref().and_then(time_value) {
        headers.insert(VIOLATION_END_TIME, value);
    }

    headers
}

fn time_value(time: &DateTime<Utc>) -> Option<HeaderValue> {
    header_value(&time.to_rfc3339_opts(SecondsFormat::Secs, true))
}

fn header_value(s: &str) -> Option<HeaderValue> {
    match HeaderValue::from_str(s) {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(value = %s, "Violation field is not a valid header value");
            None
        }
    }
}
