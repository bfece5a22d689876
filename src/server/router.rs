//! Router construction for the license gate.

use axum::{extract::State, middleware as axum_mw, routing::get, Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use super::filter::LicenseGate;
use super::request_info::resolve_request_info;
use crate::violation::Violation;

/// Compose the full router: `api` behind the license filter, plus the
/// gate's own endpoints which are never filtered.
pub fn build_router(gate: &LicenseGate, api: Router) -> Router {
    // Layers added later run first: resolve request info, then check the license.
    let filtered = gate
        .wrap(api)
        .layer(axum_mw::from_fn(resolve_request_info));

    let public = Router::new()
        .route("/healthz", get(health))
        .route("/license/status", get(license_status))
        .with_state(gate.clone());

    public.merge(filtered).layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
struct LicenseStatusResponse {
    enforced: bool,
    violation: Violation,
}

async fn license_status(State(gate): State<LicenseGate>) -> Json<LicenseStatusResponse> {
    Json(LicenseStatusResponse {
        enforced: gate.is_enabled(),
        violation: gate.cache().current().as_ref().clone(),
    })
}
