//! license-gate - license-enforcing front for the control-plane API server.
//!
//! Reads config from env vars:
//!   LICENSE_GATE_CONFIG    - YAML config path (optional)
//!   LICENSE_GATE_BIND_ADDR - listen address (default: 0.0.0.0:9090)
//!   LICENSE_GATE_UPSTREAM  - API server base URL (required unless set in YAML)

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use license_gate::server::{forward, Upstream};
use license_gate::{
    build_router, Backends, GateConfig, LicenseGate, PolicyEvaluator, StatusCache, StatusSource,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,license_gate=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GateConfig::load().context("failed to load configuration")?;
    let upstream_url = config
        .upstream
        .clone()
        .context("LICENSE_GATE_UPSTREAM or `upstream` must be set")?;

    tracing::info!(
        upstream = %upstream_url,
        interval = ?config.refresh.interval(),
        "Configuration loaded"
    );

    let backends = Backends::from_config(&config)?;

    // Role is checked once here; a disabled gate never starts the refresher.
    let gate = LicenseGate::bootstrap(
        backends.roles.as_ref(),
        StatusCache::new(),
        PolicyEvaluator::new(config.policy.exemptions.clone()),
    )
    .await;
    let refresher = gate.start_refresher(
        StatusSource::new(backends.store.clone(), &config.status),
        &config.refresh,
    );

    let api = Router::new()
        .fallback(forward)
        .with_state(Upstream::new(upstream_url)?);
    let app = build_router(&gate, api);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;
    tracing::info!("license-gate listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(refresher) = refresher {
        refresher.shutdown().await;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
