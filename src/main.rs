mod adapters;
mod application;
mod config;
mod domain;

use std::sync::Arc;

use tower_http::services::ServeDir;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::adapters::{
    gcp::endpoint::{MemoizedEndpoint, VertexEndpointFactory},
    http::{router, state::HttpState, views::Views},
};
use crate::application::{services::InspectionService, sessions::SessionRegistry};
use crate::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Logs (RUST_LOG, info by default)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Configuration, read once
    let cfg = AppConfig::load()?;
    if cfg.project_id.is_empty() || cfg.endpoint_id.is_empty() {
        tracing::warn!("PROJECT_ID / ENDPOINT_ID not set; inspections will fail until configured");
    }
    tracing::info!(
        project = %cfg.project_id,
        endpoint = %cfg.endpoint_id,
        location = %cfg.location,
        embedded_credentials = cfg.service_account.is_some(),
        defect_labels = ?cfg.defect_labels,
        "🔧 configuration loaded"
    );

    // 3. Adapters. The endpoint handle is built lazily on the first inspection.
    let http = reqwest::Client::builder()
        .user_agent(concat!("weld-inspector/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let factory = Arc::new(VertexEndpointFactory::from_config(&cfg, http));
    let endpoints = Arc::new(MemoizedEndpoint::new(factory));

    // 4. Use cases and per-session state
    let inspection = Arc::new(InspectionService::new(endpoints, cfg.defect_policy()));
    let state = HttpState {
        inspection,
        sessions: SessionRegistry::new(cfg.session_idle),
        views: Arc::new(Views::new()?),
    };

    // 5. Router plus static assets
    let app = router(state, cfg.max_upload_bytes).fallback_service(ServeDir::new(&cfg.static_dir));

    tracing::info!("🚀 weld inspector listening on http://{}", cfg.bind_addr);
    tracing::info!("📂 static assets served from {}", cfg.static_dir.display());

    let listener = tokio::net::TcpListener::bind(cfg.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
