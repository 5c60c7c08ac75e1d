pub mod multipart;
pub mod routes;
pub mod session;
pub mod state;
pub mod views;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::adapters::http::state::HttpState;

pub fn router(state: HttpState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(routes::dashboard))
        .route("/inspect", post(routes::inspect_form))
        .route("/api/inspect", post(routes::inspect_api))
        .route("/api/session", get(routes::session_stats))
        .route("/healthz", get(routes::healthz))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
