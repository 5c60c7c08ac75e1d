use std::sync::Arc;

use super::views::Views;
use crate::application::{services::InspectionService, sessions::SessionRegistry};

/// Shared state for the axum handlers.
/// Holds the use cases; per-operator counters live in the session registry, never here.
#[derive(Clone)]
pub struct HttpState {
    /// Prediction orchestrator, shared by every session.
    pub inspection: Arc<InspectionService>,
    /// Session id -> counters.
    pub sessions: SessionRegistry,
    pub views: Arc<Views>,
}
