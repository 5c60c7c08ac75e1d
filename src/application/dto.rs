use serde::{Deserialize, Serialize};

use crate::domain::{
    errors::InspectError,
    input::ImageSource,
    session::SessionStats,
    verdict::VerdictDisplay,
};

/// One entry of the `instances` array sent to the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictInstance {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub total_inspected: u64,
    pub defect_count: u64,
    pub normal_count: u64,
    /// Percentage, absent until the first inspection.
    pub defect_rate: Option<f64>,
    pub defect_rate_text: String,
}

impl From<SessionStats> for SessionResponse {
    fn from(s: SessionStats) -> Self {
        Self {
            total_inspected: s.total_inspected,
            defect_count: s.defect_count,
            normal_count: s.normal_count,
            defect_rate: s.defect_rate(),
            defect_rate_text: s.defect_rate_text(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectResponse {
    pub source: ImageSource,
    pub result: VerdictDisplay,
    pub score_text: String,
    pub session: SessionResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
    pub retryable: bool,
}

impl From<&InspectError> for ErrorResponse {
    fn from(e: &InspectError) -> Self {
        Self { error: e.to_string(), kind: e.kind().to_string(), retryable: e.is_retryable() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub endpoint_ready: bool,
    pub active_sessions: u64,
}
