use thiserror::Error;

/// Failure taxonomy for a single inspection.
///
/// Only `Transport` is worth retrying; everything else needs a config or input change.
#[derive(Debug, Error)]
pub enum InspectError {
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("prediction request failed: {0}")]
    Transport(String),
    #[error("malformed prediction response: {0}")]
    MalformedResponse(String),
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl InspectError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "authentication",
            Self::Transport(_) => "transport",
            Self::MalformedResponse(_) => "malformed_response",
            Self::UnsupportedFormat(_) => "unsupported_format",
            Self::InvalidInput(_) => "invalid_input",
            Self::Configuration(_) => "configuration",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

pub type DomainResult<T> = Result<T, InspectError>;
