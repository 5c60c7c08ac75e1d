use std::sync::Arc;

use async_trait::async_trait;

use crate::application::dto::PredictInstance;
use crate::domain::{errors::DomainResult, prediction::PredictionResult};

/// A ready, authenticated handle to one remote prediction endpoint.
#[async_trait]
pub trait PredictionPort: Send + Sync {
    /// One attempt, no retry. Returns the first prediction record of the response.
    async fn predict(&self, instances: &[PredictInstance]) -> DomainResult<PredictionResult>;
}

/// Hands out the process-wide endpoint handle, building it on first use.
#[async_trait]
pub trait EndpointPort: Send + Sync {
    async fn endpoint(&self) -> DomainResult<Arc<dyn PredictionPort>>;

    /// True once a handle has been built successfully.
    fn is_ready(&self) -> bool;
}
