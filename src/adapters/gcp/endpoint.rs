use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{error, info};

use super::credentials::{CredentialSource, GcpCredentials};
use super::vertex::{EndpointName, VertexEndpoint};
use crate::application::ports::{EndpointPort, PredictionPort};
use crate::config::AppConfig;
use crate::domain::errors::{DomainResult, InspectError};

/// Builds a fresh endpoint handle. Called at most once per successful build.
#[async_trait]
pub trait EndpointFactory: Send + Sync {
    async fn build(&self) -> DomainResult<Arc<dyn PredictionPort>>;
}

pub struct VertexEndpointFactory {
    name: EndpointName,
    service_account: Option<serde_json::Value>,
    http: reqwest::Client,
}

impl VertexEndpointFactory {
    pub fn from_config(cfg: &AppConfig, http: reqwest::Client) -> Self {
        Self {
            name: EndpointName {
                project_id: cfg.project_id.clone(),
                location: cfg.location.clone(),
                endpoint_id: cfg.endpoint_id.clone(),
            },
            service_account: cfg.service_account.clone(),
            http,
        }
    }
}

#[async_trait]
impl EndpointFactory for VertexEndpointFactory {
    async fn build(&self) -> DomainResult<Arc<dyn PredictionPort>> {
        if self.name.project_id.is_empty() || self.name.endpoint_id.is_empty() {
            return Err(InspectError::Configuration("PROJECT_ID and ENDPOINT_ID must be set".into()));
        }

        let source = match &self.service_account {
            Some(embedded) => CredentialSource::from_embedded(embedded),
            None => CredentialSource::ambient().await,
        }
        .map_err(|e| InspectError::Authentication(format!("{e:#}")))?;

        let credentials = Arc::new(GcpCredentials::new(source, self.http.clone()));
        info!(
            project = %self.name.project_id,
            location = %self.name.location,
            endpoint = %self.name.endpoint_id,
            credentials = %credentials.source().describe(),
            "prediction endpoint initialised"
        );
        Ok(Arc::new(VertexEndpoint::new(self.http.clone(), credentials, &self.name)))
    }
}

/// Process-wide endpoint handle, built on first use.
///
/// A failed build leaves the cell empty so the next inspection tries again.
pub struct MemoizedEndpoint {
    factory: Arc<dyn EndpointFactory>,
    cell: OnceCell<Arc<dyn PredictionPort>>,
}

impl MemoizedEndpoint {
    pub fn new(factory: Arc<dyn EndpointFactory>) -> Self {
        Self { factory, cell: OnceCell::new() }
    }
}

#[async_trait]
impl EndpointPort for MemoizedEndpoint {
    async fn endpoint(&self) -> DomainResult<Arc<dyn PredictionPort>> {
        self.cell
            .get_or_try_init(|| async {
                self.factory.build().await.map_err(|e| {
                    error!("endpoint initialisation failed: {e}");
                    e
                })
            })
            .await
            .cloned()
    }

    fn is_ready(&self) -> bool {
        self.cell.initialized()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::application::services::tests::FakeEndpoint;

    struct CountingFactory {
        builds: AtomicUsize,
        fail_first: bool,
    }

    #[async_trait]
    impl EndpointFactory for CountingFactory {
        async fn build(&self) -> DomainResult<Arc<dyn PredictionPort>> {
            let n = self.builds.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            if self.fail_first && n == 0 {
                return Err(InspectError::Authentication("token endpoint unreachable".into()));
            }
            Ok(Arc::new(FakeEndpoint::default()))
        }
    }

    fn counting(fail_first: bool) -> Arc<CountingFactory> {
        Arc::new(CountingFactory { builds: AtomicUsize::new(0), fail_first })
    }

    #[tokio::test]
    async fn builds_once_under_concurrency() {
        let factory = counting(false);
        let memo = Arc::new(MemoizedEndpoint::new(factory.clone()));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let memo = memo.clone();
                tokio::spawn(async move { memo.endpoint().await.map(|_| ()) })
            })
            .collect();
        for t in tasks {
            t.await.unwrap().unwrap();
        }

        let a = memo.endpoint().await.unwrap();
        let b = memo.endpoint().await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
        assert!(memo.is_ready());
    }

    #[tokio::test]
    async fn failed_build_is_retried_later() {
        let factory = counting(true);
        let memo = MemoizedEndpoint::new(factory.clone());

        let err = memo.endpoint().await.err().unwrap();
        assert!(matches!(err, InspectError::Authentication(_)));
        assert!(!memo.is_ready());

        memo.endpoint().await.unwrap();
        memo.endpoint().await.unwrap();
        assert_eq!(factory.builds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn missing_ids_are_a_configuration_error() {
        let cfg = AppConfig::from_sources(None, |_| None).unwrap();
        let factory = VertexEndpointFactory::from_config(&cfg, reqwest::Client::new());
        let err = factory.build().await.err().unwrap();
        assert!(matches!(err, InspectError::Configuration(_)));
    }

    #[tokio::test]
    async fn bad_embedded_key_is_an_authentication_error() {
        let env = |k: &str| match k {
            "PROJECT_ID" => Some("p".to_string()),
            "ENDPOINT_ID" => Some("1".to_string()),
            "GOOGLE_APPLICATION_CREDENTIALS_JSON" => Some(r#"{"client_email":"x"}"#.to_string()),
            _ => None,
        };
        let cfg = AppConfig::from_sources(None, env).unwrap();
        let factory = VertexEndpointFactory::from_config(&cfg, reqwest::Client::new());
        let err = factory.build().await.err().unwrap();
        assert!(matches!(err, InspectError::Authentication(_)));
    }
}
