use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::credentials::GcpCredentials;
use crate::application::{dto::PredictInstance, ports::PredictionPort};
use crate::domain::{
    errors::{DomainResult, InspectError},
    prediction::PredictionResult,
};

/// Fully qualified online-prediction endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointName {
    pub project_id: String,
    pub location: String,
    pub endpoint_id: String,
}

impl EndpointName {
    pub fn predict_url(&self) -> String {
        format!(
            "https://{loc}-aiplatform.googleapis.com/v1/projects/{project}/locations/{loc}/endpoints/{endpoint}:predict",
            loc = self.location,
            project = self.project_id,
            endpoint = self.endpoint_id,
        )
    }
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    instances: &'a [PredictInstance],
}

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClassificationPrediction {
    display_names: Vec<String>,
    confidences: Vec<f64>,
}

/// Authenticated handle to one Vertex AI classification endpoint.
pub struct VertexEndpoint {
    http: reqwest::Client,
    credentials: Arc<GcpCredentials>,
    url: String,
}

impl VertexEndpoint {
    pub fn new(http: reqwest::Client, credentials: Arc<GcpCredentials>, name: &EndpointName) -> Self {
        Self { http, credentials, url: name.predict_url() }
    }
}

#[async_trait]
impl PredictionPort for VertexEndpoint {
    #[tracing::instrument(name = "VertexEndpoint::predict", skip_all, fields(url = %self.url))]
    async fn predict(&self, instances: &[PredictInstance]) -> DomainResult<PredictionResult> {
        let token = self.credentials.access_token().await?;

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(token)
            .json(&PredictRequest { instances })
            .send()
            .await
            .map_err(|e| InspectError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| InspectError::Transport(e.to_string()))?;
        debug!(%status, bytes = body.len(), "prediction response");

        if !status.is_success() {
            return Err(status_error(status, &String::from_utf8_lossy(&body)));
        }
        parse_predict_response(&body)
    }
}

fn status_error(status: StatusCode, body: &str) -> InspectError {
    let msg = format!("endpoint returned {status}: {}", body.trim());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => InspectError::Authentication(msg),
        // wrong PROJECT_ID / ENDPOINT_ID / LOCATION
        StatusCode::NOT_FOUND => InspectError::Configuration(msg),
        StatusCode::TOO_MANY_REQUESTS => InspectError::Transport(msg),
        s if s.is_client_error() => InspectError::InvalidInput(msg),
        _ => InspectError::Transport(msg),
    }
}

/// Extracts `predictions[0].displayNames/confidences`.
pub fn parse_predict_response(body: &[u8]) -> DomainResult<PredictionResult> {
    let response: PredictResponse = serde_json::from_slice(body)
        .map_err(|e| InspectError::MalformedResponse(format!("not a predict response: {e}")))?;
    let first = response
        .predictions
        .into_iter()
        .next()
        .ok_or_else(|| InspectError::MalformedResponse("response has no predictions".into()))?;
    let prediction: ClassificationPrediction = serde_json::from_value(first)
        .map_err(|e| InspectError::MalformedResponse(format!("unexpected prediction shape: {e}")))?;
    PredictionResult::new(prediction.display_names, prediction.confidences)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predict_url_embeds_location_twice() {
        let name = EndpointName {
            project_id: "factory-42".into(),
            location: "us-central1".into(),
            endpoint_id: "987".into(),
        };
        assert_eq!(
            name.predict_url(),
            "https://us-central1-aiplatform.googleapis.com/v1/projects/factory-42/locations/us-central1/endpoints/987:predict"
        );
    }

    #[test]
    fn request_wraps_single_instance() {
        let instances = [PredictInstance { content: "aGk=".into() }];
        let json = serde_json::to_value(PredictRequest { instances: &instances }).unwrap();
        assert_eq!(json, serde_json::json!({ "instances": [{ "content": "aGk=" }] }));
    }

    #[test]
    fn parses_first_prediction() {
        let body = br#"{
            "predictions": [
                { "ids": ["1", "2"], "displayNames": ["Normal", "Defect"], "confidences": [0.25, 0.75] },
                { "displayNames": ["ignored"], "confidences": [1.0] }
            ],
            "deployedModelId": "555"
        }"#;
        let result = parse_predict_response(body).unwrap();
        assert_eq!(result.labels(), ["Normal", "Defect"]);
        assert_eq!(result.best_label(), "Defect");
    }

    #[test]
    fn shape_problems_are_malformed_responses() {
        let bodies: [&[u8]; 5] = [
            br#"{"predictions": []}"#,
            br#"{}"#,
            br#"{"predictions": [{"displayNames": ["a"]}]}"#,
            br#"{"predictions": [{"displayNames": ["a", "b"], "confidences": [1.0]}]}"#,
            b"<html>gateway</html>",
        ];
        for body in bodies {
            let err = parse_predict_response(body).unwrap_err();
            assert!(matches!(err, InspectError::MalformedResponse(_)), "{err}");
        }
    }

    #[test]
    fn status_codes_map_to_error_kinds() {
        assert!(matches!(status_error(StatusCode::FORBIDDEN, ""), InspectError::Authentication(_)));
        assert!(matches!(status_error(StatusCode::BAD_REQUEST, ""), InspectError::InvalidInput(_)));
        assert!(status_error(StatusCode::SERVICE_UNAVAILABLE, "").is_retryable());
        assert!(status_error(StatusCode::TOO_MANY_REQUESTS, "").is_retryable());
    }

    #[test]
    fn missing_endpoint_is_a_configuration_error() {
        let err = status_error(StatusCode::NOT_FOUND, "Endpoint `projects/p/locations/l/endpoints/9` not found.");
        assert!(matches!(err, InspectError::Configuration(_)));
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("not found"));
    }
}
