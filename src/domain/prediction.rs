use serde::{Deserialize, Serialize};

use super::errors::{DomainResult, InspectError};

/// Parallel label/confidence arrays as returned by the classifier, in response order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    labels: Vec<String>,
    confidences: Vec<f64>,
}

impl PredictionResult {
    pub fn new(labels: Vec<String>, confidences: Vec<f64>) -> DomainResult<Self> {
        if labels.len() != confidences.len() {
            return Err(InspectError::MalformedResponse(format!(
                "{} labels but {} confidences",
                labels.len(),
                confidences.len()
            )));
        }
        if labels.is_empty() {
            return Err(InspectError::MalformedResponse("prediction has no labels".into()));
        }
        Ok(Self { labels, confidences })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Index of the highest confidence. Ties resolve to the lowest index.
    pub fn best_index(&self) -> usize {
        let mut best = 0;
        for (i, &c) in self.confidences.iter().enumerate().skip(1) {
            if c > self.confidences[best] {
                best = i;
            }
        }
        best
    }

    pub fn best_label(&self) -> &str {
        &self.labels[self.best_index()]
    }

    /// Winning confidence scaled to 0..=100.
    pub fn best_score(&self) -> f64 {
        self.confidences[self.best_index()] * 100.0
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.confidences.iter().copied())
    }
}
