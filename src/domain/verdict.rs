use serde::{Deserialize, Serialize};

use super::prediction::PredictionResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Defect,
    Normal,
}

impl Verdict {
    pub fn headline(self) -> &'static str {
        match self {
            Verdict::Defect => "DEFECT DETECTED",
            Verdict::Normal => "NORMAL",
        }
    }

    pub fn call_to_action(self) -> &'static str {
        match self {
            Verdict::Defect => "Stop the line immediately and call a supervisor.",
            Verdict::Normal => "Weld is good. Move the part on to the next station.",
        }
    }
}

/// Labels that count as a defect, compared case-insensitively against the winning label.
///
/// Exact match only: a label the model invents that is not listed here is a `Normal`.
#[derive(Debug, Clone)]
pub struct DefectPolicy {
    labels: Vec<String>,
}

impl DefectPolicy {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let labels = labels
            .into_iter()
            .map(|l| l.as_ref().trim().to_lowercase())
            .filter(|l| !l.is_empty())
            .collect();
        Self { labels }
    }

    pub fn classify(&self, label: &str) -> Verdict {
        let label = label.to_lowercase();
        if self.labels.iter().any(|l| *l == label) {
            Verdict::Defect
        } else {
            Verdict::Normal
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl Default for DefectPolicy {
    fn default() -> Self {
        Self::new(["defect", "bad weld"])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelConfidence {
    pub label: String,
    pub fraction: f64,
    pub percent: f64,
}

impl LabelConfidence {
    pub fn percent_text(&self) -> String {
        format!("{:.2}%", self.percent)
    }
}

/// Everything the verdict panel and the detail breakdown need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictDisplay {
    pub verdict: Verdict,
    pub headline: String,
    pub label: String,
    pub score_percent: f64,
    pub call_to_action: String,
    pub breakdown: Vec<LabelConfidence>,
}

impl VerdictDisplay {
    pub fn from_prediction(prediction: &PredictionResult, policy: &DefectPolicy) -> Self {
        let label = prediction.best_label().to_string();
        let verdict = policy.classify(&label);
        let breakdown = prediction
            .iter()
            .map(|(label, fraction)| LabelConfidence {
                label: label.to_string(),
                fraction,
                percent: fraction * 100.0,
            })
            .collect();

        Self {
            verdict,
            headline: verdict.headline().to_string(),
            label,
            score_percent: prediction.best_score(),
            call_to_action: verdict.call_to_action().to_string(),
            breakdown,
        }
    }

    pub fn score_text(&self) -> String {
        format!("{:.1}%", self.score_percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_ignores_case() {
        let policy = DefectPolicy::default();
        assert_eq!(policy.classify("DEFECT"), Verdict::Defect);
        assert_eq!(policy.classify("defect"), Verdict::Defect);
        assert_eq!(policy.classify("Bad Weld"), Verdict::Defect);
    }

    #[test]
    fn unknown_labels_are_normal() {
        let policy = DefectPolicy::default();
        assert_eq!(policy.classify("Unknown"), Verdict::Normal);
        assert_eq!(policy.classify("defects"), Verdict::Normal);
        assert_eq!(policy.classify("bad  weld"), Verdict::Normal);
    }

    #[test]
    fn custom_policy_replaces_defaults() {
        let policy = DefectPolicy::new(["Porosity", " crack ", ""]);
        assert_eq!(policy.labels(), ["porosity", "crack"]);
        assert_eq!(policy.classify("CRACK"), Verdict::Defect);
        assert_eq!(policy.classify("defect"), Verdict::Normal);
    }

    #[test]
    fn display_keeps_response_order_and_formats_scores() {
        let prediction = PredictionResult::new(
            vec!["Normal".into(), "Defect".into(), "Bad Weld".into()],
            vec![0.2, 0.9, 0.1],
        )
        .unwrap();
        let display = VerdictDisplay::from_prediction(&prediction, &DefectPolicy::default());

        assert_eq!(display.verdict, Verdict::Defect);
        assert_eq!(display.headline, "DEFECT DETECTED");
        assert_eq!(display.label, "Defect");
        assert_eq!(display.score_text(), "90.0%");

        let labels: Vec<_> = display.breakdown.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, ["Normal", "Defect", "Bad Weld"]);
        assert_eq!(display.breakdown[0].percent_text(), "20.00%");
        assert_eq!(display.breakdown[2].fraction, 0.1);
    }
}
