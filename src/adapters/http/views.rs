use base64::{prelude::BASE64_STANDARD, Engine};
use minijinja::Environment;
use serde::Serialize;

use super::multipart::{CAMERA_FIELD, UPLOAD_FIELD};
use crate::application::sessions::Flash;
use crate::domain::{
    errors::InspectError,
    input::{InspectionImage, UPLOAD_EXTENSIONS},
    session::SessionStats,
    verdict::{Verdict, VerdictDisplay},
};

const DASHBOARD: &str = "dashboard.html";

/// What happened on the last submission, below the input controls.
pub enum Outcome<'a> {
    Idle,
    Verdict { display: &'a VerdictDisplay, image: &'a InspectionImage },
    Failed(&'a InspectError),
}

impl<'a> From<Option<&'a Flash>> for Outcome<'a> {
    fn from(flash: Option<&'a Flash>) -> Self {
        match flash {
            None => Outcome::Idle,
            Some(Flash::Verdict { display, image }) => Outcome::Verdict { display, image },
            Some(Flash::Failed(err)) => Outcome::Failed(err),
        }
    }
}

#[derive(Serialize)]
struct StatusCard {
    label: &'static str,
    value: String,
    tone: &'static str,
}

#[derive(Serialize)]
struct BreakdownRow<'a> {
    label: &'a str,
    fraction: f64,
    percent: String,
}

#[derive(Serialize)]
struct VerdictPanel<'a> {
    class: &'static str,
    icon: &'static str,
    is_defect: bool,
    headline: &'a str,
    label: &'a str,
    score: String,
    call_to_action: &'a str,
    breakdown: Vec<BreakdownRow<'a>>,
}

impl<'a> VerdictPanel<'a> {
    fn new(display: &'a VerdictDisplay) -> Self {
        let (class, icon) = match display.verdict {
            Verdict::Defect => ("result-defect", "🚨"),
            Verdict::Normal => ("result-normal", "✅"),
        };
        Self {
            class,
            icon,
            is_defect: display.verdict == Verdict::Defect,
            headline: &display.headline,
            label: &display.label,
            score: display.score_text(),
            call_to_action: &display.call_to_action,
            breakdown: display
                .breakdown
                .iter()
                .map(|entry| BreakdownRow {
                    label: &entry.label,
                    fraction: entry.fraction.clamp(0.0, 1.0),
                    percent: entry.percent_text(),
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct Page<'a> {
    cards: [StatusCard; 4],
    camera_field: &'static str,
    upload_field: &'static str,
    upload_list: String,
    upload_accept: String,
    /// `data:` URI built from a fixed MIME type and base64, never from request text.
    preview: Option<String>,
    verdict: Option<VerdictPanel<'a>>,
    error: Option<String>,
}

impl<'a> Page<'a> {
    fn new(stats: &SessionStats, outcome: &Outcome<'a>) -> Self {
        let (preview, verdict, error) = match *outcome {
            Outcome::Idle => (None, None, None),
            Outcome::Verdict { display, image } => (
                Some(format!("data:{};base64,{}", image.mime_type(), BASE64_STANDARD.encode(&image.bytes))),
                Some(VerdictPanel::new(display)),
                None,
            ),
            Outcome::Failed(err) => (None, None, Some(err.to_string())),
        };
        Self {
            cards: [
                StatusCard { label: "Total Inspected", value: stats.total_inspected.to_string(), tone: "blue" },
                StatusCard { label: "Defects", value: stats.defect_count.to_string(), tone: "" },
                StatusCard { label: "Normal", value: stats.normal_count.to_string(), tone: "green" },
                StatusCard { label: "Defect Rate", value: stats.defect_rate_text(), tone: "" },
            ],
            camera_field: CAMERA_FIELD,
            upload_field: UPLOAD_FIELD,
            upload_list: UPLOAD_EXTENSIONS.join(", "),
            upload_accept: UPLOAD_EXTENSIONS.iter().map(|e| format!(".{e}")).collect::<Vec<_>>().join(","),
            preview,
            verdict,
            error,
        }
    }
}

/// Dashboard template, compiled once at startup. `.html` templates auto-escape.
pub struct Views {
    env: Environment<'static>,
}

impl Views {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.add_template(DASHBOARD, include_str!("../../../templates/dashboard.html"))?;
        Ok(Self { env })
    }

    /// Whole dashboard page, sections in fixed order.
    pub fn render_page(&self, stats: &SessionStats, outcome: &Outcome<'_>) -> Result<String, minijinja::Error> {
        self.env.get_template(DASHBOARD)?.render(Page::new(stats, outcome))
    }
}
