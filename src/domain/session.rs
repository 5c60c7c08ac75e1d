use serde::{Deserialize, Serialize};

use super::verdict::Verdict;

/// Running counters for one operator session.
///
/// `defect_count + normal_count == total_inspected` holds after every `record`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_inspected: u64,
    pub defect_count: u64,
    pub normal_count: u64,
}

impl SessionStats {
    pub fn record(&mut self, verdict: Verdict) {
        self.total_inspected += 1;
        match verdict {
            Verdict::Defect => self.defect_count += 1,
            Verdict::Normal => self.normal_count += 1,
        }
    }

    /// Defect percentage, `None` before the first inspection.
    pub fn defect_rate(&self) -> Option<f64> {
        if self.total_inspected == 0 {
            return None;
        }
        Some(self.defect_count as f64 / self.total_inspected as f64 * 100.0)
    }

    pub fn defect_rate_text(&self) -> String {
        match self.defect_rate() {
            Some(rate) => format!("{rate:.1}%"),
            None => "—".to_string(),
        }
    }
}
