use crate::runner::step_log::{StepRecord, StepStatus};
use serde::{Deserialize, Serialize};

/// Identity of a report plus the suites still to run against it.
///
/// `report_id` stays `None` until the first invocation creates the report.
/// `next_suites` is the resumption checkpoint and only changes between
/// suites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadModel {
    pub organization: String,
    pub base_url: String,
    pub digital_product: String,
    pub environment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_id: Option<String>,
    #[serde(default)]
    pub next_suites: Vec<String>,
}

impl UploadModel {
    /// Suite at the head of the queue
    pub fn next_suite(&self) -> Option<&str> {
        self.next_suites.first().map(String::as_str)
    }

    /// Drop the head of the queue once that suite has finished
    pub fn complete_next_suite(&mut self) -> Option<String> {
        if self.next_suites.is_empty() {
            None
        } else {
            Some(self.next_suites.remove(0))
        }
    }

    pub fn has_remaining(&self) -> bool {
        !self.next_suites.is_empty()
    }
}

/// Terminal status of a report or scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    Passed,
    Failed,
}

impl ReportStatus {
    /// FAILED as soon as any record failed
    pub fn from_steps(steps: &[StepRecord]) -> Self {
        if steps.iter().any(|s| s.status == StepStatus::Failed) {
            ReportStatus::Failed
        } else {
            ReportStatus::Passed
        }
    }
}

/// Steps of one finished scenario, sent to the report collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioUpload {
    pub suite: String,
    pub scenario: String,
    pub status: ReportStatus,
    pub duration_ms: u64,
    pub steps: Vec<StepRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::step_log::{Keyword, StepLog};

    #[test]
    fn test_upload_model_wire_names() {
        let model = UploadModel {
            organization: "acme".into(),
            base_url: "https://acme.test".into(),
            digital_product: "shop".into(),
            environment: "staging".into(),
            report_id: None,
            next_suites: vec!["login".into()],
        };
        let json = serde_json::to_value(&model).unwrap();
        assert_eq!(json["digitalProduct"], "shop");
        assert_eq!(json["nextSuites"][0], "login");
        assert!(json.get("reportId").is_none());
    }

    #[test]
    fn test_status_from_steps_ignores_soft_records() {
        let mut log = StepLog::new();
        log.step(Keyword::Given, "I go to the '/' page", StepStatus::Passed);
        log.add_suggestion("Add alt text");
        log.add_performance_fail("Home took 4200ms", None);
        assert_eq!(ReportStatus::from_steps(log.records()), ReportStatus::Passed);

        log.step(Keyword::Then, "I click on the '#buy'", StepStatus::Failed);
        assert_eq!(ReportStatus::from_steps(log.records()), ReportStatus::Failed);
    }
}
