use crate::report::model::ReportStatus;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Scheduler state over one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    /// Executing suite `index` (0-based) of `total` known at start
    Running { index: usize, total: usize },
    /// Budget exhausted with suites remaining
    Suspended,
    /// Queue drained
    Completed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Suspended | RunState::Completed)
    }
}

/// Result of one scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioResult {
    pub name: String,
    pub status: ReportStatus,
    pub duration_ms: u64,
    /// Message of the failure that aborted the scenario, if any
    pub error: Option<String>,
}

/// Result of one suite, built up while its scenarios run
#[derive(Debug, Clone)]
pub struct SuiteResult {
    pub name: String,
    pub scenarios: Vec<ScenarioResult>,
    pub started_at: Instant,
    pub duration_ms: Option<u64>,
}

impl SuiteResult {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            scenarios: Vec::new(),
            started_at: Instant::now(),
            duration_ms: None,
        }
    }

    pub fn add(&mut self, scenario: ScenarioResult) {
        self.scenarios.push(scenario);
    }

    pub fn finish(&mut self) {
        self.duration_ms = Some(self.started_at.elapsed().as_millis() as u64);
    }

    pub fn status(&self) -> ReportStatus {
        if self
            .scenarios
            .iter()
            .any(|s| s.status == ReportStatus::Failed)
        {
            ReportStatus::Failed
        } else {
            ReportStatus::Passed
        }
    }

    pub fn to_report(&self) -> SuiteReport {
        SuiteReport {
            name: self.name.clone(),
            status: self.status(),
            scenarios: self.scenarios.clone(),
            duration_ms: self.duration_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteReport {
    pub name: String,
    pub status: ReportStatus,
    pub scenarios: Vec<ScenarioResult>,
    pub duration_ms: Option<u64>,
}

/// Totals for one invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub suites: u32,
    pub scenarios: u32,
    pub passed: u32,
    pub failed: u32,
    pub total_duration_ms: u64,
}

impl RunSummary {
    pub fn from_suites(suites: &[SuiteReport], total_duration_ms: u64) -> Self {
        let mut summary = RunSummary {
            suites: suites.len() as u32,
            total_duration_ms,
            ..Default::default()
        };
        for scenario in suites.iter().flat_map(|s| &s.scenarios) {
            summary.scenarios += 1;
            match scenario.status {
                ReportStatus::Passed => summary.passed += 1,
                ReportStatus::Failed => summary.failed += 1,
            }
        }
        summary
    }
}
