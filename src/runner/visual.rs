//! Visual-regression decisions.

use crate::report::service::ReportService;
use crate::runner::step_log::{Keyword, StepLog, StepRecord, StepStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Difference above which a screenshot fails, in percent
pub const DEFAULT_THRESHOLD: f64 = 0.1;

/// Where the run executes, read from the `ENVIRONMENT` variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionEnvironment {
    /// Developer machine: rendering is not authoritative
    Local,
    /// External-facing deployment: invocations are token-gated
    Live,
    #[default]
    Remote,
}

impl ExecutionEnvironment {
    pub fn from_env() -> Self {
        std::env::var("ENVIRONMENT")
            .map(|v| Self::from_name(&v))
            .unwrap_or_default()
    }

    pub fn from_name(name: &str) -> Self {
        match name.trim().to_uppercase().as_str() {
            "LOCAL" => ExecutionEnvironment::Local,
            "LIVE" => ExecutionEnvironment::Live,
            _ => ExecutionEnvironment::Remote,
        }
    }

    pub fn requires_token(&self) -> bool {
        matches!(self, ExecutionEnvironment::Live)
    }

    pub fn compares_screenshots(&self) -> bool {
        !matches!(self, ExecutionEnvironment::Local)
    }
}

/// Outcome of one baseline comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffResult {
    pub key: String,
    /// `None` when there was no baseline or nothing could be computed
    #[serde(default)]
    pub present_difference_percent: Option<f64>,
}

/// Decides pass/fail for screenshots against stored baselines
#[derive(Clone)]
pub struct ScreenshotDiffEngine {
    environment: ExecutionEnvironment,
    reports: Arc<dyn ReportService>,
}

impl ScreenshotDiffEngine {
    pub fn new(environment: ExecutionEnvironment, reports: Arc<dyn ReportService>) -> Self {
        Self {
            environment,
            reports,
        }
    }

    pub fn environment(&self) -> ExecutionEnvironment {
        self.environment
    }

    /// Compare `screenshot` with the baseline stored under `key` and log
    /// the verdict. The screenshot and key are attached either way.
    pub async fn compare(
        &self,
        log: &mut StepLog,
        key: &str,
        screenshot: Vec<u8>,
        threshold: f64,
    ) -> StepRecord {
        let matches_message = format!("The '{}' screenshot matches the baseline", key);

        if !self.environment.compares_screenshots() {
            log::debug!("Skipping comparison of '{}' in local environment", key);
            return self.record(log, matches_message, StepStatus::Passed, screenshot, key);
        }

        let percent = match self.reports.compare_screenshots(key, &screenshot).await {
            Ok(result) => result.present_difference_percent,
            Err(e) => {
                log::warn!("Comparison of '{}' could not be computed: {:#}", key, e);
                None
            }
        };

        match percent {
            Some(pct) if pct > threshold => {
                let message = format!(
                    "The '{}' screenshot differs from the baseline by {}%",
                    key, pct
                );
                self.record(log, message, StepStatus::Failed, screenshot, key)
            }
            Some(_) => self.record(log, matches_message, StepStatus::Passed, screenshot, key),
            None => {
                log::info!("No baseline difference for '{}', treating as match", key);
                self.record(log, matches_message, StepStatus::Passed, screenshot, key)
            }
        }
    }

    fn record(
        &self,
        log: &mut StepLog,
        message: String,
        status: StepStatus,
        screenshot: Vec<u8>,
        key: &str,
    ) -> StepRecord {
        log.push(
            Keyword::Then,
            message,
            status,
            Some(screenshot),
            Some(key.to_string()),
        )
        .clone()
    }
}
