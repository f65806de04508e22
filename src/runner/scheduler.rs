//! Resumable execution of a suite queue against one report.
//!
//! Suites run strictly in queue order and are the unit of resumption: the
//! queue in [`UploadModel::next_suites`] only shrinks after a suite has
//! finished. When the caller's time budget runs out with suites left, the
//! run is suspended and `(report_id, next_suites)` is handed back so a
//! later invocation can pick up exactly where this one stopped.

use super::context::ScenarioContext;
use super::events::{EventEmitter, RunEvent};
use super::state::{RunState, RunSummary, ScenarioResult, SuiteReport, SuiteResult};
use super::step_log::{Keyword, StepLog, StepRecord, StepStatus};
use super::suite::SuiteSource;
use super::visual::ScreenshotDiffEngine;
use crate::driver::traits::BrowserDriver;
use crate::error::ActionFailure;
use crate::report::model::{ReportStatus, ScenarioUpload, UploadModel};
use crate::report::service::ReportService;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// External signal that the invocation is close to its time limit.
/// Checked only between suites.
pub trait TimeBudget: Send + Sync {
    fn exhausted(&self) -> bool;
}

/// Never runs out
pub struct Unbounded;

impl TimeBudget for Unbounded {
    fn exhausted(&self) -> bool {
        false
    }
}

/// Runs out `reserve` before a wall-clock deadline
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Budget for an invocation with `remaining` time left, keeping
    /// `reserve` for uploading and answering the caller
    pub fn from_remaining(remaining: Duration, reserve: Duration) -> Self {
        Self {
            at: Instant::now() + remaining.saturating_sub(reserve),
        }
    }
}

impl TimeBudget for Deadline {
    fn exhausted(&self) -> bool {
        Instant::now() >= self.at
    }
}

/// Budget flipped by someone else, e.g. a shutdown handler
#[derive(Default)]
pub struct BudgetSignal {
    exhausted: AtomicBool,
}

impl BudgetSignal {
    pub fn exhaust(&self) {
        self.exhausted.store(true, Ordering::SeqCst);
    }
}

impl TimeBudget for BudgetSignal {
    fn exhausted(&self) -> bool {
        self.exhausted.load(Ordering::SeqCst)
    }
}

/// What one invocation did and where the next one should resume
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub report_id: String,
    /// Suites not started yet; empty once the run completed
    pub next_suites: Vec<String>,
    pub state: RunState,
    pub summary: RunSummary,
    pub suites: Vec<SuiteReport>,
    pub steps: Vec<StepRecord>,
}

impl RunOutcome {
    /// Failed when any scenario of this invocation failed, whether or not
    /// the failure left a FAILED step behind
    pub fn status(&self) -> ReportStatus {
        let failed = self.summary.failed > 0
            || self.suites.iter().any(|s| s.status == ReportStatus::Failed);
        if failed {
            ReportStatus::Failed
        } else {
            ReportStatus::Passed
        }
    }
}

/// Drains a suite queue one suite at a time
pub struct SuiteScheduler {
    suites: Arc<dyn SuiteSource>,
    reports: Arc<dyn ReportService>,
    driver: Arc<dyn BrowserDriver>,
    visual: ScreenshotDiffEngine,
    default_timeout_ms: u64,
    events: EventEmitter,
}

impl SuiteScheduler {
    pub fn new(
        suites: Arc<dyn SuiteSource>,
        reports: Arc<dyn ReportService>,
        driver: Arc<dyn BrowserDriver>,
        visual: ScreenshotDiffEngine,
        default_timeout_ms: u64,
    ) -> Self {
        Self {
            suites,
            reports,
            driver,
            visual,
            default_timeout_ms,
            events: EventEmitter::default(),
        }
    }

    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    /// Run the queued suites of `model` until the queue is empty or
    /// `budget` is exhausted. Creates the report first when `model` has no
    /// id yet.
    pub async fn run(&self, model: &mut UploadModel, budget: &dyn TimeBudget) -> Result<RunOutcome> {
        self.run_with_timeout(model, budget, self.default_timeout_ms)
            .await
    }

    /// Same as [`run`](Self::run) with a different default action timeout
    pub async fn run_with_timeout(
        &self,
        model: &mut UploadModel,
        budget: &dyn TimeBudget,
        default_timeout_ms: u64,
    ) -> Result<RunOutcome> {
        let started = Instant::now();

        let report_id = match &model.report_id {
            Some(id) => id.clone(),
            None => {
                let id = self
                    .reports
                    .create_empty_report(model)
                    .await
                    .context("Failed to create report")?;
                model.report_id = Some(id.clone());
                id
            }
        };
        log::info!(
            "Running {} suite(s) for report {}",
            model.next_suites.len(),
            report_id
        );
        self.events.emit(RunEvent::RunStarted {
            report_id: report_id.clone(),
            queued: model.next_suites.clone(),
        });

        let mut log = StepLog::new();
        let mut suites = Vec::new();
        let total = model.next_suites.len();
        let mut state = RunState::Idle;

        while let Some(name) = model.next_suite().map(str::to_string) {
            state = RunState::Running {
                index: suites.len(),
                total,
            };
            log::debug!("{:?}: suite '{}'", state, name);

            let result = self
                .run_suite(&name, &model.base_url, &report_id, default_timeout_ms, &mut log)
                .await;
            suites.push(result.to_report());
            model.complete_next_suite();

            if model.has_remaining() && budget.exhausted() {
                state = RunState::Suspended;
                break;
            }
        }
        if !matches!(state, RunState::Suspended) {
            state = RunState::Completed;
        }

        let summary = RunSummary::from_suites(&suites, started.elapsed().as_millis() as u64);
        let outcome = RunOutcome {
            report_id: report_id.clone(),
            next_suites: model.next_suites.clone(),
            state,
            summary: summary.clone(),
            suites,
            steps: log.into_records(),
        };

        match state {
            RunState::Suspended => {
                log::info!(
                    "Time budget exhausted; {} suite(s) left for report {}",
                    outcome.next_suites.len(),
                    report_id
                );
                self.events.emit(RunEvent::RunSuspended {
                    report_id,
                    next_suites: outcome.next_suites.clone(),
                    summary,
                });
            }
            _ => {
                self.reports
                    .finish_report(&report_id, outcome.status())
                    .await
                    .with_context(|| format!("Failed to finish report {}", report_id))?;
                self.events.emit(RunEvent::RunCompleted { report_id, summary });
            }
        }

        Ok(outcome)
    }

    async fn run_suite(
        &self,
        name: &str,
        base_url: &str,
        report_id: &str,
        default_timeout_ms: u64,
        log: &mut StepLog,
    ) -> SuiteResult {
        let mut result = SuiteResult::new(name);

        let suite = match self.suites.load(name) {
            Ok(suite) => suite,
            Err(e) => {
                log::error!("{}", e);
                self.events.emit(RunEvent::SuiteStarted {
                    suite: name.to_string(),
                    scenario_count: 0,
                });
                log.set_tag(name);
                let start = log.len();
                log.step(
                    Keyword::Given,
                    format!("I load the '{}' suite", name),
                    StepStatus::Failed,
                );
                let steps = log.records_since(start).to_vec();
                log.clear_tag();
                self.emit_steps(&steps);
                self.upload(report_id, name, "load", ReportStatus::Failed, 0, steps)
                    .await;
                result.add(ScenarioResult {
                    name: "load".to_string(),
                    status: ReportStatus::Failed,
                    duration_ms: 0,
                    error: Some(e.to_string()),
                });
                result.finish();
                self.emit_suite_finished(&result);
                return result;
            }
        };

        self.events.emit(RunEvent::SuiteStarted {
            suite: suite.name.clone(),
            scenario_count: suite.scenarios.len(),
        });
        let timeout = suite.default_timeout_ms.unwrap_or(default_timeout_ms);

        for scenario in &suite.scenarios {
            log.set_tag(format!("{} > {}", suite.name, scenario.name()));
            self.events.emit(RunEvent::ScenarioStarted {
                suite: suite.name.clone(),
                scenario: scenario.name().to_string(),
            });
            let start = log.len();
            let started = Instant::now();

            let outcome = {
                let mut ctx = ScenarioContext::new(
                    self.driver.as_ref(),
                    &mut *log,
                    &self.visual,
                    base_url,
                    timeout,
                );
                scenario.run(&mut ctx).await
            };

            let error = match outcome {
                Ok(()) => None,
                Err(e) => match e.downcast_ref::<ActionFailure>() {
                    // Already logged by the action
                    Some(failure) => Some(failure.message.clone()),
                    None => {
                        log::error!("Scenario '{}' failed: {:#}", scenario.name(), e);
                        let message = e.to_string();
                        log.step(Keyword::Then, message.clone(), StepStatus::Failed);
                        Some(message)
                    }
                },
            };

            let duration_ms = started.elapsed().as_millis() as u64;
            let steps = log.records_since(start).to_vec();
            let status = if error.is_some() {
                ReportStatus::Failed
            } else {
                ReportStatus::from_steps(&steps)
            };
            self.emit_steps(&steps);
            self.upload(report_id, &suite.name, scenario.name(), status, duration_ms, steps)
                .await;

            self.events.emit(RunEvent::ScenarioFinished {
                suite: suite.name.clone(),
                scenario: scenario.name().to_string(),
                status,
                duration_ms,
            });
            result.add(ScenarioResult {
                name: scenario.name().to_string(),
                status,
                duration_ms,
                error,
            });
        }

        log.clear_tag();
        result.finish();
        self.emit_suite_finished(&result);
        result
    }

    /// Upload failures are logged; the steps stay in the outcome
    async fn upload(
        &self,
        report_id: &str,
        suite: &str,
        scenario: &str,
        status: ReportStatus,
        duration_ms: u64,
        steps: Vec<StepRecord>,
    ) {
        let upload = ScenarioUpload {
            suite: suite.to_string(),
            scenario: scenario.to_string(),
            status,
            duration_ms,
            steps,
        };
        if let Err(e) = self.reports.upload_scenario(report_id, &upload).await {
            log::error!(
                "Failed to upload scenario '{} > {}': {:#}",
                suite,
                scenario,
                e
            );
        }
    }

    fn emit_steps(&self, steps: &[StepRecord]) {
        for step in steps {
            self.events.emit(RunEvent::Step {
                message: step.message.clone(),
                status: step.status,
            });
        }
    }

    fn emit_suite_finished(&self, result: &SuiteResult) {
        self.events.emit(RunEvent::SuiteFinished {
            suite: result.name.clone(),
            status: result.status(),
            duration_ms: result.duration_ms.unwrap_or(0),
        });
    }
}
