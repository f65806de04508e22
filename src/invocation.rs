//! One invocation of the runner: authorization, checkpoint in, checkpoint out.

use crate::runner::scheduler::{RunOutcome, SuiteScheduler, TimeBudget};
use crate::runner::visual::ExecutionEnvironment;
use crate::utils::config::{ConfigOverride, RunnerConfig};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Caller-supplied parameters of an invocation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationRequest {
    /// Absent to start a new report
    #[serde(default)]
    pub report_id: Option<String>,
    /// Required in live mode
    #[serde(default)]
    pub token: Option<String>,
    /// Remaining suites of an interrupted run; the configured list otherwise
    #[serde(default)]
    pub next_suites: Option<Vec<String>>,
}

/// 204 when the run was accepted, 401 when the token was rejected
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResponse {
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<RunOutcome>,
}

impl InvocationResponse {
    pub fn accepted(outcome: RunOutcome) -> Self {
        Self {
            status_code: 204,
            message: None,
            outcome: Some(outcome),
        }
    }

    pub fn unauthorized() -> Self {
        Self {
            status_code: 401,
            message: Some("Unauthorized".to_string()),
            outcome: None,
        }
    }

    pub fn is_authorized(&self) -> bool {
        self.status_code != 401
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut v: u8 = 0;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes().iter()) {
        v |= x ^ y;
    }
    v == 0
}

/// Token gate, only enforced in live mode
pub fn authorize(
    environment: ExecutionEnvironment,
    config: &RunnerConfig,
    token: Option<&str>,
) -> bool {
    if !environment.requires_token() {
        return true;
    }
    match (config.token.as_deref(), token) {
        (Some(expected), Some(given)) => constant_time_eq(expected, given),
        (None, _) => {
            log::warn!("Live mode without a configured token; rejecting invocation");
            false
        }
        _ => false,
    }
}

/// Entry point shared by the CLI and the HTTP endpoint
pub struct Invoker {
    config: RunnerConfig,
    environment: ExecutionEnvironment,
    scheduler: SuiteScheduler,
}

impl Invoker {
    pub fn new(
        config: RunnerConfig,
        environment: ExecutionEnvironment,
        scheduler: SuiteScheduler,
    ) -> Self {
        Self {
            config,
            environment,
            scheduler,
        }
    }

    /// Check `token` first and only then let `build` wire the scheduler.
    /// `None` when the token was rejected; `build` has not run then.
    pub async fn build_authorized<F, Fut>(
        config: RunnerConfig,
        environment: ExecutionEnvironment,
        token: Option<&str>,
        build: F,
    ) -> Result<Option<Self>>
    where
        F: FnOnce(RunnerConfig) -> Fut,
        Fut: Future<Output = Result<SuiteScheduler>>,
    {
        if !authorize(environment, &config, token) {
            log::warn!("Rejected invocation before starting the browser");
            return Ok(None);
        }
        let scheduler = build(config.clone()).await?;
        Ok(Some(Self::new(config, environment, scheduler)))
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &SuiteScheduler {
        &self.scheduler
    }

    pub fn authorize(&self, token: Option<&str>) -> bool {
        authorize(self.environment, &self.config, token)
    }

    fn effective_config(&self, overrides: Option<&ConfigOverride>) -> RunnerConfig {
        let mut config = self.config.clone();
        if let Some(o) = overrides {
            config.apply_override(o);
        }
        config
    }

    /// Start or resume a run
    pub async fn handle(
        &self,
        request: InvocationRequest,
        overrides: Option<&ConfigOverride>,
        budget: &dyn TimeBudget,
    ) -> Result<InvocationResponse> {
        if !self.authorize(request.token.as_deref()) {
            log::warn!("Rejected invocation for report {:?}", request.report_id);
            return Ok(InvocationResponse::unauthorized());
        }

        let config = self.effective_config(overrides);
        let suites = request
            .next_suites
            .unwrap_or_else(|| config.suites_list.clone());
        let mut model = config.upload_model(request.report_id, suites);

        let outcome = self
            .scheduler
            .run_with_timeout(&mut model, budget, config.timeout)
            .await?;
        Ok(InvocationResponse::accepted(outcome))
    }

    /// Run exactly one suite against a fresh report
    pub async fn handle_single(
        &self,
        suite: &str,
        token: Option<&str>,
        overrides: Option<&ConfigOverride>,
        budget: &dyn TimeBudget,
    ) -> Result<InvocationResponse> {
        if !self.authorize(token) {
            log::warn!("Rejected single-suite invocation for '{}'", suite);
            return Ok(InvocationResponse::unauthorized());
        }

        let config = self.effective_config(overrides);
        let mut model = config.upload_model(None, vec![suite.to_string()]);
        let outcome = self
            .scheduler
            .run_with_timeout(&mut model, budget, config.timeout)
            .await?;
        Ok(InvocationResponse::accepted(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::context::ScenarioContext;
    use crate::runner::scheduler::Unbounded;
    use crate::runner::step_log::{Keyword, StepStatus};
    use crate::runner::suite::{Scenario, Suite, SuiteCatalog};
    use crate::runner::testing::{FakeDriver, MemoryReports};
    use crate::runner::visual::ScreenshotDiffEngine;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct Visit;

    #[async_trait]
    impl Scenario for Visit {
        fn name(&self) -> &str {
            "visit"
        }

        async fn run(&self, ctx: &mut ScenarioContext<'_>) -> anyhow::Result<()> {
            let url = ctx.resolve_url("/");
            ctx.actions().goto(&url).await?;
            ctx.log().step(Keyword::And, "I see the home page", StepStatus::Passed);
            Ok(())
        }
    }

    fn runner_config() -> RunnerConfig {
        RunnerConfig::from_json(
            r#"{
                "organization": "acme",
                "baseURL": "https://shop.acme.test",
                "digitalProduct": "shop",
                "token": "s3cret",
                "suitesList": ["home", "search"]
            }"#,
            Path::new("."),
        )
        .unwrap()
    }

    fn scheduler(
        env: ExecutionEnvironment,
        timeout: u64,
    ) -> (SuiteScheduler, Arc<MemoryReports>, Arc<FakeDriver>) {
        let mut catalog = SuiteCatalog::new();
        catalog.register(Suite::new("home").with_scenario(Visit));
        catalog.register(Suite::new("search").with_scenario(Visit));

        let reports = Arc::new(MemoryReports::default());
        let driver = Arc::new(FakeDriver::new());
        let scheduler = SuiteScheduler::new(
            Arc::new(catalog),
            reports.clone(),
            driver.clone(),
            ScreenshotDiffEngine::new(env, reports.clone()),
            timeout,
        );
        (scheduler, reports, driver)
    }

    fn invoker(env: ExecutionEnvironment) -> (Invoker, Arc<MemoryReports>, Arc<FakeDriver>) {
        let config = runner_config();
        let (scheduler, reports, driver) = scheduler(env, config.timeout);
        (Invoker::new(config, env, scheduler), reports, driver)
    }

    #[test]
    fn test_gate_needs_no_scheduler() {
        let config = runner_config();
        let live = ExecutionEnvironment::Live;
        assert!(authorize(live, &config, Some("s3cret")));
        assert!(!authorize(live, &config, Some("s3cre")));
        assert!(!authorize(live, &config, None));
        assert!(authorize(ExecutionEnvironment::Remote, &config, None));

        let mut open = runner_config();
        open.token = None;
        assert!(!authorize(live, &open, Some("anything")));
    }

    #[tokio::test]
    async fn test_rejected_token_never_builds_the_browser() {
        let built = AtomicBool::new(false);
        let invoker = Invoker::build_authorized(
            runner_config(),
            ExecutionEnvironment::Live,
            Some("guess"),
            |config| {
                built.store(true, Ordering::SeqCst);
                async move { Ok(scheduler(ExecutionEnvironment::Live, config.timeout).0) }
            },
        )
        .await
        .unwrap();
        assert!(invoker.is_none());
        assert!(!built.load(Ordering::SeqCst));

        let invoker = Invoker::build_authorized(
            runner_config(),
            ExecutionEnvironment::Live,
            Some("s3cret"),
            |config| {
                built.store(true, Ordering::SeqCst);
                async move { Ok(scheduler(ExecutionEnvironment::Live, config.timeout).0) }
            },
        )
        .await
        .unwrap();
        assert!(invoker.is_some());
        assert!(built.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_live_mode_rejects_wrong_token_before_any_work() {
        let (invoker, reports, driver) = invoker(ExecutionEnvironment::Live);
        let request = InvocationRequest {
            report_id: Some("r-1".into()),
            token: Some("guess".into()),
            next_suites: None,
        };

        let response = invoker.handle(request, None, &Unbounded).await.unwrap();
        assert_eq!(response.status_code, 401);
        assert_eq!(response.message.as_deref(), Some("Unauthorized"));
        assert!(response.outcome.is_none());
        assert!(reports.created.lock().unwrap().is_empty());
        assert!(reports.uploads.lock().unwrap().is_empty());
        assert!(driver.calls().is_empty());

        let single = invoker
            .handle_single("home", None, None, &Unbounded)
            .await
            .unwrap();
        assert_eq!(single.status_code, 401);
        assert!(driver.calls().is_empty());
    }

    #[tokio::test]
    async fn test_live_mode_with_matching_token_runs_configured_suites() {
        let (invoker, reports, _) = invoker(ExecutionEnvironment::Live);
        let request = InvocationRequest {
            token: Some("s3cret".into()),
            ..Default::default()
        };

        let response = invoker.handle(request, None, &Unbounded).await.unwrap();
        assert_eq!(response.status_code, 204);
        let outcome = response.outcome.unwrap();
        assert!(outcome.next_suites.is_empty());
        assert_eq!(reports.uploaded_scenarios(), vec!["home/visit", "search/visit"]);
    }

    #[tokio::test]
    async fn test_token_not_required_outside_live_mode() {
        let (invoker, _, _) = invoker(ExecutionEnvironment::Remote);
        let response = invoker
            .handle(InvocationRequest::default(), None, &Unbounded)
            .await
            .unwrap();
        assert!(response.is_authorized());
    }

    #[tokio::test]
    async fn test_resume_uses_request_queue() {
        let (invoker, reports, _) = invoker(ExecutionEnvironment::Remote);
        let request = InvocationRequest {
            report_id: Some("r-7".into()),
            token: None,
            next_suites: Some(vec!["search".into()]),
        };

        let outcome = invoker
            .handle(request, None, &Unbounded)
            .await
            .unwrap()
            .outcome
            .unwrap();
        assert_eq!(outcome.report_id, "r-7");
        assert_eq!(reports.uploaded_scenarios(), vec!["search/visit"]);
        assert!(reports.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_single_suite_gets_fresh_report_and_overrides() {
        let (invoker, reports, driver) = invoker(ExecutionEnvironment::Remote);
        let overrides = ConfigOverride {
            base_url: Some("https://eu.acme.test".into()),
            ..Default::default()
        };

        let outcome = invoker
            .handle_single("search", None, Some(&overrides), &Unbounded)
            .await
            .unwrap()
            .outcome
            .unwrap();
        assert_eq!(outcome.report_id, "report-1");
        assert!(outcome.next_suites.is_empty());
        assert_eq!(reports.uploaded_scenarios(), vec!["search/visit"]);
        assert_eq!(driver.calls(), vec!["goto https://eu.acme.test/"]);
        assert_eq!(invoker.config().base_url, "https://shop.acme.test");
    }
}
