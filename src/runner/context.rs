use crate::driver::traits::BrowserDriver;
use crate::error::ActionFailure;
use crate::runner::actions::{ActionExecutor, WaitOptions};
use crate::runner::step_log::{Keyword, StepLog, StepRecord, StepStatus};
use crate::runner::visual::ScreenshotDiffEngine;
use regex::Regex;
use std::collections::HashMap;
use std::time::Instant;

const VAR_PATTERN: &str = r"\$\{([a-zA-Z0-9_.]+)\}";

/// Execution context handed to a scenario.
///
/// Carries the active page, the step log, timeout defaults and scenario
/// variables for the duration of one suite.
pub struct ScenarioContext<'a> {
    driver: &'a dyn BrowserDriver,
    log: &'a mut StepLog,
    visual: &'a ScreenshotDiffEngine,
    /// Base URL relative navigation is joined to
    pub base_url: String,
    /// Default timeout for actions (ms)
    pub default_timeout_ms: u64,
    /// Variables set by scenarios (`setVar`, `getText` with `saveAs`)
    pub vars: HashMap<String, String>,
}

impl<'a> ScenarioContext<'a> {
    pub fn new(
        driver: &'a dyn BrowserDriver,
        log: &'a mut StepLog,
        visual: &'a ScreenshotDiffEngine,
        base_url: &str,
        default_timeout_ms: u64,
    ) -> Self {
        Self {
            driver,
            log,
            visual,
            base_url: base_url.to_string(),
            default_timeout_ms,
            vars: HashMap::new(),
        }
    }

    /// Step-logging wrapper around the active page
    pub fn actions(&mut self) -> ActionExecutor<'_> {
        ActionExecutor::new(self.driver, &mut *self.log, self.default_timeout_ms)
    }

    pub fn log(&mut self) -> &mut StepLog {
        self.log
    }

    pub fn driver(&self) -> &dyn BrowserDriver {
        self.driver
    }

    /// Join a relative URL to the base URL
    pub fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") || url.starts_with("about:") {
            url.to_string()
        } else {
            format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                url.trim_start_matches('/')
            )
        }
    }

    /// Capture the page and compare it with the baseline under `key`
    pub async fn screenshot_compare(&mut self, key: &str, threshold: f64) -> StepRecord {
        match self.driver.screenshot().await {
            Ok(png) => self.visual.compare(self.log, key, png, threshold).await,
            Err(e) => {
                log::warn!("Screenshot for '{}' failed: {:#}", key, e);
                self.log
                    .push(
                        Keyword::Then,
                        format!("I capture the '{}' screenshot", key),
                        StepStatus::Failed,
                        None,
                        Some(key.to_string()),
                    )
                    .clone()
            }
        }
    }

    /// Navigate to `url` and record a PERFORMANCE_FAIL when loading takes
    /// longer than `max_ms`. Returns the load time.
    pub async fn check_page_load(&mut self, url: &str, max_ms: u64) -> Result<u64, ActionFailure> {
        let target = self.resolve_url(url);
        let started = Instant::now();
        {
            let mut actions = self.actions();
            actions.goto(&target).await?;
            actions.wait_for_network_idle(WaitOptions::default()).await?;
        }
        let elapsed = started.elapsed().as_millis() as u64;

        if elapsed > max_ms {
            let evidence = match self.driver.screenshot().await {
                Ok(png) => Some(png),
                Err(e) => {
                    log::warn!("No screenshot for slow page {}: {:#}", target, e);
                    None
                }
            };
            self.log.add_performance_fail(
                format!(
                    "The '{}' page loaded in {}ms, over the {}ms budget",
                    url, elapsed, max_ms
                ),
                evidence,
            );
        }
        Ok(elapsed)
    }

    pub fn set_var(&mut self, name: &str, value: &str) {
        let substituted = self.substitute_vars(value);
        self.vars.insert(name.to_string(), substituted);
    }

    /// Substitute `${name}` patterns in a string.
    ///
    /// Lookup order is scenario vars, then the built-ins (`${otp}` yields
    /// the current one-time password, `${timestamp}` the Unix time and
    /// `${date}` today's date), then the process environment. Unknown names
    /// are kept verbatim.
    pub fn substitute_vars(&self, text: &str) -> String {
        let re = match Regex::new(VAR_PATTERN) {
            Ok(re) => re,
            Err(_) => return text.to_string(),
        };
        re.replace_all(text, |caps: &regex::Captures| {
            let key = &caps[1];
            if let Some(val) = self.vars.get(key) {
                return val.clone();
            }
            match key {
                "timestamp" => chrono::Utc::now().timestamp().to_string(),
                "date" => chrono::Local::now().format("%Y-%m-%d").to_string(),
                "otp" => match crate::utils::otp::generate_token() {
                    Ok(token) => token,
                    Err(e) => {
                        log::warn!("Cannot substitute ${{otp}}: {}", e);
                        caps[0].to_string()
                    }
                },
                _ => std::env::var(key).unwrap_or_else(|_| caps[0].to_string()),
            }
        })
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::testing::{FakeDriver, MemoryReports};
    use crate::runner::visual::ExecutionEnvironment;
    use std::sync::Arc;

    fn engine() -> ScreenshotDiffEngine {
        ScreenshotDiffEngine::new(
            ExecutionEnvironment::Remote,
            Arc::new(MemoryReports::default().with_diff("cart", 12.5)),
        )
    }

    #[test]
    fn test_resolve_url() {
        let driver = FakeDriver::new();
        let mut log = StepLog::new();
        let visual = engine();
        let ctx = ScenarioContext::new(&driver, &mut log, &visual, "https://shop.test/", 1000);

        assert_eq!(ctx.resolve_url("/cart"), "https://shop.test/cart");
        assert_eq!(ctx.resolve_url("cart"), "https://shop.test/cart");
        assert_eq!(ctx.resolve_url("https://other.test/x"), "https://other.test/x");
    }

    #[test]
    fn test_substitute_vars() {
        let driver = FakeDriver::new();
        let mut log = StepLog::new();
        let visual = engine();
        let mut ctx = ScenarioContext::new(&driver, &mut log, &visual, "https://shop.test", 1000);
        ctx.set_var("user", "qa");
        ctx.set_var("email", "${user}@example.com");

        assert_eq!(ctx.substitute_vars("hi ${email}"), "hi qa@example.com");
        assert_eq!(
            ctx.substitute_vars("${lumi_missing_variable}"),
            "${lumi_missing_variable}"
        );
    }

    #[test]
    fn test_builtins_win_over_environment() {
        std::env::set_var("timestamp", "from-env");
        std::env::set_var("LUMI_CONTEXT_TEST_HOST", "qa.shop.test");
        let driver = FakeDriver::new();
        let mut log = StepLog::new();
        let visual = engine();
        let mut ctx = ScenarioContext::new(&driver, &mut log, &visual, "https://shop.test", 1000);

        assert!(ctx.substitute_vars("${timestamp}").parse::<i64>().is_ok());
        assert_eq!(
            ctx.substitute_vars("${LUMI_CONTEXT_TEST_HOST}"),
            "qa.shop.test"
        );

        ctx.set_var("timestamp", "pinned");
        assert_eq!(ctx.substitute_vars("${timestamp}"), "pinned");
    }

    #[tokio::test]
    async fn test_screenshot_compare_goes_through_engine() {
        let driver = FakeDriver::new();
        let mut log = StepLog::new();
        let visual = engine();
        let mut ctx = ScenarioContext::new(&driver, &mut log, &visual, "https://shop.test", 1000);

        let record = ctx.screenshot_compare("cart", 0.1).await;
        assert_eq!(record.status, StepStatus::Failed);
        assert!(record.message.contains("12.5%"));
        assert_eq!(driver.calls(), vec!["screenshot"]);
    }

    #[tokio::test]
    async fn test_page_load_within_budget_logs_no_warning() {
        let driver = FakeDriver::new();
        let mut log = StepLog::new();
        let visual = engine();
        let mut ctx = ScenarioContext::new(&driver, &mut log, &visual, "https://shop.test", 1000);

        ctx.check_page_load("/", 60_000).await.unwrap();
        let statuses: Vec<_> = log.records().iter().map(|r| r.status).collect();
        assert_eq!(statuses, vec![StepStatus::Passed, StepStatus::Passed]);
    }

    #[tokio::test]
    async fn test_slow_page_load_records_performance_fail() {
        let driver = FakeDriver::new();
        *driver.load_delay_ms.lock().unwrap() = 30;
        let mut log = StepLog::new();
        let visual = engine();
        let mut ctx = ScenarioContext::new(&driver, &mut log, &visual, "https://shop.test", 1000);

        ctx.check_page_load("/slow", 5).await.unwrap();
        let last = log.records().last().unwrap();
        assert_eq!(last.status, StepStatus::PerformanceFail);
        assert!(last.message.contains("'/slow'"));
        assert!(last.screenshot.is_some());
    }
}
