//! Browser actions that report themselves as steps.
//!
//! Every reportable action builds its narrative message first, runs the
//! primitive under a timeout, and then logs exactly one PASSED or FAILED
//! step. On failure the returned [`ActionFailure`] carries the same text as
//! the FAILED step.

use crate::driver::devices::DeviceProfile;
use crate::driver::traits::{BrowserDriver, ElementState, PseudoState};
use crate::error::ActionFailure;
use crate::runner::step_log::{Keyword, StepLog, StepStatus};
use anyhow::Result;
use std::future::Future;
use std::time::Duration;

/// Per-call options for wait-style actions
#[derive(Debug, Clone, Copy)]
pub struct WaitOptions {
    /// Overrides the executor's default timeout
    pub timeout_ms: Option<u64>,
    /// When false, no step is logged; failures are still returned
    pub log_message: bool,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: None,
            log_message: true,
        }
    }
}

impl WaitOptions {
    pub fn timeout(ms: u64) -> Self {
        Self {
            timeout_ms: Some(ms),
            ..Self::default()
        }
    }

    pub fn silent() -> Self {
        Self {
            log_message: false,
            ..Self::default()
        }
    }
}

/// Build an XPath expression equal to `text`, whatever quotes it contains.
///
/// XPath 1.0 string literals cannot escape quotes, so every `'` closes the
/// current literal and is emitted as a separate `"'"` argument of `concat`.
pub fn xpath_text_literal(text: &str) -> String {
    let segments = text.replace('\'', "', \"'\", '");
    format!("concat('{}', '')", segments)
}

/// XPath selector for `tag` elements whose string value equals `text`
pub fn text_match_selector(tag: &str, text: &str) -> String {
    format!("xpath=//{}[. = {}]", tag, xpath_text_literal(text))
}

fn format_seconds(ms: u64) -> String {
    if ms % 1000 == 0 {
        format!("{}s", ms / 1000)
    } else {
        format!("{}s", ms as f64 / 1000.0)
    }
}

/// Wraps browser primitives and records them in the step log
pub struct ActionExecutor<'a> {
    driver: &'a dyn BrowserDriver,
    log: &'a mut StepLog,
    default_timeout_ms: u64,
}

impl<'a> ActionExecutor<'a> {
    pub fn new(driver: &'a dyn BrowserDriver, log: &'a mut StepLog, default_timeout_ms: u64) -> Self {
        Self {
            driver,
            log,
            default_timeout_ms,
        }
    }

    pub fn default_timeout_ms(&self) -> u64 {
        self.default_timeout_ms
    }

    /// Run `fut` for at most `timeout_ms`; expiry counts as failure
    async fn bounded<T, F>(timeout_ms: u64, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(Duration::from_millis(timeout_ms), fut).await {
            Ok(result) => result,
            Err(_) => anyhow::bail!("timed out after {}ms", timeout_ms),
        }
    }

    /// Log the terminal step for an action and convert failures
    fn conclude<T>(
        &mut self,
        keyword: Keyword,
        message: String,
        outcome: Result<T>,
        log_message: bool,
    ) -> std::result::Result<T, ActionFailure> {
        match outcome {
            Ok(value) => {
                if log_message {
                    self.log.step(keyword, message, StepStatus::Passed);
                }
                Ok(value)
            }
            Err(cause) => {
                log::debug!("{} failed: {:#}", message, cause);
                if log_message {
                    self.log.step(keyword, message.clone(), StepStatus::Failed);
                }
                Err(ActionFailure::new(message))
            }
        }
    }

    /// Same as `conclude`, with the timeout appended to the failure text
    fn conclude_wait<T>(
        &mut self,
        keyword: Keyword,
        message: String,
        timeout_ms: u64,
        outcome: Result<T>,
        log_message: bool,
    ) -> std::result::Result<T, ActionFailure> {
        let message = match outcome {
            Ok(_) => message,
            Err(_) => format!("{} (waited {})", message, format_seconds(timeout_ms)),
        };
        self.conclude(keyword, message, outcome, log_message)
    }

    pub async fn goto(&mut self, url: &str) -> std::result::Result<(), ActionFailure> {
        let message = format!("I go to the '{}' page", url);
        let driver = self.driver;
        let outcome = Self::bounded(self.default_timeout_ms, driver.goto(url)).await;
        self.conclude(Keyword::Given, message, outcome, true)
    }

    pub async fn click(&mut self, selector: &str) -> std::result::Result<(), ActionFailure> {
        let message = format!("I click on the '{}'", selector);
        let driver = self.driver;
        let timeout = self.default_timeout_ms;
        let outcome = Self::bounded(timeout, async {
            if !driver
                .wait_for_selector(selector, ElementState::Visible, timeout)
                .await?
            {
                anyhow::bail!("'{}' never became visible", selector);
            }
            driver.click(selector).await
        })
        .await;
        self.conclude(Keyword::Then, message, outcome, true)
    }

    /// Click the first `tag` element whose text equals `text`
    pub async fn click_by_text(
        &mut self,
        tag: &str,
        text: &str,
    ) -> std::result::Result<(), ActionFailure> {
        let message = format!("I click on the '{}' '{}'", text, tag);
        let driver = self.driver;
        let timeout = self.default_timeout_ms;
        let target = text_match_selector(tag, text);
        let outcome = Self::bounded(timeout, async {
            if !driver
                .wait_for_selector(tag, ElementState::Visible, timeout)
                .await?
            {
                anyhow::bail!("no '{}' element appeared", tag);
            }
            if driver.count(&target).await? == 0 {
                anyhow::bail!("no '{}' element with the expected text", tag);
            }
            driver.click(&target).await
        })
        .await;
        self.conclude(Keyword::Then, message, outcome, true)
    }

    /// Type `value` into the field matched by `selector`
    pub async fn type_text(
        &mut self,
        selector: &str,
        value: &str,
    ) -> std::result::Result<(), ActionFailure> {
        let message = format!("I type '{}' into the '{}' field", value, selector);
        let driver = self.driver;
        let timeout = self.default_timeout_ms;
        let outcome = Self::bounded(timeout, async {
            if !driver
                .wait_for_selector(selector, ElementState::Visible, timeout)
                .await?
            {
                anyhow::bail!("'{}' never became visible", selector);
            }
            driver.type_text(selector, value).await
        })
        .await;
        self.conclude(Keyword::Then, message, outcome, true)
    }

    pub async fn wait_for_selector(
        &mut self,
        selector: &str,
        state: ElementState,
        options: WaitOptions,
    ) -> std::result::Result<(), ActionFailure> {
        let message = format!(
            "I check for the '{}' element to be {}",
            selector,
            state.as_str()
        );
        let driver = self.driver;
        let timeout = options.timeout_ms.unwrap_or(self.default_timeout_ms);
        let outcome = Self::bounded(timeout, async {
            if driver.wait_for_selector(selector, state, timeout).await? {
                Ok(())
            } else {
                anyhow::bail!("'{}' did not become {}", selector, state.as_str())
            }
        })
        .await;
        self.conclude_wait(Keyword::And, message, timeout, outcome, options.log_message)
    }

    /// Wait for a `tag` element whose text equals `text`
    pub async fn wait_for_selector_with_text(
        &mut self,
        tag: &str,
        text: &str,
        options: WaitOptions,
    ) -> std::result::Result<bool, ActionFailure> {
        let message = format!("I check for '{}' on the current page", text);
        let driver = self.driver;
        let timeout = options.timeout_ms.unwrap_or(self.default_timeout_ms);
        let target = text_match_selector(tag, text);
        let outcome = Self::bounded(timeout, async {
            if !driver
                .wait_for_selector(tag, ElementState::Visible, timeout)
                .await?
            {
                anyhow::bail!("no '{}' element appeared", tag);
            }
            if !driver
                .wait_for_selector(&target, ElementState::Visible, timeout)
                .await?
                || driver.count(&target).await? == 0
            {
                anyhow::bail!("no '{}' element with the expected text", tag);
            }
            Ok(true)
        })
        .await;
        self.conclude_wait(Keyword::And, message, timeout, outcome, options.log_message)
    }

    pub async fn wait_for_network_idle(
        &mut self,
        options: WaitOptions,
    ) -> std::result::Result<(), ActionFailure> {
        let message = "I wait for the page to load".to_string();
        let driver = self.driver;
        let timeout = options.timeout_ms.unwrap_or(self.default_timeout_ms);
        let outcome = Self::bounded(timeout, driver.wait_for_network_idle(timeout)).await;
        self.conclude_wait(Keyword::Then, message, timeout, outcome, options.log_message)
    }

    /// Check that the current URL contains `fragment`
    pub async fn url_contains(&mut self, fragment: &str) -> std::result::Result<(), ActionFailure> {
        let message = format!("I am on the {} page", fragment);
        let driver = self.driver;
        let outcome = Self::bounded(self.default_timeout_ms, async {
            let url = driver.current_url().await?;
            if url.contains(fragment) {
                Ok(())
            } else {
                anyhow::bail!("current URL is {}", url)
            }
        })
        .await;
        self.conclude(Keyword::And, message, outcome, true)
    }

    /// Text content of the element matched by `selector`
    pub async fn get_text(&mut self, selector: &str) -> std::result::Result<String, ActionFailure> {
        let message = format!("I read the text of the '{}'", selector);
        let driver = self.driver;
        let timeout = self.default_timeout_ms;
        let outcome = Self::bounded(timeout, async {
            if !driver
                .wait_for_selector(selector, ElementState::Visible, timeout)
                .await?
            {
                anyhow::bail!("'{}' never became visible", selector);
            }
            driver
                .text_content(selector)
                .await?
                .ok_or_else(|| anyhow::anyhow!("'{}' matched nothing", selector))
        })
        .await;
        self.conclude(Keyword::And, message, outcome, true)
    }

    /// Sleep without logging; defaults to the executor timeout
    pub async fn pause(&self, ms: Option<u64>) {
        tokio::time::sleep(Duration::from_millis(ms.unwrap_or(self.default_timeout_ms))).await;
    }

    /// Append a free-form step
    pub fn log(&mut self, keyword: Keyword, message: impl Into<String>, status: StepStatus) {
        self.log.step(keyword, message, status);
    }

    pub fn suggest(&mut self, name: impl Into<String>) {
        self.log.add_suggestion(name);
    }

    // Side-channel operations: not part of the narrative, never logged.

    /// Emulate a device from the supported profile table
    pub async fn emulate(&self, device: &str) -> Result<()> {
        let profile: DeviceProfile = device.parse()?;
        self.emulate_profile(profile).await
    }

    pub async fn emulate_profile(&self, profile: DeviceProfile) -> Result<()> {
        self.driver.emulate(profile).await
    }

    pub async fn force_state(&self, selector: &str, state: PseudoState) -> Result<()> {
        self.driver.force_state(selector, state).await
    }

    pub async fn press_key(&self, key: &str) -> Result<()> {
        self.driver.press_key(key).await
    }

    pub async fn input_value(&self, selector: &str) -> Result<String> {
        self.driver.input_value(selector).await
    }

    pub async fn restart_browser(&self) -> Result<()> {
        self.driver.restart().await
    }
}
