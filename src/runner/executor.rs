//! Executes declarative YAML steps through the scenario context.

use crate::parser::types::{ScenarioDef, StepCommand};
use crate::runner::actions::WaitOptions;
use crate::runner::context::ScenarioContext;
use crate::runner::step_log::Keyword;
use crate::runner::suite::Scenario;
use crate::runner::visual::DEFAULT_THRESHOLD;
use anyhow::{Context, Result};
use async_trait::async_trait;

/// Scenario backed by parsed YAML steps
pub struct DeclaredScenario {
    def: ScenarioDef,
}

impl DeclaredScenario {
    pub fn new(def: ScenarioDef) -> Self {
        Self { def }
    }

    pub fn steps(&self) -> &[StepCommand] {
        &self.def.steps
    }
}

#[async_trait]
impl Scenario for DeclaredScenario {
    fn name(&self) -> &str {
        &self.def.name
    }

    async fn run(&self, ctx: &mut ScenarioContext<'_>) -> Result<()> {
        for (index, step) in self.def.steps.iter().enumerate() {
            log::debug!("[{}] step {} {}", self.def.name, index + 1, step.display_name());
            execute_step(ctx, step).await?;
        }
        Ok(())
    }
}

/// Run one step. Reportable actions have already logged their FAILED step
/// when this returns their `ActionFailure`.
pub async fn execute_step(ctx: &mut ScenarioContext<'_>, step: &StepCommand) -> Result<()> {
    match step {
        StepCommand::Goto(url) => {
            let url = ctx.resolve_url(&ctx.substitute_vars(url));
            ctx.actions().goto(&url).await?;
        }
        StepCommand::Click(selector) => {
            let selector = ctx.substitute_vars(selector);
            ctx.actions().click(&selector).await?;
        }
        StepCommand::ClickByText(p) => {
            let text = ctx.substitute_vars(&p.text);
            ctx.actions().click_by_text(&p.tag, &text).await?;
        }
        StepCommand::Type(p) => {
            let value = ctx.substitute_vars(&p.value);
            ctx.actions().type_text(&p.selector, &value).await?;
        }
        StepCommand::WaitForSelector(p) => {
            let options = WaitOptions {
                timeout_ms: p.timeout_ms,
                log_message: p.log_message,
            };
            ctx.actions()
                .wait_for_selector(&p.selector, p.state, options)
                .await?;
        }
        StepCommand::WaitForText(p) => {
            let text = ctx.substitute_vars(&p.text);
            let options = WaitOptions {
                timeout_ms: p.timeout_ms,
                log_message: p.log_message,
            };
            ctx.actions()
                .wait_for_selector_with_text(&p.tag, &text, options)
                .await?;
        }
        StepCommand::WaitForNetworkIdle(timeout_ms) => {
            let options = WaitOptions {
                timeout_ms: *timeout_ms,
                ..WaitOptions::default()
            };
            ctx.actions().wait_for_network_idle(options).await?;
        }
        StepCommand::UrlContains(fragment) => {
            let fragment = ctx.substitute_vars(fragment);
            ctx.actions().url_contains(&fragment).await?;
        }
        StepCommand::GetText(p) => {
            let text = ctx.actions().get_text(&p.selector).await?;
            if let Some(name) = &p.save_as {
                ctx.vars.insert(name.clone(), text);
            }
        }
        StepCommand::ScreenshotCompare(p) => {
            // A differing screenshot fails the scenario but does not stop it
            ctx.screenshot_compare(&p.key, p.threshold.unwrap_or(DEFAULT_THRESHOLD))
                .await;
        }
        StepCommand::Pause(ms) => ctx.actions().pause(*ms).await,
        StepCommand::Emulate(profile) => {
            ctx.actions()
                .emulate_profile(*profile)
                .await
                .with_context(|| format!("I emulate the '{}' device", profile))?;
        }
        StepCommand::ForceState(p) => {
            ctx.actions()
                .force_state(&p.selector, p.state)
                .await
                .with_context(|| format!("I force {:?} on the '{}'", p.state, p.selector))?;
        }
        StepCommand::PressKey(key) => {
            ctx.actions()
                .press_key(key)
                .await
                .with_context(|| format!("I press the '{}' key", key))?;
        }
        StepCommand::RestartBrowser => {
            ctx.actions()
                .restart_browser()
                .await
                .context("I restart the browser")?;
        }
        StepCommand::Log(p) => {
            let message = ctx.substitute_vars(&p.message);
            ctx.actions().log(Keyword::And, message, p.status);
        }
        StepCommand::Suggest(name) => {
            let name = ctx.substitute_vars(name);
            ctx.actions().suggest(name);
        }
        StepCommand::PageLoadBudget(p) => {
            ctx.check_page_load(&p.url, p.max_ms).await?;
        }
        StepCommand::SetVar(p) => ctx.set_var(&p.name, &p.value),
    }
    Ok(())
}
