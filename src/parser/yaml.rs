use super::types::{
    ClickByTextParams, ForceStateInput, ForceStateParams, GetTextParams, LogParams,
    PageLoadBudgetParams, ScenarioDef, ScreenshotCompareParams, SetVarParams, StepCommand,
    SuiteFile, TypeParams, WaitForSelectorInput, WaitForSelectorParams, WaitForTextParams,
};
use crate::driver::devices::DeviceProfile;
use crate::runner::step_log::StepStatus;
use anyhow::{Context, Result};
use serde_yaml::Value;
use std::path::Path;

/// Parse a YAML suite file. The file stem names the suite unless the file
/// has a `name` field.
pub fn parse_suite_file(path: &Path) -> Result<SuiteFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    let fallback = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    parse_suite_content(&content, &fallback)
}

/// Parse YAML content into a suite
pub fn parse_suite_content(content: &str, fallback_name: &str) -> Result<SuiteFile> {
    let value: Value = serde_yaml::from_str(content).context("Failed to parse YAML content")?;
    let map = value
        .as_mapping()
        .ok_or_else(|| anyhow::anyhow!("Suite must be a mapping with a 'scenarios' list"))?;

    let name = map
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or(fallback_name)
        .to_string();

    let tags = match map.get("tags") {
        Some(val) => serde_yaml::from_value(val.clone()).context("'tags' must be a list")?,
        None => Vec::new(),
    };

    let default_timeout_ms = map
        .get("timeout")
        .or_else(|| map.get("defaultTimeoutMs"))
        .and_then(Value::as_u64);

    let scenarios = match map.get("scenarios") {
        Some(Value::Sequence(seq)) => seq
            .iter()
            .enumerate()
            .map(|(i, item)| parse_scenario(item).with_context(|| format!("scenario #{}", i + 1)))
            .collect::<Result<Vec<_>>>()?,
        Some(_) => anyhow::bail!("'scenarios' must be a list"),
        None => anyhow::bail!("Suite '{}' has no 'scenarios'", name),
    };

    Ok(SuiteFile {
        name,
        tags,
        default_timeout_ms,
        scenarios,
    })
}

fn parse_scenario(value: &Value) -> Result<ScenarioDef> {
    let map = value
        .as_mapping()
        .ok_or_else(|| anyhow::anyhow!("Scenario must be a mapping"))?;
    let name = map
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("Scenario is missing 'name'"))?
        .to_string();

    let steps = match map.get("steps") {
        Some(Value::Sequence(seq)) => seq
            .iter()
            .enumerate()
            .map(|(i, item)| {
                parse_step_value(item)
                    .with_context(|| format!("step #{} of scenario '{}'", i + 1, name))
            })
            .collect::<Result<Vec<_>>>()?,
        Some(Value::Null) | None => Vec::new(),
        Some(_) => anyhow::bail!("'steps' of scenario '{}' must be a list", name),
    };

    Ok(ScenarioDef { name, steps })
}

/// Parse one step: a bare word (`- restartBrowser`) or a single-key
/// mapping (`- click: "#submit"`).
pub fn parse_step_value(value: &Value) -> Result<StepCommand> {
    match value {
        Value::String(s) => parse_simple_step(s)?
            .ok_or_else(|| anyhow::anyhow!("Step '{}' requires parameters", s)),
        Value::Mapping(map) => {
            let mut entries = map.iter();
            let (key, params) = match (entries.next(), entries.next()) {
                (Some(entry), None) => entry,
                _ => anyhow::bail!("Invalid step format: expected single key mapping"),
            };
            let name = key
                .as_str()
                .ok_or_else(|| anyhow::anyhow!("Step name must be a string"))?;

            if params.is_null() {
                if let Some(step) = parse_simple_step(name)? {
                    return Ok(step);
                }
            }
            parse_step_with_params(name, params)
        }
        _ => anyhow::bail!("Invalid step format: {:?}", value),
    }
}

/// Steps that can be written without parameters
fn parse_simple_step(name: &str) -> Result<Option<StepCommand>> {
    let step = match name {
        "waitForNetworkIdle" => StepCommand::WaitForNetworkIdle(None),
        "pause" => StepCommand::Pause(None),
        "restartBrowser" => StepCommand::RestartBrowser,
        known if is_known_step(known) => return Ok(None),
        other => anyhow::bail!("Unknown step: {}", other),
    };
    Ok(Some(step))
}

fn is_known_step(name: &str) -> bool {
    matches!(
        name,
        "goto"
            | "click"
            | "clickByText"
            | "type"
            | "waitForSelector"
            | "waitForText"
            | "waitForNetworkIdle"
            | "urlContains"
            | "getText"
            | "screenshotCompare"
            | "pause"
            | "emulate"
            | "forceState"
            | "pressKey"
            | "restartBrowser"
            | "log"
            | "suggest"
            | "pageLoadBudget"
            | "setVar"
    )
}

fn string_param(name: &str, params: &Value) -> Result<String> {
    match params {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => anyhow::bail!("'{}' expects a string", name),
    }
}

fn typed_param<T: serde::de::DeserializeOwned>(name: &str, params: &Value) -> Result<T> {
    serde_yaml::from_value(params.clone())
        .with_context(|| format!("Invalid parameters for '{}'", name))
}

fn parse_step_with_params(name: &str, params: &Value) -> Result<StepCommand> {
    let step = match name {
        "goto" => StepCommand::Goto(string_param(name, params)?),
        "click" => StepCommand::Click(string_param(name, params)?),
        "clickByText" => StepCommand::ClickByText(typed_param::<ClickByTextParams>(name, params)?),
        "type" => StepCommand::Type(typed_param::<TypeParams>(name, params)?),
        "waitForSelector" => {
            let input = if params.is_string() {
                WaitForSelectorInput {
                    selector: string_param(name, params)?,
                    state: None,
                    timeout_ms: None,
                    log_message: true,
                }
            } else {
                typed_param::<WaitForSelectorInput>(name, params)?
            };
            let state = match input.state {
                Some(s) => s.parse()?,
                None => Default::default(),
            };
            StepCommand::WaitForSelector(WaitForSelectorParams {
                selector: input.selector,
                state,
                timeout_ms: input.timeout_ms,
                log_message: input.log_message,
            })
        }
        "waitForText" => {
            if params.is_string() {
                StepCommand::WaitForText(WaitForTextParams {
                    text: string_param(name, params)?,
                    tag: "*".to_string(),
                    timeout_ms: None,
                    log_message: true,
                })
            } else {
                StepCommand::WaitForText(typed_param(name, params)?)
            }
        }
        "waitForNetworkIdle" => StepCommand::WaitForNetworkIdle(params.as_u64().or_else(|| {
            params
                .get("timeoutMs")
                .or_else(|| params.get("timeout"))
                .and_then(Value::as_u64)
        })),
        "urlContains" => StepCommand::UrlContains(string_param(name, params)?),
        "getText" => {
            if params.is_string() {
                StepCommand::GetText(GetTextParams {
                    selector: string_param(name, params)?,
                    save_as: None,
                })
            } else {
                StepCommand::GetText(typed_param(name, params)?)
            }
        }
        "screenshotCompare" => {
            if params.is_string() {
                StepCommand::ScreenshotCompare(ScreenshotCompareParams {
                    key: string_param(name, params)?,
                    threshold: None,
                })
            } else {
                StepCommand::ScreenshotCompare(typed_param(name, params)?)
            }
        }
        "pause" => StepCommand::Pause(Some(
            params
                .as_u64()
                .ok_or_else(|| anyhow::anyhow!("'pause' expects milliseconds"))?,
        )),
        "emulate" => {
            let device: DeviceProfile = string_param(name, params)?.parse()?;
            StepCommand::Emulate(device)
        }
        "forceState" => {
            let input: ForceStateInput = typed_param(name, params)?;
            StepCommand::ForceState(ForceStateParams {
                selector: input.selector,
                state: input.state.parse()?,
            })
        }
        "pressKey" => StepCommand::PressKey(string_param(name, params)?),
        "log" => {
            if params.is_string() {
                StepCommand::Log(LogParams {
                    message: string_param(name, params)?,
                    status: StepStatus::Passed,
                })
            } else {
                StepCommand::Log(typed_param(name, params)?)
            }
        }
        "suggest" => StepCommand::Suggest(string_param(name, params)?),
        "pageLoadBudget" => {
            StepCommand::PageLoadBudget(typed_param::<PageLoadBudgetParams>(name, params)?)
        }
        "setVar" => StepCommand::SetVar(typed_param::<SetVarParams>(name, params)?),
        other => anyhow::bail!("Unknown step: {}", other),
    };
    Ok(step)
}
