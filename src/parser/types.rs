use crate::driver::devices::DeviceProfile;
use crate::driver::traits::{ElementState, PseudoState};
use crate::runner::step_log::StepStatus;
use serde::{Deserialize, Serialize};

/// A suite parsed from a YAML file
#[derive(Debug, Clone)]
pub struct SuiteFile {
    pub name: String,
    pub tags: Vec<String>,
    /// Overrides the configured action timeout for this suite (ms)
    pub default_timeout_ms: Option<u64>,
    pub scenarios: Vec<ScenarioDef>,
}

/// A scenario: ordered steps, aborted at the first failure
#[derive(Debug, Clone)]
pub struct ScenarioDef {
    pub name: String,
    pub steps: Vec<StepCommand>,
}

/// One declarative step
#[derive(Debug, Clone, PartialEq)]
pub enum StepCommand {
    Goto(String),
    Click(String),
    ClickByText(ClickByTextParams),
    Type(TypeParams),
    WaitForSelector(WaitForSelectorParams),
    WaitForText(WaitForTextParams),
    WaitForNetworkIdle(Option<u64>),
    UrlContains(String),
    GetText(GetTextParams),
    ScreenshotCompare(ScreenshotCompareParams),
    Pause(Option<u64>),
    Emulate(DeviceProfile),
    ForceState(ForceStateParams),
    PressKey(String),
    RestartBrowser,
    Log(LogParams),
    Suggest(String),
    PageLoadBudget(PageLoadBudgetParams),
    SetVar(SetVarParams),
}

impl StepCommand {
    /// Short name used in diagnostics
    pub fn display_name(&self) -> &'static str {
        match self {
            StepCommand::Goto(_) => "goto",
            StepCommand::Click(_) => "click",
            StepCommand::ClickByText(_) => "clickByText",
            StepCommand::Type(_) => "type",
            StepCommand::WaitForSelector(_) => "waitForSelector",
            StepCommand::WaitForText(_) => "waitForText",
            StepCommand::WaitForNetworkIdle(_) => "waitForNetworkIdle",
            StepCommand::UrlContains(_) => "urlContains",
            StepCommand::GetText(_) => "getText",
            StepCommand::ScreenshotCompare(_) => "screenshotCompare",
            StepCommand::Pause(_) => "pause",
            StepCommand::Emulate(_) => "emulate",
            StepCommand::ForceState(_) => "forceState",
            StepCommand::PressKey(_) => "pressKey",
            StepCommand::RestartBrowser => "restartBrowser",
            StepCommand::Log(_) => "log",
            StepCommand::Suggest(_) => "suggest",
            StepCommand::PageLoadBudget(_) => "pageLoadBudget",
            StepCommand::SetVar(_) => "setVar",
        }
    }
}

fn default_tag() -> String {
    "*".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickByTextParams {
    /// Element name to search, `*` for any
    #[serde(default = "default_tag", alias = "selector")]
    pub tag: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeParams {
    pub selector: String,
    #[serde(alias = "text")]
    pub value: String,
}

/// Raw form; `state` is checked when the step is parsed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitForSelectorInput {
    pub selector: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default, alias = "timeout")]
    pub timeout_ms: Option<u64>,
    #[serde(default = "default_true")]
    pub log_message: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaitForSelectorParams {
    pub selector: String,
    pub state: ElementState,
    pub timeout_ms: Option<u64>,
    pub log_message: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitForTextParams {
    pub text: String,
    #[serde(default = "default_tag", alias = "selector")]
    pub tag: String,
    #[serde(default, alias = "timeout")]
    pub timeout_ms: Option<u64>,
    #[serde(default = "default_true")]
    pub log_message: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTextParams {
    pub selector: String,
    /// Store the text in this scenario variable
    #[serde(default)]
    pub save_as: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotCompareParams {
    pub key: String,
    #[serde(default)]
    pub threshold: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForceStateInput {
    pub selector: String,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForceStateParams {
    pub selector: String,
    pub state: PseudoState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogParams {
    pub message: String,
    #[serde(default = "default_log_status")]
    pub status: StepStatus,
}

fn default_log_status() -> StepStatus {
    StepStatus::Passed
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLoadBudgetParams {
    pub url: String,
    #[serde(alias = "max")]
    pub max_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetVarParams {
    pub name: String,
    pub value: String,
}
