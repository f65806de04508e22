//! Suites, scenarios and where they come from.

use crate::error::{Result, RunnerError};
use crate::parser::yaml::parse_suite_file;
use crate::runner::context::ScenarioContext;
use crate::runner::executor::DeclaredScenario;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One test case. Returning an error aborts only this scenario.
#[async_trait]
pub trait Scenario: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, ctx: &mut ScenarioContext<'_>) -> anyhow::Result<()>;
}

/// Ordered scenarios for one feature area; the unit of resumption
#[derive(Clone)]
pub struct Suite {
    pub name: String,
    pub tags: Vec<String>,
    /// Overrides the configured action timeout (ms)
    pub default_timeout_ms: Option<u64>,
    pub scenarios: Vec<Arc<dyn Scenario>>,
}

impl Suite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: Vec::new(),
            default_timeout_ms: None,
            scenarios: Vec::new(),
        }
    }

    pub fn with_scenario(mut self, scenario: impl Scenario + 'static) -> Self {
        self.scenarios.push(Arc::new(scenario));
        self
    }
}

impl std::fmt::Debug for Suite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Suite")
            .field("name", &self.name)
            .field("tags", &self.tags)
            .field(
                "scenarios",
                &self.scenarios.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Resolves suite names from the queue into runnable suites
pub trait SuiteSource: Send + Sync {
    fn load(&self, name: &str) -> Result<Suite>;

    /// Every suite name this source can load, sorted
    fn available(&self) -> Vec<String>;
}

/// Registered Rust suites plus YAML files from a suites directory.
/// Registered suites win over files with the same name.
#[derive(Default)]
pub struct SuiteCatalog {
    registered: BTreeMap<String, Suite>,
    suites_dir: Option<PathBuf>,
}

impl SuiteCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.suites_dir = Some(dir.into());
        self
    }

    pub fn register(&mut self, suite: Suite) {
        self.registered.insert(suite.name.clone(), suite);
    }

    fn suite_file(&self, name: &str) -> Option<PathBuf> {
        let dir = self.suites_dir.as_ref()?;
        ["yaml", "yml"]
            .iter()
            .map(|ext| dir.join(format!("{}.{}", name, ext)))
            .find(|p| p.is_file())
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .map_or(false, |ext| ext == "yaml" || ext == "yml")
}

impl SuiteSource for SuiteCatalog {
    fn load(&self, name: &str) -> Result<Suite> {
        if let Some(suite) = self.registered.get(name) {
            return Ok(suite.clone());
        }

        let path = self.suite_file(name).ok_or_else(|| RunnerError::Suite {
            name: name.to_string(),
            reason: "no registered suite or suite file with this name".to_string(),
        })?;

        let file = parse_suite_file(&path).map_err(|e| RunnerError::Suite {
            name: name.to_string(),
            reason: format!("{:#}", e),
        })?;
        log::debug!("Loaded suite '{}' from {}", name, path.display());

        Ok(Suite {
            name: name.to_string(),
            tags: file.tags,
            default_timeout_ms: file.default_timeout_ms,
            scenarios: file
                .scenarios
                .into_iter()
                .map(|def| Arc::new(DeclaredScenario::new(def)) as Arc<dyn Scenario>)
                .collect(),
        })
    }

    fn available(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registered.keys().cloned().collect();
        if let Some(dir) = &self.suites_dir {
            for entry in walkdir::WalkDir::new(dir)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && is_yaml(e.path()))
            {
                if let Some(stem) = entry.path().file_stem() {
                    names.push(stem.to_string_lossy().to_string());
                }
            }
        }
        names.sort();
        names.dedup();
        names
    }
}
