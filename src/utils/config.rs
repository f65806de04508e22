use crate::error::{Result, RunnerError};
use crate::report::model::UploadModel;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the config file searched for
pub const CONFIG_FILE_NAME: &str = "lumi-acceptance.json";

/// How many parent directories are searched above the start directory
pub const MAX_PARENT_LEVELS: usize = 10;

fn default_environment() -> String {
    "production".to_string()
}

fn default_timeout() -> u64 {
    10_000
}

fn default_suites_dir() -> PathBuf {
    PathBuf::from("suites")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_true() -> bool {
    true
}

/// Runner configuration, read from `lumi-acceptance.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerConfig {
    pub organization: String,

    #[serde(rename = "baseURL", alias = "baseUrl")]
    pub base_url: String,

    pub digital_product: String,

    #[serde(default = "default_environment")]
    pub environment: String,

    /// Default timeout for actions (ms)
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Secret callers must present in live mode
    #[serde(default)]
    pub token: Option<String>,

    /// Suites of a full run, in order
    #[serde(default)]
    pub suites_list: Vec<String>,

    /// Directory with YAML suites, relative to the config file
    #[serde(default = "default_suites_dir")]
    pub suites_dir: PathBuf,

    /// Report API; local filesystem reports when absent
    #[serde(default)]
    pub report_api_url: Option<String>,

    #[serde(default)]
    pub report_api_key: Option<String>,

    /// Where local reports and baselines go, relative to the config file
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_true")]
    pub headless: bool,

    /// chromium, firefox or webkit
    #[serde(default)]
    pub browser: Option<String>,

    /// Directory the config file was loaded from
    #[serde(skip)]
    pub root: PathBuf,
}

/// Per-invocation replacement of selected config values
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigOverride {
    #[serde(default)]
    pub digital_product: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default, alias = "baseURL")]
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub suites_list: Option<Vec<String>>,
}

/// Look for the config file in `start` and up to [`MAX_PARENT_LEVELS`]
/// of its parents
pub fn find_config_file(start: &Path) -> Result<PathBuf> {
    start
        .ancestors()
        .take(MAX_PARENT_LEVELS + 1)
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| RunnerError::ConfigNotFound {
            searched_from: start.to_path_buf(),
        })
}

impl RunnerConfig {
    /// Discover and load the config, searching upwards from `start`
    pub fn discover(start: &Path) -> Result<Self> {
        let path = find_config_file(start)?;
        Self::load(&path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RunnerError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let root = path.parent().unwrap_or_else(|| Path::new("."));
        let config = Self::from_json(&content, root)?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse config JSON; relative paths resolve against `root`
    pub fn from_json(content: &str, root: &Path) -> Result<Self> {
        let mut config: RunnerConfig = serde_json::from_str(content)
            .map_err(|e| RunnerError::Config(format!("missing or corrupted config: {}", e)))?;
        config.root = root.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("organization", &self.organization),
            ("baseURL", &self.base_url),
            ("digitalProduct", &self.digital_product),
        ] {
            if value.trim().is_empty() {
                return Err(RunnerError::Config(format!("missing field in config: {}", field)));
            }
        }
        Ok(())
    }

    pub fn apply_override(&mut self, overrides: &ConfigOverride) {
        if let Some(v) = &overrides.digital_product {
            self.digital_product = v.clone();
        }
        if let Some(v) = &overrides.environment {
            self.environment = v.clone();
        }
        if let Some(v) = &overrides.base_url {
            self.base_url = v.clone();
        }
        if let Some(v) = overrides.timeout {
            self.timeout = v;
        }
        if let Some(v) = &overrides.suites_list {
            self.suites_list = v.clone();
        }
    }

    /// Report model for a run of `suites` against `report_id`
    pub fn upload_model(&self, report_id: Option<String>, suites: Vec<String>) -> UploadModel {
        UploadModel {
            organization: self.organization.clone(),
            base_url: self.base_url.clone(),
            digital_product: self.digital_product.clone(),
            environment: self.environment.clone(),
            report_id,
            next_suites: suites,
        }
    }

    pub fn suites_path(&self) -> PathBuf {
        self.root.join(&self.suites_dir)
    }

    pub fn output_path(&self) -> PathBuf {
        self.root.join(&self.output_dir)
    }

    /// Headless unless `LUMI_HEADLESS=false`
    pub fn headless(&self) -> bool {
        match std::env::var("LUMI_HEADLESS") {
            Ok(v) => !matches!(v.to_lowercase().as_str(), "false" | "0" | "no"),
            Err(_) => self.headless,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "organization": "acme",
        "baseURL": "https://shop.acme.test",
        "digitalProduct": "shop",
        "suitesList": ["login", "checkout"]
    }"#;

    #[test]
    fn test_defaults() {
        let config = RunnerConfig::from_json(MINIMAL, Path::new("/srv/tests")).unwrap();
        assert_eq!(config.timeout, 10_000);
        assert_eq!(config.environment, "production");
        assert_eq!(config.suites_path(), PathBuf::from("/srv/tests/suites"));
        assert_eq!(config.output_path(), PathBuf::from("/srv/tests/output"));
        assert!(config.token.is_none());
        assert!(config.report_api_url.is_none());
    }

    #[test]
    fn test_discovery_walks_up_parents() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), MINIMAL).unwrap();
        let nested = dir.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();

        let config = RunnerConfig::discover(&nested).unwrap();
        assert_eq!(config.organization, "acme");
        assert_eq!(config.root, dir.path());
    }

    #[test]
    fn test_discovery_gives_up_after_max_levels() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), MINIMAL).unwrap();
        let mut deep = dir.path().to_path_buf();
        for i in 0..=MAX_PARENT_LEVELS {
            deep.push(format!("d{}", i));
        }
        std::fs::create_dir_all(&deep).unwrap();

        let err = RunnerConfig::discover(&deep).unwrap_err();
        assert!(matches!(err, RunnerError::ConfigNotFound { .. }));
    }

    #[test]
    fn test_missing_required_field_is_config_failure() {
        let err = RunnerConfig::from_json(r#"{"organization": "acme", "baseURL": "x"}"#, Path::new("."))
            .unwrap_err();
        assert!(err.to_string().contains("digitalProduct"));

        let err = RunnerConfig::from_json(
            r#"{"organization": "", "baseURL": "x", "digitalProduct": "y"}"#,
            Path::new("."),
        )
        .unwrap_err();
        assert!(matches!(err, RunnerError::Config(_)));

        assert!(RunnerConfig::from_json("{ not json", Path::new(".")).is_err());
    }

    #[test]
    fn test_override_updates_config_and_model() {
        let mut config = RunnerConfig::from_json(MINIMAL, Path::new(".")).unwrap();
        let overrides: ConfigOverride = serde_json::from_str(
            r#"{"digitalProduct": "shop-eu", "baseUrl": "https://eu.acme.test", "timeout": 2000}"#,
        )
        .unwrap();
        config.apply_override(&overrides);

        assert_eq!(config.timeout, 2000);
        assert_eq!(config.suites_list, vec!["login", "checkout"]);
        let model = config.upload_model(None, config.suites_list.clone());
        assert_eq!(model.digital_product, "shop-eu");
        assert_eq!(model.base_url, "https://eu.acme.test");
        assert_eq!(model.environment, "production");
    }
}
