//! Scripted doubles for the browser and report collaborators.

use crate::driver::devices::DeviceProfile;
use crate::driver::traits::{BrowserDriver, ElementState, PseudoState};
use crate::report::model::{ReportStatus, ScenarioUpload, UploadModel};
use crate::report::service::ReportService;
use crate::runner::visual::DiffResult;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// In-memory page: selectors that are present, their text, and the URL.
#[derive(Default)]
pub struct FakeDriver {
    pub present: Mutex<HashSet<String>>,
    pub texts: Mutex<HashMap<String, String>>,
    pub url: Mutex<String>,
    pub network_idle: Mutex<bool>,
    /// Delay before the network reports idle
    pub load_delay_ms: Mutex<u64>,
    /// Selectors whose click hangs forever
    pub hanging: Mutex<HashSet<String>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        let driver = Self::default();
        *driver.network_idle.lock().unwrap() = true;
        driver
    }

    pub fn with_element(self, selector: &str, text: &str) -> Self {
        self.present.lock().unwrap().insert(selector.to_string());
        self.texts
            .lock()
            .unwrap()
            .insert(selector.to_string(), text.to_string());
        self
    }

    pub fn with_url(self, url: &str) -> Self {
        *self.url.lock().unwrap() = url.to_string();
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn call(&self, entry: String) {
        self.calls.lock().unwrap().push(entry);
    }

    fn is_present(&self, selector: &str) -> bool {
        self.present.lock().unwrap().contains(selector)
    }
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    fn name(&self) -> &str {
        "fake"
    }

    async fn goto(&self, url: &str) -> Result<()> {
        self.call(format!("goto {}", url));
        if url.contains("unreachable") {
            anyhow::bail!("net::ERR_NAME_NOT_RESOLVED");
        }
        *self.url.lock().unwrap() = url.to_string();
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.url.lock().unwrap().clone())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        state: ElementState,
        _timeout_ms: u64,
    ) -> Result<bool> {
        let present = self.is_present(selector);
        Ok(match state {
            ElementState::Visible => present,
            ElementState::Hidden => !present,
        })
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        Ok(usize::from(self.is_present(selector)))
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.call(format!("click {}", selector));
        if self.hanging.lock().unwrap().contains(selector) {
            std::future::pending::<()>().await;
        }
        if !self.is_present(selector) {
            anyhow::bail!("No element for {}", selector);
        }
        Ok(())
    }

    async fn type_text(&self, selector: &str, value: &str) -> Result<()> {
        self.call(format!("type {} {}", selector, value));
        if !self.is_present(selector) {
            anyhow::bail!("No element for {}", selector);
        }
        Ok(())
    }

    async fn text_content(&self, selector: &str) -> Result<Option<String>> {
        Ok(self.texts.lock().unwrap().get(selector).cloned())
    }

    async fn wait_for_network_idle(&self, timeout_ms: u64) -> Result<()> {
        let delay = *self.load_delay_ms.lock().unwrap();
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }
        if *self.network_idle.lock().unwrap() {
            Ok(())
        } else {
            anyhow::bail!("Network did not become idle within {}ms", timeout_ms)
        }
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.call("screenshot".to_string());
        Ok(b"fake-png".to_vec())
    }

    async fn emulate(&self, profile: DeviceProfile) -> Result<()> {
        self.call(format!("emulate {}", profile));
        Ok(())
    }

    async fn force_state(&self, selector: &str, state: PseudoState) -> Result<()> {
        self.call(format!("force {} {:?}", selector, state));
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        self.call(format!("press {}", key));
        Ok(())
    }

    async fn input_value(&self, selector: &str) -> Result<String> {
        Ok(self
            .texts
            .lock()
            .unwrap()
            .get(selector)
            .cloned()
            .unwrap_or_default())
    }

    async fn restart(&self) -> Result<()> {
        self.call("restart".to_string());
        Ok(())
    }
}

/// Report collaborator that remembers everything it was sent.
#[derive(Default)]
pub struct MemoryReports {
    pub created: Mutex<Vec<String>>,
    pub uploads: Mutex<Vec<(String, ScenarioUpload)>>,
    pub finished: Mutex<Vec<(String, ReportStatus)>>,
    /// key -> difference percent; missing key means no baseline
    pub diffs: Mutex<HashMap<String, f64>>,
    pub compare_calls: Mutex<Vec<String>>,
}

impl MemoryReports {
    pub fn with_diff(self, key: &str, percent: f64) -> Self {
        self.diffs.lock().unwrap().insert(key.to_string(), percent);
        self
    }

    pub fn uploaded_scenarios(&self) -> Vec<String> {
        self.uploads
            .lock()
            .unwrap()
            .iter()
            .map(|(_, u)| format!("{}/{}", u.suite, u.scenario))
            .collect()
    }
}

#[async_trait]
impl ReportService for MemoryReports {
    async fn create_empty_report(&self, _model: &UploadModel) -> Result<String> {
        let mut created = self.created.lock().unwrap();
        let id = format!("report-{}", created.len() + 1);
        created.push(id.clone());
        Ok(id)
    }

    async fn compare_screenshots(&self, key: &str, _screenshot: &[u8]) -> Result<DiffResult> {
        self.compare_calls.lock().unwrap().push(key.to_string());
        if key == "broken" {
            anyhow::bail!("comparison service unavailable");
        }
        Ok(DiffResult {
            key: key.to_string(),
            present_difference_percent: self.diffs.lock().unwrap().get(key).copied(),
        })
    }

    async fn upload_scenario(&self, report_id: &str, upload: &ScenarioUpload) -> Result<()> {
        self.uploads
            .lock()
            .unwrap()
            .push((report_id.to_string(), upload.clone()));
        Ok(())
    }

    async fn finish_report(&self, report_id: &str, status: ReportStatus) -> Result<()> {
        self.finished
            .lock()
            .unwrap()
            .push((report_id.to_string(), status));
        Ok(())
    }
}
