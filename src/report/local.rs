//! Filesystem-backed report collaborator.
//!
//! Layout under the output directory:
//! `<reportId>/report.json`, `<reportId>/junit.xml` and
//! `baselines/<key>.png`.

use super::junit;
use super::model::{ReportStatus, ScenarioUpload, UploadModel};
use super::service::ReportService;
use crate::driver::pixel_diff;
use crate::runner::visual::DiffResult;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Contents of `report.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalReport {
    pub report_id: String,
    pub model: UploadModel,
    pub created_at: String,
    #[serde(default)]
    pub scenarios: Vec<ScenarioUpload>,
    #[serde(default)]
    pub status: Option<ReportStatus>,
    #[serde(default)]
    pub finished_at: Option<String>,
}

pub struct LocalReportService {
    root: PathBuf,
    // Serializes read-modify-write cycles on report.json
    write_lock: Mutex<()>,
}

impl LocalReportService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn report_dir(&self, report_id: &str) -> PathBuf {
        self.root.join(report_id)
    }

    fn report_path(&self, report_id: &str) -> PathBuf {
        self.report_dir(report_id).join("report.json")
    }

    fn baseline_path(&self, key: &str) -> PathBuf {
        self.root
            .join("baselines")
            .join(format!("{}.png", baseline_file_stem(key)))
    }

    pub fn load(&self, report_id: &str) -> Result<LocalReport> {
        let path = self.report_path(report_id);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read report {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse report {}", path.display()))
    }

    fn save(&self, report: &LocalReport) -> Result<()> {
        let dir = self.report_dir(&report.report_id);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let json = serde_json::to_string_pretty(report)?;
        std::fs::write(self.report_path(&report.report_id), json)?;
        Ok(())
    }

    fn update<F>(&self, report_id: &str, change: F) -> Result<LocalReport>
    where
        F: FnOnce(&mut LocalReport),
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("report lock poisoned"))?;
        let mut report = self.load(report_id)?;
        change(&mut report);
        self.save(&report)?;
        Ok(report)
    }
}

/// Percent-escape everything outside `[A-Za-z0-9_-]` byte by byte, so
/// distinct keys never share a file
fn baseline_file_stem(key: &str) -> String {
    let mut stem = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            stem.push(byte as char);
        } else {
            stem.push_str(&format!("%{:02X}", byte));
        }
    }
    stem
}

fn store_baseline(path: &Path, screenshot: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, screenshot)
        .with_context(|| format!("Failed to store baseline {}", path.display()))
}

#[async_trait]
impl ReportService for LocalReportService {
    async fn create_empty_report(&self, model: &UploadModel) -> Result<String> {
        let report_id = uuid::Uuid::new_v4().to_string();
        let mut model = model.clone();
        model.report_id = Some(report_id.clone());
        let report = LocalReport {
            report_id: report_id.clone(),
            model,
            created_at: chrono::Local::now().to_rfc3339(),
            scenarios: Vec::new(),
            status: None,
            finished_at: None,
        };
        self.save(&report)?;
        log::info!(
            "Created local report {}",
            self.report_dir(&report_id).display()
        );
        Ok(report_id)
    }

    async fn compare_screenshots(&self, key: &str, screenshot: &[u8]) -> Result<DiffResult> {
        let path = self.baseline_path(key);
        if !path.exists() {
            store_baseline(&path, screenshot)?;
            log::info!("Stored new baseline for '{}' at {}", key, path.display());
            return Ok(DiffResult {
                key: key.to_string(),
                present_difference_percent: None,
            });
        }

        let baseline = std::fs::read(&path)
            .with_context(|| format!("Failed to read baseline {}", path.display()))?;
        let percent = pixel_diff::difference_percent(screenshot, &baseline)?;
        Ok(DiffResult {
            key: key.to_string(),
            present_difference_percent: Some(percent),
        })
    }

    async fn upload_scenario(&self, report_id: &str, upload: &ScenarioUpload) -> Result<()> {
        self.update(report_id, |report| report.scenarios.push(upload.clone()))?;
        Ok(())
    }

    async fn finish_report(&self, report_id: &str, status: ReportStatus) -> Result<()> {
        let finished_at = chrono::Local::now().to_rfc3339();
        // Earlier invocations of a resumed run count too
        let report = self.update(report_id, |report| {
            let earlier_failure = report
                .scenarios
                .iter()
                .any(|s| s.status == ReportStatus::Failed);
            report.status = Some(if earlier_failure {
                ReportStatus::Failed
            } else {
                status
            });
            report.finished_at = Some(finished_at.clone());
        })?;
        junit::write_report(
            report_id,
            &report.scenarios,
            &finished_at,
            &self.report_dir(report_id),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};

    fn model() -> UploadModel {
        UploadModel {
            organization: "acme".into(),
            base_url: "http://localhost:3000".into(),
            digital_product: "shop".into(),
            environment: "dev".into(),
            report_id: None,
            next_suites: vec![],
        }
    }

    fn png(color: [u8; 4]) -> Vec<u8> {
        let mut buf = std::io::Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba(color)))
            .write_to(&mut buf, image::ImageOutputFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[tokio::test]
    async fn test_report_lifecycle_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let service = LocalReportService::new(dir.path());

        let id = service.create_empty_report(&model()).await.unwrap();
        let upload = ScenarioUpload {
            suite: "login".into(),
            scenario: "valid user".into(),
            status: ReportStatus::Passed,
            duration_ms: 120,
            steps: vec![],
        };
        service.upload_scenario(&id, &upload).await.unwrap();
        service.finish_report(&id, ReportStatus::Passed).await.unwrap();

        let report = service.load(&id).unwrap();
        assert_eq!(report.model.report_id.as_deref(), Some(id.as_str()));
        assert_eq!(report.scenarios, vec![upload]);
        assert_eq!(report.status, Some(ReportStatus::Passed));
        assert!(service.report_dir(&id).join("junit.xml").exists());
    }

    #[tokio::test]
    async fn test_first_capture_becomes_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let service = LocalReportService::new(dir.path());
        let white = png([255, 255, 255, 255]);

        let first = service.compare_screenshots("home page", &white).await.unwrap();
        assert_eq!(first.present_difference_percent, None);

        let same = service.compare_screenshots("home page", &white).await.unwrap();
        assert_eq!(same.present_difference_percent, Some(0.0));

        let black = png([0, 0, 0, 255]);
        let changed = service.compare_screenshots("home page", &black).await.unwrap();
        assert_eq!(changed.present_difference_percent, Some(100.0));
    }

    #[test]
    fn test_baseline_keys_do_not_collide() {
        assert_eq!(baseline_file_stem("home page"), "home%20page");
        assert_eq!(baseline_file_stem("home_page"), "home_page");
        assert_eq!(baseline_file_stem("home/page"), "home%2Fpage");
        assert_eq!(baseline_file_stem("home%20page"), "home%2520page");
    }

    #[tokio::test]
    async fn test_similar_keys_keep_separate_baselines() {
        let dir = tempfile::tempdir().unwrap();
        let service = LocalReportService::new(dir.path());
        let white = png([255, 255, 255, 255]);
        let black = png([0, 0, 0, 255]);

        service.compare_screenshots("home page", &white).await.unwrap();
        let other = service.compare_screenshots("home_page", &black).await.unwrap();
        assert_eq!(other.present_difference_percent, None);
        let nested = service.compare_screenshots("home/page", &black).await.unwrap();
        assert_eq!(nested.present_difference_percent, None);

        let again = service.compare_screenshots("home page", &white).await.unwrap();
        assert_eq!(again.present_difference_percent, Some(0.0));
        assert_eq!(std::fs::read_dir(dir.path().join("baselines")).unwrap().count(), 3);
    }

    #[tokio::test]
    async fn test_failure_from_earlier_invocation_fails_report() {
        let dir = tempfile::tempdir().unwrap();
        let service = LocalReportService::new(dir.path());
        let id = service.create_empty_report(&model()).await.unwrap();
        let failed = ScenarioUpload {
            suite: "login".into(),
            scenario: "locked user".into(),
            status: ReportStatus::Failed,
            duration_ms: 80,
            steps: vec![],
        };
        service.upload_scenario(&id, &failed).await.unwrap();

        service.finish_report(&id, ReportStatus::Passed).await.unwrap();
        assert_eq!(service.load(&id).unwrap().status, Some(ReportStatus::Failed));
    }

    #[tokio::test]
    async fn test_upload_to_unknown_report_fails() {
        let dir = tempfile::tempdir().unwrap();
        let service = LocalReportService::new(dir.path());
        let upload = ScenarioUpload {
            suite: "s".into(),
            scenario: "c".into(),
            status: ReportStatus::Passed,
            duration_ms: 0,
            steps: vec![],
        };
        assert!(service.upload_scenario("missing", &upload).await.is_err());
    }
}
