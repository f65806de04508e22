//! Report collaborator contract and its HTTP implementation.

use super::model::{ReportStatus, ScenarioUpload, UploadModel};
use crate::runner::visual::DiffResult;
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where reports, scenario steps and screenshot baselines live
#[async_trait]
pub trait ReportService: Send + Sync {
    /// Create a fresh report for `model` and return its id
    async fn create_empty_report(&self, model: &UploadModel) -> Result<String>;

    /// Difference between `screenshot` and the baseline stored under `key`
    async fn compare_screenshots(&self, key: &str, screenshot: &[u8]) -> Result<DiffResult>;

    async fn upload_scenario(&self, report_id: &str, upload: &ScenarioUpload) -> Result<()>;

    async fn finish_report(&self, report_id: &str, status: ReportStatus) -> Result<()>;
}

/// Organization, product and environment a service instance reports for
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportScope {
    pub organization: String,
    pub digital_product: String,
    pub environment: String,
}

impl From<&UploadModel> for ReportScope {
    fn from(model: &UploadModel) -> Self {
        Self {
            organization: model.organization.clone(),
            digital_product: model.digital_product.clone(),
            environment: model.environment.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedReport {
    report_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompareRequest<'a> {
    #[serde(flatten)]
    scope: &'a ReportScope,
    key: &'a str,
    screenshot: String,
}

#[derive(Debug, Serialize)]
struct StatusUpdate {
    status: ReportStatus,
}

/// JSON-over-HTTP report API client
pub struct HttpReportService {
    base_url: String,
    api_key: Option<String>,
    scope: ReportScope,
    client: reqwest::Client,
}

impl HttpReportService {
    pub fn new(base_url: &str, api_key: Option<String>, scope: ReportScope) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            scope,
            client,
        })
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("x-api-key", key),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder, what: &str) -> Result<reqwest::Response> {
        let response = self
            .authorize(builder)
            .send()
            .await
            .with_context(|| format!("Failed to {}", what))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Failed to {}: HTTP {} {}", what, status, body);
        }
        Ok(response)
    }
}

#[async_trait]
impl ReportService for HttpReportService {
    async fn create_empty_report(&self, model: &UploadModel) -> Result<String> {
        let url = format!("{}/reports", self.base_url);
        let response = self
            .send(self.client.post(&url).json(model), "create report")
            .await?;
        let created: CreatedReport = response
            .json()
            .await
            .context("Invalid create report response")?;
        log::info!("Created report {}", created.report_id);
        Ok(created.report_id)
    }

    async fn compare_screenshots(&self, key: &str, screenshot: &[u8]) -> Result<DiffResult> {
        let url = format!("{}/screenshots/compare", self.base_url);
        let body = CompareRequest {
            scope: &self.scope,
            key,
            screenshot: base64::engine::general_purpose::STANDARD.encode(screenshot),
        };
        let response = self
            .send(self.client.post(&url).json(&body), "compare screenshots")
            .await?;
        response
            .json::<DiffResult>()
            .await
            .context("Invalid screenshot comparison response")
    }

    async fn upload_scenario(&self, report_id: &str, upload: &ScenarioUpload) -> Result<()> {
        let url = format!("{}/reports/{}/scenarios", self.base_url, report_id);
        self.send(self.client.post(&url).json(upload), "upload scenario")
            .await?;
        Ok(())
    }

    async fn finish_report(&self, report_id: &str, status: ReportStatus) -> Result<()> {
        let url = format!("{}/reports/{}/status", self.base_url, report_id);
        self.send(
            self.client.put(&url).json(&StatusUpdate { status }),
            "finish report",
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn model() -> UploadModel {
        UploadModel {
            organization: "acme".into(),
            base_url: "https://shop.acme.test".into(),
            digital_product: "shop".into(),
            environment: "staging".into(),
            report_id: None,
            next_suites: vec!["login".into(), "checkout".into()],
        }
    }

    fn service(server: &MockServer) -> HttpReportService {
        HttpReportService::new(
            &server.base_url(),
            Some("secret-key".into()),
            ReportScope::from(&model()),
        )
        .expect("client")
    }

    #[tokio::test]
    async fn test_create_empty_report_posts_model() {
        let server = MockServer::start();
        let create = server.mock(|when, then| {
            when.method(POST)
                .path("/reports")
                .header("x-api-key", "secret-key")
                .json_body(json!({
                    "organization": "acme",
                    "baseUrl": "https://shop.acme.test",
                    "digitalProduct": "shop",
                    "environment": "staging",
                    "nextSuites": ["login", "checkout"]
                }));
            then.status(201).json_body(json!({ "reportId": "r-42" }));
        });

        let id = service(&server).create_empty_report(&model()).await.unwrap();
        assert_eq!(id, "r-42");
        create.assert();
    }

    #[tokio::test]
    async fn test_compare_screenshots_parses_missing_percentage() {
        let server = MockServer::start();
        let compare = server.mock(|when, then| {
            when.method(POST).path("/screenshots/compare");
            then.status(200).json_body(json!({ "key": "home" }));
        });

        let result = service(&server)
            .compare_screenshots("home", b"png")
            .await
            .unwrap();
        assert_eq!(result.key, "home");
        assert_eq!(result.present_difference_percent, None);
        compare.assert();
    }

    #[tokio::test]
    async fn test_finish_report_puts_status() {
        let server = MockServer::start();
        let finish = server.mock(|when, then| {
            when.method(PUT)
                .path("/reports/r-42/status")
                .json_body(json!({ "status": "FAILED" }));
            then.status(204);
        });

        service(&server)
            .finish_report("r-42", ReportStatus::Failed)
            .await
            .unwrap();
        finish.assert();
    }

    #[tokio::test]
    async fn test_http_error_is_reported() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/reports/r-1/scenarios");
            then.status(500).body("boom");
        });

        let upload = ScenarioUpload {
            suite: "login".into(),
            scenario: "valid user".into(),
            status: ReportStatus::Passed,
            duration_ms: 10,
            steps: vec![],
        };
        let err = service(&server)
            .upload_scenario("r-1", &upload)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("500"));
    }
}
