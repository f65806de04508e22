//! Web Driver implementation using Playwright
//!
//! Owns one browser and one active page. Device emulation and restarts swap
//! the browser context underneath; callers never see the page directly.

use anyhow::{Context, Result};
use async_trait::async_trait;
use playwright::api::{Browser, BrowserContext, Page, Viewport};
use playwright::Playwright;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::driver::devices::DeviceProfile;
use crate::driver::traits::{BrowserDriver, ElementState, PseudoState};

/// Quiet window without new resource entries before the network counts as idle
const NETWORK_IDLE_WINDOW_MS: u64 = 500;
const POLL_INTERVAL_MS: u64 = 100;

/// Web browser type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BrowserType {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl BrowserType {
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "firefox" => BrowserType::Firefox,
            "webkit" | "safari" => BrowserType::Webkit,
            _ => BrowserType::Chromium,
        }
    }
}

/// Web Driver configuration
#[derive(Debug, Clone)]
pub struct WebDriverConfig {
    pub browser_type: BrowserType,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        let headless = std::env::var("LUMI_HEADLESS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(true);

        Self {
            browser_type: BrowserType::Chromium,
            headless,
            viewport_width: 1280,
            viewport_height: 720,
        }
    }
}

/// Context and page currently in use
struct PageSession {
    context: BrowserContext,
    page: Page,
}

/// Web Driver using Playwright
pub struct WebDriver {
    #[allow(dead_code)]
    playwright: Arc<Playwright>,
    browser: Arc<Browser>,
    session: Mutex<PageSession>,
    profile: Mutex<Option<DeviceProfile>>,
    config: WebDriverConfig,
    name: String,
}

impl WebDriver {
    /// Launch the browser and open the first page
    pub async fn new(config: WebDriverConfig) -> Result<Self> {
        let playwright = Playwright::initialize()
            .await
            .context("Failed to initialize Playwright")?;

        let browser = match config.browser_type {
            BrowserType::Chromium => launch_chromium_browser(&playwright.chromium(), &config).await?,
            BrowserType::Firefox => {
                playwright
                    .firefox()
                    .launcher()
                    .headless(config.headless)
                    .launch()
                    .await?
            }
            BrowserType::Webkit => {
                playwright
                    .webkit()
                    .launcher()
                    .headless(config.headless)
                    .launch()
                    .await?
            }
        };

        let session = open_session(&browser, &config, None).await?;
        log::info!(
            "Browser started: {:?} (headless: {})",
            config.browser_type,
            config.headless
        );

        Ok(Self {
            playwright: Arc::new(playwright),
            browser: Arc::new(browser),
            session: Mutex::new(session),
            profile: Mutex::new(None),
            name: format!("{:?}", config.browser_type).to_lowercase(),
            config,
        })
    }

    /// Replace the current context with a fresh one using the active profile
    async fn reopen(&self, keep_url: bool) -> Result<()> {
        let profile = *self.profile.lock().await;
        let mut session = self.session.lock().await;

        let previous_url = if keep_url {
            session
                .page
                .evaluate::<(), String>("() => window.location.href", ())
                .await
                .ok()
                .filter(|u| u.starts_with("http"))
        } else {
            None
        };

        if let Err(e) = session.context.close().await {
            log::warn!("Failed to close browser context: {:?}", e);
        }
        *session = open_session(&self.browser, &self.config, profile).await?;

        if let Some(url) = previous_url {
            session
                .page
                .goto_builder(&url)
                .goto()
                .await
                .context("Failed to restore page after context switch")?;
        }
        Ok(())
    }
}

async fn open_session(
    browser: &Browser,
    config: &WebDriverConfig,
    profile: Option<DeviceProfile>,
) -> Result<PageSession> {
    let context = match profile {
        Some(p) => {
            let d = p.descriptor();
            browser
                .context_builder()
                .viewport(Some(Viewport {
                    width: d.width as i32,
                    height: d.height as i32,
                }))
                .user_agent(d.user_agent)
                .device_scale_factor(d.scale_factor)
                .is_mobile(d.is_mobile)
                .has_touch(d.has_touch)
                .build()
                .await?
        }
        None => browser.context_builder().build().await?,
    };

    let page = context.new_page().await?;
    if profile.is_none() {
        page.set_viewport_size(Viewport {
            width: config.viewport_width as i32,
            height: config.viewport_height as i32,
        })
        .await?;
    }

    Ok(PageSession { context, page })
}

#[async_trait]
impl BrowserDriver for WebDriver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn goto(&self, url: &str) -> Result<()> {
        let session = self.session.lock().await;
        session
            .page
            .goto_builder(url)
            .goto()
            .await
            .context("Failed to navigate to URL")?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        let session = self.session.lock().await;
        let url: String = session
            .page
            .evaluate::<(), String>("() => window.location.href", ())
            .await?;
        Ok(url)
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        state: ElementState,
        timeout_ms: u64,
    ) -> Result<bool> {
        match state {
            ElementState::Visible => {
                let session = self.session.lock().await;
                let result = session
                    .page
                    .wait_for_selector_builder(selector)
                    .timeout(timeout_ms as f64)
                    .wait_for_selector()
                    .await;
                Ok(result.is_ok())
            }
            ElementState::Hidden => {
                let start = Instant::now();
                while start.elapsed() < Duration::from_millis(timeout_ms) {
                    let visible = {
                        let session = self.session.lock().await;
                        match session.page.query_selector(selector).await? {
                            Some(el) => el.is_visible().await?,
                            None => false,
                        }
                    };
                    if !visible {
                        return Ok(true);
                    }
                    tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
                }
                Ok(false)
            }
        }
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        let session = self.session.lock().await;
        let elements = session.page.query_selector_all(selector).await?;
        Ok(elements.len())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let session = self.session.lock().await;
        session
            .page
            .click_builder(selector)
            .click()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to click: {}. Error: {:?}", selector, e))?;
        Ok(())
    }

    async fn type_text(&self, selector: &str, value: &str) -> Result<()> {
        let session = self.session.lock().await;
        session.page.click_builder(selector).click().await?;
        session.page.keyboard.input_text(value).await?;
        Ok(())
    }

    async fn text_content(&self, selector: &str) -> Result<Option<String>> {
        let session = self.session.lock().await;
        if session.page.query_selector(selector).await?.is_none() {
            return Ok(None);
        }
        let text: String = session
            .page
            .evaluate_on_selector::<String, _>(selector, "el => el.textContent || ''", None::<String>)
            .await?;
        Ok(Some(text))
    }

    async fn wait_for_network_idle(&self, timeout_ms: u64) -> Result<()> {
        let js = "() => document.readyState === 'complete' \
                  ? performance.getEntriesByType('resource').length : -1";
        let start = Instant::now();
        let mut last_count: i64 = -1;
        let mut quiet_since = Instant::now();

        while start.elapsed() < Duration::from_millis(timeout_ms) {
            let count: i64 = {
                let session = self.session.lock().await;
                session.page.evaluate::<(), i64>(js, ()).await?
            };
            if count >= 0 && count == last_count {
                if quiet_since.elapsed() >= Duration::from_millis(NETWORK_IDLE_WINDOW_MS) {
                    return Ok(());
                }
            } else {
                last_count = count;
                quiet_since = Instant::now();
            }
            tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }
        anyhow::bail!("Network did not become idle within {}ms", timeout_ms)
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let session = self.session.lock().await;
        let bytes = session
            .page
            .screenshot_builder()
            .r#type(playwright::api::ScreenshotType::Png)
            .screenshot()
            .await?;
        Ok(bytes)
    }

    async fn emulate(&self, profile: DeviceProfile) -> Result<()> {
        log::info!("Emulating device: {}", profile);
        self.profile.lock().await.replace(profile);
        self.reopen(true).await
    }

    async fn force_state(&self, selector: &str, state: PseudoState) -> Result<()> {
        let session = self.session.lock().await;
        match state {
            PseudoState::Hover => {
                session.page.hover_builder(selector).goto().await?;
            }
            PseudoState::Focus => {
                session
                    .page
                    .evaluate_on_selector::<(), serde_json::Value>(
                        selector,
                        "el => { el.focus(); return null; }",
                        None,
                    )
                    .await?;
            }
            PseudoState::Active => {
                session
                    .page
                    .evaluate_on_selector::<(), serde_json::Value>(
                        selector,
                        "el => { el.dispatchEvent(new MouseEvent('mousedown', { bubbles: true })); return null; }",
                        None,
                    )
                    .await?;
            }
        }
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        let session = self.session.lock().await;
        session.page.keyboard.down(key).await?;
        session.page.keyboard.up(key).await?;
        Ok(())
    }

    async fn input_value(&self, selector: &str) -> Result<String> {
        let session = self.session.lock().await;
        let value: String = session
            .page
            .evaluate_on_selector::<String, _>(selector, "el => el.value || ''", None::<String>)
            .await?;
        Ok(value)
    }

    async fn restart(&self) -> Result<()> {
        log::info!("Restarting browser context");
        self.reopen(false).await
    }
}

/// Launch a new Chromium browser, preferring an installed Chrome
async fn launch_chromium_browser(
    chromium: &playwright::api::BrowserType,
    config: &WebDriverConfig,
) -> Result<Browser> {
    let mut launcher = chromium.launcher();
    launcher = launcher.headless(config.headless);

    let env_path = std::env::var("PLAYWRIGHT_CHROMIUM_EXECUTABLE_PATH")
        .ok()
        .map(std::path::PathBuf::from);

    let browser_path = env_path.or_else(find_system_browser);
    if let Some(ref path) = browser_path {
        log::info!("Using browser executable: {}", path.display());
        launcher = launcher.executable(path);
    } else {
        log::info!("No browser executable found, using Playwright's bundled Chromium");
    }

    let args: Vec<String> = [
        "--no-sandbox",
        "--disable-setuid-sandbox",
        "--disable-dev-shm-usage",
        "--disable-gpu",
        "--ignore-certificate-errors",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    launcher = launcher.args(&args);

    Ok(launcher.launch().await?)
}

fn find_system_browser() -> Option<std::path::PathBuf> {
    let common_paths = [
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        // Lambda-style layers ship headless chromium here
        "/opt/chromium/chromium",
    ];

    common_paths
        .iter()
        .map(std::path::Path::new)
        .find(|p| p.exists())
        .map(|p| p.to_path_buf())
}
