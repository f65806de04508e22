use super::devices::DeviceProfile;
use anyhow::Result;
use async_trait::async_trait;

/// Element state to wait for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ElementState {
    #[default]
    Visible,
    Hidden,
}

impl ElementState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementState::Visible => "visible",
            ElementState::Hidden => "hidden",
        }
    }
}

impl std::str::FromStr for ElementState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "visible" => Ok(ElementState::Visible),
            "hidden" => Ok(ElementState::Hidden),
            other => anyhow::bail!("Unknown element state: {}", other),
        }
    }
}

/// CSS pseudo-class that can be forced onto an element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PseudoState {
    Hover,
    Focus,
    Active,
}

impl std::str::FromStr for PseudoState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().trim_start_matches(':').to_lowercase().as_str() {
            "hover" => Ok(PseudoState::Hover),
            "focus" => Ok(PseudoState::Focus),
            "active" => Ok(PseudoState::Active),
            other => anyhow::bail!("Unsupported pseudo-class: {}", other),
        }
    }
}

/// Browser automation interface used by the action executor
///
/// Selectors are CSS unless prefixed with `xpath=`. Every method acts on the
/// single active page of the driver; implementations are expected to
/// serialize access to that page internally.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Browser name (e.g., "chromium")
    fn name(&self) -> &str;

    /// Navigate the page to an absolute URL
    async fn goto(&self, url: &str) -> Result<()>;

    /// URL currently loaded in the page
    async fn current_url(&self) -> Result<String>;

    /// Wait until the selector reaches `state`
    ///
    /// # Returns
    /// True if the state was reached, false on timeout
    async fn wait_for_selector(
        &self,
        selector: &str,
        state: ElementState,
        timeout_ms: u64,
    ) -> Result<bool>;

    /// Number of elements currently matching the selector
    async fn count(&self, selector: &str) -> Result<usize>;

    /// Click the first element matching the selector
    async fn click(&self, selector: &str) -> Result<()>;

    /// Focus the element and type `value` key by key
    async fn type_text(&self, selector: &str, value: &str) -> Result<()>;

    /// Text content of the first matching element, None if nothing matches
    async fn text_content(&self, selector: &str) -> Result<Option<String>>;

    /// Wait until no network requests have started for a short quiet window
    async fn wait_for_network_idle(&self, timeout_ms: u64) -> Result<()>;

    /// Capture the viewport as PNG bytes
    async fn screenshot(&self) -> Result<Vec<u8>>;

    /// Switch the page to a device profile
    async fn emulate(&self, profile: DeviceProfile) -> Result<()>;

    /// Put an element into a pseudo-class state (hover, focus, active)
    async fn force_state(&self, selector: &str, state: PseudoState) -> Result<()>;

    /// Press and release a keyboard key (e.g., "Enter", "Tab")
    async fn press_key(&self, key: &str) -> Result<()>;

    /// Current value of an input element
    async fn input_value(&self, selector: &str) -> Result<String>;

    /// Throw away the page and start from a fresh browser context
    async fn restart(&self) -> Result<()>;
}
