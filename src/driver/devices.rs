//! Supported device emulation profiles.
//!
//! A closed table: unknown names are rejected instead of being passed
//! through to the browser.

use crate::error::RunnerError;

/// Device profile used for emulation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceProfile {
    Desktop,
    Laptop,
    IPhoneSE,
    IPhone13,
    Pixel5,
    GalaxyS9,
    IPadMini,
    IPadPro,
}

/// Viewport and browser identity for a profile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceDescriptor {
    pub width: u32,
    pub height: u32,
    pub scale_factor: f64,
    pub is_mobile: bool,
    pub has_touch: bool,
    pub user_agent: &'static str,
}

const DESKTOP_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const IPHONE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 15_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.0 Mobile/15E148 Safari/604.1";
const IPAD_UA: &str = "Mozilla/5.0 (iPad; CPU OS 15_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.0 Mobile/15E148 Safari/604.1";
const PIXEL_UA: &str = "Mozilla/5.0 (Linux; Android 11; Pixel 5) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36";
const GALAXY_UA: &str = "Mozilla/5.0 (Linux; Android 8.0.0; SM-G960F) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36";

impl DeviceProfile {
    pub const ALL: [DeviceProfile; 8] = [
        DeviceProfile::Desktop,
        DeviceProfile::Laptop,
        DeviceProfile::IPhoneSE,
        DeviceProfile::IPhone13,
        DeviceProfile::Pixel5,
        DeviceProfile::GalaxyS9,
        DeviceProfile::IPadMini,
        DeviceProfile::IPadPro,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DeviceProfile::Desktop => "Desktop",
            DeviceProfile::Laptop => "Laptop",
            DeviceProfile::IPhoneSE => "iPhone SE",
            DeviceProfile::IPhone13 => "iPhone 13",
            DeviceProfile::Pixel5 => "Pixel 5",
            DeviceProfile::GalaxyS9 => "Galaxy S9",
            DeviceProfile::IPadMini => "iPad Mini",
            DeviceProfile::IPadPro => "iPad Pro",
        }
    }

    pub fn descriptor(&self) -> DeviceDescriptor {
        let (width, height, scale_factor, is_mobile, user_agent) = match self {
            DeviceProfile::Desktop => (1920, 1080, 1.0, false, DESKTOP_UA),
            DeviceProfile::Laptop => (1280, 720, 1.0, false, DESKTOP_UA),
            DeviceProfile::IPhoneSE => (375, 667, 2.0, true, IPHONE_UA),
            DeviceProfile::IPhone13 => (390, 844, 3.0, true, IPHONE_UA),
            DeviceProfile::Pixel5 => (393, 851, 2.75, true, PIXEL_UA),
            DeviceProfile::GalaxyS9 => (360, 740, 3.0, true, GALAXY_UA),
            DeviceProfile::IPadMini => (768, 1024, 2.0, true, IPAD_UA),
            DeviceProfile::IPadPro => (1024, 1366, 2.0, true, IPAD_UA),
        };
        DeviceDescriptor {
            width,
            height,
            scale_factor,
            is_mobile,
            has_touch: is_mobile,
            user_agent,
        }
    }
}

impl std::fmt::Display for DeviceProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

impl std::str::FromStr for DeviceProfile {
    type Err = RunnerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize(s);
        DeviceProfile::ALL
            .into_iter()
            .find(|p| normalize(p.name()) == wanted)
            .ok_or_else(|| RunnerError::UnknownDevice(s.to_string()))
    }
}
