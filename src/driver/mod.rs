pub mod devices;
pub mod pixel_diff;
pub mod traits;
pub mod web;

pub use devices::DeviceProfile;
pub use traits::{BrowserDriver, ElementState, PseudoState};
