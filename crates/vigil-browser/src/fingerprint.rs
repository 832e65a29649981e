use chromiumoxide::handler::viewport::Viewport;
use vigil_core::config::{BrowserConfig, DEFAULT_USER_AGENT};

/// Fixed desktop identity presented to audited sites.
///
/// Every audit uses the same profile so results are comparable between runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintConfig {
    pub user_agent: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl FingerprintConfig {
    /// Standard 1920x1080 desktop Chrome profile.
    pub fn desktop() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            viewport_width: 1920,
            viewport_height: 1080,
        }
    }

    /// Profile taken from browser settings.
    pub fn from_config(config: &BrowserConfig) -> Self {
        let defaults = Self::desktop();
        Self {
            user_agent: if config.user_agent.trim().is_empty() {
                defaults.user_agent
            } else {
                config.user_agent.clone()
            },
            viewport_width: if config.viewport_width == 0 {
                defaults.viewport_width
            } else {
                config.viewport_width
            },
            viewport_height: if config.viewport_height == 0 {
                defaults.viewport_height
            } else {
                config.viewport_height
            },
        }
    }

    /// Viewport emulated on every page.
    pub fn viewport(&self) -> Viewport {
        Viewport {
            width: self.viewport_width,
            height: self.viewport_height,
            device_scale_factor: None,
            emulating_mobile: false,
            is_landscape: true,
            has_touch: false,
        }
    }
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self::desktop()
    }
}
