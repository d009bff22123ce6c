use serde::{Deserialize, Serialize};

/// Window placement and size.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WindowOptions {
    /// Inner width in pixels.
    pub width: u32,
    /// Inner height in pixels.
    pub height: u32,
    /// Start in borderless fullscreen.
    pub fullscreen: bool,
    /// Top-left corner on the desktop; the platform decides when unset.
    pub position: Option<[i32; 2]>,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fullscreen: false,
            position: None,
        }
    }
}
