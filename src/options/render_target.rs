use serde::{Deserialize, Serialize};

use crate::texture::{BufferKind, RenderTargetOptions};

/// The off-screen target the frame loop captures into.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct RenderTargetSettings {
    /// Render-target variant.
    pub kind: BufferKind,
    /// 16-bit float channels.
    pub float_texture: bool,
    /// Four channels instead of three.
    pub alpha: bool,
    /// Multisample when the device supports it.
    pub multisample: bool,
}

impl Default for RenderTargetSettings {
    fn default() -> Self {
        Self {
            kind: BufferKind::FeedbackMultisampleBlit,
            float_texture: false,
            alpha: true,
            multisample: true,
        }
    }
}

impl RenderTargetSettings {
    /// Allocation options for these settings.
    #[must_use]
    pub fn target_options(&self) -> RenderTargetOptions {
        RenderTargetOptions {
            float_texture: self.float_texture,
            alpha: self.alpha,
            multisample: self.multisample,
            existing_depth: None,
        }
    }
}
