use serde::{Deserialize, Serialize};

use crate::texture::LoadOptions;

/// How image assets are loaded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TextureOptions {
    /// Decode on a background worker instead of the render thread.
    pub async_loading: bool,
    /// Build mip pyramids for loaded images.
    pub mipmaps: bool,
    /// Reverse row order before upload.
    pub flip_vertically: bool,
}

impl Default for TextureOptions {
    fn default() -> Self {
        Self {
            async_loading: true,
            mipmaps: true,
            flip_vertically: false,
        }
    }
}

impl TextureOptions {
    /// Upload settings for loads.
    #[must_use]
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            mipmaps: self.mipmaps,
            flip_vertically: self.flip_vertically,
        }
    }
}
