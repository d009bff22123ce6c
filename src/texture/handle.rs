//! Texture identity and validity flags.

use crate::gpu::device::{Dimensionality, TextureId};

/// Value-copyable description of a GPU texture. This is what the
/// [`super::cache::TextureCache`] hands out on a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextureInfo {
    /// GPU object, `None` while unallocated.
    pub object: Option<TextureId>,
    /// Texture target.
    pub dimensionality: Dimensionality,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
}

impl TextureInfo {
    /// Raw object name, `0` when unallocated.
    #[must_use]
    pub fn object_id(&self) -> u32 {
        self.object.map_or(0, TextureId::get)
    }
}

/// GPU identity of one logical texture or render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextureHandle {
    info: TextureInfo,
    valid_for_binding: bool,
    valid_for_capture: bool,
}

impl TextureHandle {
    /// Metadata copy.
    #[must_use]
    pub fn info(&self) -> TextureInfo {
        self.info
    }

    /// GPU object, if any.
    #[must_use]
    pub fn object(&self) -> Option<TextureId> {
        self.info.object
    }

    /// Raw object name, `0` when unallocated.
    #[must_use]
    pub fn object_id(&self) -> u32 {
        self.info.object_id()
    }

    /// Texture target.
    #[must_use]
    pub fn dimensionality(&self) -> Dimensionality {
        self.info.dimensionality
    }

    /// Width in texels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.info.width
    }

    /// Height in texels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.info.height
    }

    /// Whether `bind()` has something to bind.
    #[must_use]
    pub fn is_valid_for_binding(&self) -> bool {
        self.valid_for_binding
    }

    /// Whether drawing can be captured into this texture. Only render
    /// targets are capturable.
    #[must_use]
    pub fn is_valid_for_capture(&self) -> bool {
        self.valid_for_capture
    }

    pub(crate) fn set_sampled(&mut self, info: TextureInfo) {
        self.info = info;
        self.valid_for_binding = info.object.is_some();
        self.valid_for_capture = false;
    }

    pub(crate) fn set_render_target(&mut self, info: TextureInfo) {
        self.info = info;
        self.valid_for_binding = true;
        self.valid_for_capture = true;
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}
