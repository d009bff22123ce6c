//! Texture and render-target resource management.
//!
//! [`TextureContext`] bundles what every texture operation needs: the
//! graphics context, the asset cache and the decoder used for loads. Its
//! lifetime is the lifetime of the graphics context; on context loss the
//! cache is emptied and can be replayed with [`TextureContext::reinit_all`].

/// Texture cache keyed by asset path.
pub mod cache;
/// State saved across a capture bracket.
pub mod capture;
/// GPU identity and validity flags.
pub mod handle;
/// Background decode jobs.
pub mod loader;
/// CPU pixel buffers, row flip and mip chains.
pub mod pixels;
/// Render-target variants and their allocation recipes.
pub mod render_target;
/// The texture resource.
pub mod resource;
#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

pub use cache::{LoadOptions, SourceKind, TextureCache};
pub use handle::{TextureHandle, TextureInfo};
pub use pixels::{Bitmap, PixelBuffer};
pub use render_target::{BufferKind, RenderTargetOptions};
pub use resource::{LoadState, Texture};

use crate::decode::{Decoder, ImageDecoder};
use crate::gpu::context::GraphicsContext;
use crate::gpu::device::GraphicsDevice;

/// Graphics context, cache and decoder shared by all textures.
pub struct TextureContext<D: GraphicsDevice> {
    /// Graphics device context.
    pub gfx: GraphicsContext<D>,
    /// Asset cache.
    pub cache: TextureCache,
    decoder: Arc<dyn Decoder>,
}

impl<D: GraphicsDevice> std::fmt::Debug for TextureContext<D>
where
    D: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureContext")
            .field("gfx", &self.gfx)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl<D: GraphicsDevice> TextureContext<D> {
    /// Context loading assets through `decoder`.
    pub fn new(gfx: GraphicsContext<D>, decoder: Arc<dyn Decoder>) -> Self {
        Self {
            gfx,
            cache: TextureCache::new(),
            decoder,
        }
    }

    /// Context loading files through the `image` crate.
    pub fn with_image_decoder(gfx: GraphicsContext<D>) -> Self {
        Self::new(gfx, Arc::new(ImageDecoder::default()))
    }

    /// Decoder used by loads.
    #[must_use]
    pub fn decoder(&self) -> &Arc<dyn Decoder> {
        &self.decoder
    }

    /// Release every cached GPU object, keeping the rows for replay.
    pub fn unload_all(&mut self) {
        self.cache.unload_all(&mut self.gfx);
    }

    /// Decode and upload every replayable cache row again. Returns the
    /// number of reloaded rows.
    pub fn reinit_all(&mut self) -> usize {
        self.cache.reinit_all(&mut self.gfx, self.decoder.as_ref())
    }

    /// The graphics context was lost: every GPU name is stale. Cached rows
    /// are kept for [`Self::reinit_all`].
    pub fn context_lost(&mut self) {
        self.gfx.context_lost();
        self.cache.unload_all(&mut self.gfx);
    }
}
