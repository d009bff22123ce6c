//! Graphics device context: the CPU-side state that sits in front of a
//! [`GraphicsDevice`].
//!
//! Tracks the bound render target, the projection / model-view / texture
//! matrix stacks, the viewport and per-target texture enable flags, and
//! counts context generations so GPU names from a lost context are never
//! handed back to the device.

use glam::Mat4;

use super::device::{
    Capabilities, Dimensionality, FramebufferId, GraphicsDevice, TextureId,
    Viewport,
};
use crate::error::TextureError;

/// Which transform stack an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatrixMode {
    /// Projection matrix.
    Projection,
    /// Model-view matrix.
    ModelView,
    /// Texture coordinate matrix.
    Texture,
}

impl MatrixMode {
    /// All three stacks, in save/restore order.
    pub const ALL: [Self; 3] = [Self::Projection, Self::ModelView, Self::Texture];

    fn index(self) -> usize {
        match self {
            Self::Projection => 0,
            Self::ModelView => 1,
            Self::Texture => 2,
        }
    }
}

/// Owns a device and the state the texture manager reads and restores.
#[derive(Debug)]
pub struct GraphicsContext<D: GraphicsDevice> {
    device: D,
    stacks: [Vec<Mat4>; 3],
    framebuffer: FramebufferId,
    viewport: Viewport,
    enabled: [bool; 2],
    generation: u64,
}

impl<D: GraphicsDevice> GraphicsContext<D> {
    /// Wrap `device`, starting with identity transforms and the default
    /// render target bound.
    pub fn new(mut device: D, viewport: Viewport) -> Self {
        device.set_viewport(viewport);
        Self {
            device,
            stacks: [vec![Mat4::IDENTITY], vec![Mat4::IDENTITY], vec![
                Mat4::IDENTITY,
            ]],
            framebuffer: FramebufferId::DEFAULT,
            viewport,
            enabled: [false; 2],
            generation: 0,
        }
    }

    /// The wrapped device.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Mutable access to the wrapped device.
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Feature flags of the wrapped device.
    pub fn capabilities(&self) -> Capabilities {
        self.device.capabilities()
    }

    /// Whether off-screen render targets can be created. Logs a notice for
    /// each missing feature.
    pub fn supports_render_targets(&self) -> bool {
        let caps = self.capabilities();
        if !caps.framebuffer_objects {
            log::warn!(
                "framebuffer object support is missing, render targets \
                 are unavailable"
            );
        }
        if !caps.framebuffer_blit {
            log::warn!(
                "framebuffer blit support is missing, render targets are \
                 unavailable"
            );
        }
        caps.supports_render_targets()
    }

    // ── Render target binding ────────────────────────────────────────

    /// Bind `framebuffer` for drawing.
    pub fn framebuffer_bind(&mut self, framebuffer: FramebufferId) {
        self.framebuffer = framebuffer;
        self.device.bind_framebuffer(framebuffer);
    }

    /// Currently bound framebuffer.
    pub fn framebuffer_bind_get(&self) -> FramebufferId {
        self.framebuffer
    }

    // ── Matrix stacks ────────────────────────────────────────────────

    /// Top of the `mode` stack.
    pub fn matrix_get(&self, mode: MatrixMode) -> Mat4 {
        self.stacks[mode.index()]
            .last()
            .copied()
            .unwrap_or(Mat4::IDENTITY)
    }

    /// Replace the top of the `mode` stack.
    pub fn matrix_set(&mut self, mode: MatrixMode, matrix: Mat4) {
        let stack = &mut self.stacks[mode.index()];
        match stack.last_mut() {
            Some(top) => *top = matrix,
            None => stack.push(matrix),
        }
    }

    /// Reset the top of the `mode` stack to identity.
    pub fn matrix_load_identity(&mut self, mode: MatrixMode) {
        self.matrix_set(mode, Mat4::IDENTITY);
    }

    /// Post-multiply the top of the `mode` stack.
    pub fn matrix_mult(&mut self, mode: MatrixMode, matrix: Mat4) {
        let top = self.matrix_get(mode);
        self.matrix_set(mode, top * matrix);
    }

    /// Duplicate the top of the `mode` stack.
    pub fn matrix_push(&mut self, mode: MatrixMode) {
        let top = self.matrix_get(mode);
        self.stacks[mode.index()].push(top);
    }

    /// Discard the top of the `mode` stack.
    ///
    /// # Errors
    ///
    /// Returns [`TextureError::StateMisuse`] when only the base matrix is
    /// left; the stack is not modified.
    pub fn matrix_pop(&mut self, mode: MatrixMode) -> Result<(), TextureError> {
        let stack = &mut self.stacks[mode.index()];
        if stack.len() <= 1 {
            log::warn!("matrix stack underflow on {mode:?}");
            return Err(TextureError::StateMisuse("matrix stack underflow"));
        }
        let _ = stack.pop();
        Ok(())
    }

    /// Depth of the `mode` stack.
    pub fn matrix_depth(&self, mode: MatrixMode) -> usize {
        self.stacks[mode.index()].len()
    }

    // ── Viewport ─────────────────────────────────────────────────────

    /// Current viewport.
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Set the viewport.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.device.set_viewport(viewport);
    }

    // ── Texture targets ──────────────────────────────────────────────

    /// Whether texturing is enabled on `target`.
    pub fn is_enabled(&self, target: Dimensionality) -> bool {
        self.enabled[target.index()]
    }

    /// Enable texturing on `target`.
    pub fn enable(&mut self, target: Dimensionality) {
        self.enabled[target.index()] = true;
    }

    /// Disable texturing on `target`.
    pub fn disable(&mut self, target: Dimensionality) {
        self.enabled[target.index()] = false;
    }

    /// Bind a texture to `target`.
    pub fn bind_texture(&mut self, target: Dimensionality, id: Option<TextureId>) {
        self.device.bind_texture(target, id);
    }

    // ── Context lifetime ─────────────────────────────────────────────

    /// Generation of the underlying graphics context.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Record that every GPU object was lost with the context. Bound state
    /// falls back to defaults; names from older generations are stale.
    pub fn context_lost(&mut self) {
        self.generation += 1;
        self.framebuffer = FramebufferId::DEFAULT;
        self.enabled = [false; 2];
        log::info!("graphics context lost, generation {}", self.generation);
    }
}
