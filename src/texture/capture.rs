//! Snapshot of the state a capture bracket changes.

use glam::Mat4;

use crate::gpu::context::{GraphicsContext, MatrixMode};
use crate::gpu::device::{FramebufferId, GraphicsDevice, Viewport};

/// Everything `begin_capture` overwrites and `end_capture` puts back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureContext {
    /// Framebuffer bound before the capture began.
    pub previous_framebuffer: FramebufferId,
    /// Projection, model-view and texture matrices, in [`MatrixMode::ALL`]
    /// order.
    pub matrices: [Mat4; 3],
    /// Viewport before the capture began.
    pub viewport: Viewport,
}

impl CaptureContext {
    /// Record the current framebuffer, matrices and viewport.
    pub fn save<D: GraphicsDevice>(gfx: &GraphicsContext<D>) -> Self {
        Self {
            previous_framebuffer: gfx.framebuffer_bind_get(),
            matrices: MatrixMode::ALL.map(|mode| gfx.matrix_get(mode)),
            viewport: gfx.viewport(),
        }
    }

    /// Put the recorded state back.
    pub fn restore<D: GraphicsDevice>(self, gfx: &mut GraphicsContext<D>) {
        for (mode, matrix) in MatrixMode::ALL.into_iter().zip(self.matrices) {
            gfx.matrix_set(mode, matrix);
        }
        gfx.set_viewport(self.viewport);
        gfx.framebuffer_bind(self.previous_framebuffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::headless::HeadlessDevice;
    use glam::Vec3;

    #[test]
    fn restore_puts_back_everything_saved() {
        let mut gfx =
            GraphicsContext::new(HeadlessDevice::new(), Viewport::sized(10, 20));
        let projection = Mat4::orthographic_rh(0.0, 10.0, 0.0, 20.0, -1.0, 1.0);
        gfx.matrix_set(MatrixMode::Projection, projection);
        let saved = CaptureContext::save(&gfx);

        let fb = gfx.device_mut().gen_framebuffer();
        gfx.framebuffer_bind(fb);
        gfx.set_viewport(Viewport::sized(256, 256));
        for mode in MatrixMode::ALL {
            gfx.matrix_set(mode, Mat4::from_scale(Vec3::splat(3.0)));
        }

        saved.restore(&mut gfx);
        assert_eq!(gfx.matrix_get(MatrixMode::Projection), projection);
        assert_eq!(gfx.matrix_get(MatrixMode::ModelView), Mat4::IDENTITY);
        assert_eq!(gfx.viewport(), Viewport::sized(10, 20));
        assert!(gfx.framebuffer_bind_get().is_default());
    }
}
