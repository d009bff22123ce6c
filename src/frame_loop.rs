//! Per-frame driver shared by the windowed viewer and headless runs.

use std::path::Path;

use crate::gpu::device::{GraphicsDevice, TextureId, Viewport};
use crate::options::{Options, RenderTargetSettings, TextureOptions};
use crate::texture::{BufferKind, Texture, TextureContext};
use crate::transport::{CommandError, EngineTime, TransportCommand};
use crate::util::frame_timing::FrameClock;

/// What one frame did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    /// Engine time after advancing.
    pub vtime: f32,
    /// Images that had something to bind.
    pub bound_images: usize,
    /// Whether the capture target was drawn into.
    pub captured: bool,
}

/// Owns the texture context, the capture target and the loaded images.
#[derive(Debug)]
pub struct FrameLoop<D: GraphicsDevice> {
    ctx: TextureContext<D>,
    target: Texture,
    target_settings: RenderTargetSettings,
    images: Vec<Texture>,
    time: EngineTime,
    clock: FrameClock,
    frames: u64,
}

impl<D: GraphicsDevice> FrameLoop<D> {
    /// Configure the capture target at the current viewport size and start
    /// loading `images`. Failures are logged; the loop runs regardless.
    pub fn new(
        mut ctx: TextureContext<D>,
        options: &Options,
        images: &[impl AsRef<Path>],
    ) -> Self {
        let viewport = ctx.gfx.viewport();
        let mut target = Texture::new();
        let settings = options.render_target.clone();
        if settings.kind != BufferKind::None {
            if let Err(e) = target.init_as_render_target(
                &mut ctx.gfx,
                settings.kind,
                viewport.width,
                viewport.height,
                &settings.target_options(),
            ) {
                log::warn!("capture target unavailable: {e}");
            }
        }

        let images = images
            .iter()
            .map(|path| load_image(&mut ctx, path.as_ref(), &options.textures))
            .collect();

        let mut time = if options.transport.autoplay {
            EngineTime::new()
        } else {
            EngineTime::stopped()
        };
        let _ = time.execute(
            TransportCommand::SetLoopPoint {
                seconds: options.transport.loop_point,
            },
            0.0,
        );

        Self {
            ctx,
            target,
            target_settings: settings,
            images,
            time,
            clock: FrameClock::new(),
            frames: 0,
        }
    }

    /// Texture context.
    pub fn context(&self) -> &TextureContext<D> {
        &self.ctx
    }

    /// Mutable texture context.
    pub fn context_mut(&mut self) -> &mut TextureContext<D> {
        &mut self.ctx
    }

    /// Capture target.
    pub fn target(&self) -> &Texture {
        &self.target
    }

    /// Loaded images, in command-line order.
    pub fn images(&self) -> &[Texture] {
        &self.images
    }

    /// Transport state.
    pub fn time(&self) -> &EngineTime {
        &self.time
    }

    /// Frames rendered so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Texture to put on screen: the first image that is ready, otherwise
    /// the capture target.
    pub fn display_texture(&self) -> Option<TextureId> {
        self.images
            .iter()
            .map(Texture::handle)
            .find(|h| h.is_valid_for_binding())
            .or_else(|| {
                Some(self.target.handle())
                    .filter(|h| h.is_valid_for_binding())
            })
            .and_then(|h| h.object())
    }

    /// Render one frame `dt` seconds after the previous one.
    pub fn render_frame(&mut self, dt: f32) -> FrameReport {
        self.clock.record(dt);
        let _ = self.time.advance(dt);

        let mut bound_images = 0;
        for image in &mut self.images {
            if image.bind(&mut self.ctx) {
                bound_images += 1;
                image.unbind(&mut self.ctx.gfx);
            }
        }

        self.target.begin_capture(&mut self.ctx.gfx);
        let captured = self.target.is_capturing();
        if captured {
            self.ctx
                .gfx
                .device_mut()
                .clear(clear_color(self.time.vtime()));
        }
        self.target.end_capture(&mut self.ctx.gfx);

        self.frames += 1;
        FrameReport {
            vtime: self.time.vtime(),
            bound_images,
            captured,
        }
    }

    /// Follow a viewport resize. Zero sizes (minimized windows) are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.ctx.gfx.set_viewport(Viewport::sized(width, height));
        if self.target_settings.kind == BufferKind::None {
            return;
        }
        if let Err(e) = self.target.reinit_as_render_target(
            &mut self.ctx.gfx,
            self.target_settings.kind,
            width,
            height,
            &self.target_settings.target_options(),
        ) {
            log::warn!("capture target lost on resize to {width}x{height}: {e}");
        }
    }

    /// Parse and apply one transport command line. Returns the reply, if
    /// the command has one.
    ///
    /// # Errors
    ///
    /// [`CommandError`] for lines that do not parse.
    pub fn execute(&mut self, line: &str) -> Result<Option<String>, CommandError> {
        let command: TransportCommand = line.parse()?;
        Ok(self.time.execute(command, self.clock.fps()))
    }

    /// Rebuild GPU state after the graphics context was lost.
    pub fn recover_context(&mut self) {
        self.ctx.context_lost();
        self.target.deinit(&mut self.ctx.gfx);
        let viewport = self.ctx.gfx.viewport();
        self.resize(viewport.width, viewport.height);
        let reloaded = self.ctx.reinit_all();
        log::info!("context recovered, {reloaded} images reloaded");
    }

    /// Release every GPU object and wait for pending decodes.
    pub fn shutdown(&mut self) {
        for image in &mut self.images {
            image.unload(&mut self.ctx);
        }
        self.target.unload(&mut self.ctx);
        log::info!("shut down after {} frames", self.frames);
    }
}

fn load_image<D: GraphicsDevice>(
    ctx: &mut TextureContext<D>,
    path: &Path,
    options: &TextureOptions,
) -> Texture {
    let mut texture = Texture::new();
    let key = path.to_string_lossy();
    let result = if options.async_loading {
        texture.load_async(ctx, &key, options.load_options())
    } else {
        texture.load(ctx, &key, options.load_options())
    };
    if let Err(e) = result {
        log::warn!("could not load {key}: {e}");
    }
    texture
}

/// Slowly cycling clear color for the capture target.
#[must_use]
pub fn clear_color(vtime: f32) -> [f32; 4] {
    let phase = vtime * 0.5;
    [
        0.5 + 0.5 * phase.sin(),
        0.5 + 0.5 * (phase + 2.094).sin(),
        0.5 + 0.5 * (phase + 4.189).sin(),
        1.0,
    ]
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::gpu::context::GraphicsContext;
    use crate::gpu::headless::{DeviceCall, HeadlessDevice};
    use crate::texture::testing::FakeDecoder;
    use crate::transport::PlaybackState;

    fn frame_loop(options: &Options, images: &[&str]) -> FrameLoop<HeadlessDevice> {
        let ctx = TextureContext::new(
            GraphicsContext::new(HeadlessDevice::new(), Viewport::sized(32, 16)),
            Arc::new(FakeDecoder::new()),
        );
        FrameLoop::new(ctx, options, images)
    }

    #[test]
    fn frame_captures_and_restores_default_target() {
        let mut fl = frame_loop(&Options::default(), &[]);
        let report = fl.render_frame(1.0 / 60.0);
        assert!(report.captured);
        let device = fl.context().gfx.device();
        assert_eq!(device.count_calls(|c| matches!(c, DeviceCall::Clear(..))), 1);
        assert_eq!(device.count_calls(|c| matches!(c, DeviceCall::Blit { .. })), 1);
        assert!(fl.context().gfx.framebuffer_bind_get().is_default());
        assert_eq!(fl.display_texture(), fl.target().handle().object());
    }

    #[test]
    fn images_become_bindable_and_are_displayed() {
        let mut options = Options::default();
        options.textures.async_loading = false;
        let mut fl = frame_loop(&options, &["a.png", "a.png", "missing.png"]);
        let report = fl.render_frame(0.016);
        assert_eq!(report.bound_images, 2);
        assert_eq!(fl.display_texture(), fl.images()[0].handle().object());
        assert_eq!(fl.context().cache.refs("a.png"), 2);
    }

    #[test]
    fn resize_reallocates_target() {
        let mut fl = frame_loop(&Options::default(), &[]);
        let before = fl.target().render_target().unwrap().framebuffer;
        fl.resize(64, 64);
        let state = fl.target().render_target().unwrap();
        assert_ne!(state.framebuffer, before);
        assert_eq!((state.width, state.height), (64, 64));
        fl.resize(0, 10);
        assert_eq!(fl.target().handle().width(), 64);
    }

    #[test]
    fn transport_commands_drive_time() {
        let mut fl = frame_loop(&Options::default(), &[]);
        assert_eq!(fl.execute("stop").unwrap(), None);
        let _ = fl.render_frame(1.0);
        assert_eq!(fl.time().vtime(), 0.0);
        assert_eq!(fl.time().state(), PlaybackState::Stopped);
        assert!(fl.execute("fps").unwrap().unwrap().starts_with("fps_d "));
        assert!(fl.execute("warp 9").is_err());
    }

    #[test]
    fn shutdown_releases_everything() {
        let mut options = Options::default();
        options.textures.async_loading = false;
        let mut fl = frame_loop(&options, &["a.png", "b.png"]);
        let _ = fl.render_frame(0.016);
        fl.shutdown();
        assert_eq!(fl.context().gfx.device().live_objects(), 0);
        assert_eq!(fl.context().gfx.device().invalid_deletes(), 0);
        assert!(fl.context().cache.is_empty());
    }

    #[test]
    fn recovers_from_context_loss() {
        let mut options = Options::default();
        options.textures.async_loading = false;
        let mut fl = frame_loop(&options, &["a.png"]);
        fl.recover_context();
        let report = fl.render_frame(0.016);
        assert_eq!(report.bound_images, 1);
        assert!(report.captured);
    }
}
