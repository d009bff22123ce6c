//! Window that runs the frame loop on wgpu and shows its output.
//!
//! ```no_run
//! # use vistex::viewer::Viewer;
//! Viewer::builder()
//!     .with_images(["assets/checker.png"])
//!     .build()
//!     .run()
//!     .unwrap();
//! ```
//!
//! Keys: `Space` toggles play/stop, `R` rewinds, `Home` jumps to zero,
//! `F` logs the frame rate, `Escape` quits.

use std::{path::PathBuf, sync::Arc};

use winit::{
    application::ApplicationHandler,
    dpi::{PhysicalPosition, PhysicalSize},
    event::{ElementState, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Fullscreen, Window, WindowId},
};

use crate::error::TextureError;
use crate::frame_loop::FrameLoop;
use crate::gpu::context::GraphicsContext;
use crate::gpu::device::Viewport;
use crate::gpu::render_context::RenderContext;
use crate::gpu::wgpu_device::WgpuDevice;
use crate::options::Options;
use crate::present::Presenter;
use crate::texture::TextureContext;
use crate::util::frame_timing::FrameTimer;

/// Fluent builder for [`Viewer`].
#[derive(Debug)]
pub struct ViewerBuilder {
    images: Vec<PathBuf>,
    options: Options,
    title: String,
}

impl ViewerBuilder {
    fn new() -> Self {
        Self {
            images: Vec::new(),
            options: Options::default(),
            title: "vistex".into(),
        }
    }

    /// Images to load and display.
    #[must_use]
    pub fn with_images(
        mut self,
        images: impl IntoIterator<Item = impl Into<PathBuf>>,
    ) -> Self {
        self.images = images.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the default options.
    #[must_use]
    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Window title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Finish the builder.
    #[must_use]
    pub fn build(self) -> Viewer {
        Viewer {
            images: self.images,
            options: self.options,
            title: self.title,
        }
    }
}

/// Standalone window showing the first loaded image, or the capture
/// target when no image is ready.
#[derive(Debug)]
pub struct Viewer {
    images: Vec<PathBuf>,
    options: Options,
    title: String,
}

impl Viewer {
    /// Start a new builder.
    #[must_use]
    pub fn builder() -> ViewerBuilder {
        ViewerBuilder::new()
    }

    /// Open the window and block until it is closed.
    ///
    /// # Errors
    ///
    /// [`TextureError::Viewer`] if the event loop cannot be created or
    /// fails while running.
    pub fn run(self) -> Result<(), TextureError> {
        let event_loop = EventLoop::new()
            .map_err(|e| TextureError::Viewer(e.to_string()))?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut app = ViewerApp {
            window: None,
            frame_loop: None,
            presenter: None,
            timer: FrameTimer::new(),
            viewer: self,
        };
        event_loop
            .run_app(&mut app)
            .map_err(|e| TextureError::Viewer(e.to_string()))
    }
}

struct ViewerApp {
    window: Option<Arc<Window>>,
    frame_loop: Option<FrameLoop<WgpuDevice>>,
    presenter: Option<Presenter>,
    timer: FrameTimer,
    viewer: Viewer,
}

fn window_attributes(
    title: &str,
    options: &Options,
) -> winit::window::WindowAttributes {
    let window = &options.window;
    let mut attrs = Window::default_attributes()
        .with_title(title)
        .with_inner_size(PhysicalSize::new(window.width, window.height));
    if let Some([x, y]) = window.position {
        attrs = attrs.with_position(PhysicalPosition::new(x, y));
    }
    if window.fullscreen {
        attrs = attrs.with_fullscreen(Some(Fullscreen::Borderless(None)));
    }
    attrs
}

/// Transport command for a key press, if the key is bound.
fn key_command(code: KeyCode, playing: bool) -> Option<&'static str> {
    match code {
        KeyCode::Space if playing => Some("stop"),
        KeyCode::Space => Some("play"),
        KeyCode::KeyR => Some("rewind"),
        KeyCode::Home => Some("time_set 0"),
        KeyCode::KeyF => Some("fps"),
        _ => None,
    }
}

impl ViewerApp {
    fn init(&mut self, window: &Arc<Window>) -> Result<(), TextureError> {
        let inner = window.inner_size();
        let size = (inner.width.max(1), inner.height.max(1));
        let context =
            pollster::block_on(RenderContext::new(window.clone(), size))?;
        let device = WgpuDevice::new(context);
        let presenter = Presenter::new(&device);
        let gfx = GraphicsContext::new(device, Viewport::sized(size.0, size.1));
        let ctx = TextureContext::with_image_decoder(gfx);
        self.frame_loop = Some(FrameLoop::new(
            ctx,
            &self.viewer.options,
            self.viewer.images.as_slice(),
        ));
        self.presenter = Some(presenter);
        Ok(())
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        if let Some(frame_loop) = &mut self.frame_loop {
            frame_loop
                .context_mut()
                .gfx
                .device_mut()
                .render_context_mut()
                .resize(size.width, size.height);
            frame_loop.resize(size.width, size.height);
        }
    }

    fn redraw(&mut self) {
        let (Some(frame_loop), Some(presenter)) =
            (&mut self.frame_loop, &self.presenter)
        else {
            return;
        };
        let dt = self.timer.tick();
        let _ = frame_loop.render_frame(dt);
        let device = frame_loop.context().gfx.device();
        match presenter.present(device, frame_loop.display_texture()) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => {
                device.render_context().reconfigure();
            }
            Err(e) => log::error!("present failed: {e}"),
        }
    }

    fn key_pressed(&mut self, event_loop: &ActiveEventLoop, code: KeyCode) {
        if code == KeyCode::Escape {
            event_loop.exit();
            return;
        }
        let Some(frame_loop) = &mut self.frame_loop else {
            return;
        };
        let playing = frame_loop.time().state()
            == crate::transport::PlaybackState::Playing;
        let Some(line) = key_command(code, playing) else {
            return;
        };
        match frame_loop.execute(line) {
            Ok(Some(reply)) => log::info!("{reply}"),
            Ok(None) => log::debug!("{line}"),
            Err(e) => log::warn!("{e}"),
        }
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let attrs = window_attributes(&self.viewer.title, &self.viewer.options);
        let window = match event_loop.create_window(attrs) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };
        if let Err(e) = self.init(&window) {
            log::error!("failed to initialize graphics: {e}");
            event_loop.exit();
            return;
        }
        window.request_redraw();
        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => self.resize(size),
            WindowEvent::RedrawRequested => {
                self.redraw();
                if let Some(w) = &self.window {
                    w.request_redraw();
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed || event.repeat {
                    return;
                }
                if let PhysicalKey::Code(code) = event.physical_key {
                    self.key_pressed(event_loop, code);
                }
            }
            _ => (),
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(frame_loop) = &mut self.frame_loop {
            frame_loop.shutdown();
        }
    }
}
