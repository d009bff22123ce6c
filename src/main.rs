use clap::Parser;
use vistex::cli::Args;
use vistex::frame_loop::FrameLoop;
use vistex::gpu::context::GraphicsContext;
use vistex::gpu::device::Viewport;
use vistex::gpu::headless::HeadlessDevice;
use vistex::options::Options;
use vistex::texture::TextureContext;
use vistex::viewer::Viewer;

const HEADLESS_FRAME_TIME: f32 = 1.0 / 60.0;

fn run_headless(options: &Options, args: &Args, frames: u32) {
    let gfx = GraphicsContext::new(
        HeadlessDevice::new().without_call_log(),
        Viewport::sized(options.window.width, options.window.height),
    );
    let ctx = TextureContext::with_image_decoder(gfx);
    let mut frame_loop = FrameLoop::new(ctx, options, args.images.as_slice());
    for _ in 0..frames {
        let report = frame_loop.render_frame(HEADLESS_FRAME_TIME);
        log::debug!(
            "frame {}: vtime {:.3}, {} images bound, captured {}",
            frame_loop.frames(),
            report.vtime,
            report.bound_images,
            report.captured
        );
    }
    log::info!(
        "{} frames, vtime {:.3}, {} cached images",
        frame_loop.frames(),
        frame_loop.time().vtime(),
        frame_loop.context().cache.len()
    );
    frame_loop.shutdown();
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let mut options = match &args.config {
        Some(path) => match Options::load(path) {
            Ok(options) => options,
            Err(e) => {
                log::error!("cannot read {}: {e}", path.display());
                std::process::exit(1);
            }
        },
        None => Options::default(),
    };
    args.apply_to(&mut options);

    if let Some(frames) = args.headless {
        run_headless(&options, &args, frames);
        return;
    }

    let viewer = Viewer::builder()
        .with_images(args.images.iter().cloned())
        .with_options(options)
        .build();
    if let Err(e) = viewer.run() {
        log::error!("{e}");
        std::process::exit(1);
    }
}
