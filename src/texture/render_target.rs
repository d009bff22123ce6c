//! Render-target variants: allocation recipes and release plans.
//!
//! | kind | color | depth | framebuffers |
//! |---|---|---|---|
//! | `ColorOnly` | texture | none | 1 |
//! | `ColorAndDepth` | texture | texture, owned or borrowed | 1 |
//! | `FeedbackMultisampleBlit` | renderbuffer | renderbuffer | 2 (draw + resolve) |
//!
//! What a target releases on teardown is a pure function of its kind and
//! whether it owns its depth buffer; see [`RenderTargetState::release_plan`].

use serde::{Deserialize, Serialize};

use crate::error::TextureError;
use crate::gpu::context::GraphicsContext;
use crate::gpu::device::{
    Attachment, AttachmentPoint, Dimensionality, FramebufferId,
    FramebufferStatus, GpuObject, GraphicsDevice, RenderbufferId,
    SamplerParams, TexelFormat, TextureDesc, TextureId,
};

/// Sample count used when multisampling is requested and supported.
pub const MULTISAMPLE_COUNT: u32 = 4;

/// Which render-target variant a texture was configured as.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BufferKind {
    /// Not a render target.
    #[default]
    None,
    /// Multisampled renderbuffers resolved into a texture on capture end.
    FeedbackMultisampleBlit,
    /// Single color texture.
    ColorOnly,
    /// Color texture plus depth texture.
    ColorAndDepth,
}

/// Configuration for a render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderTargetOptions {
    /// 16-bit float channels instead of 8-bit.
    pub float_texture: bool,
    /// Four channels instead of three.
    pub alpha: bool,
    /// Request multisampling (feedback kind only).
    pub multisample: bool,
    /// Depth texture owned by someone else, for targets sharing depth.
    /// Only read by [`BufferKind::ColorAndDepth`].
    pub existing_depth: Option<TextureId>,
}

/// Color storage of a render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorBuffer {
    /// Sampled texture.
    Texture(TextureId),
    /// Attachment-only renderbuffer.
    Renderbuffer(RenderbufferId),
}

/// Depth storage of a render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthBuffer {
    /// Depth texture.
    Texture(TextureId),
    /// Depth renderbuffer.
    Renderbuffer(RenderbufferId),
}

impl From<ColorBuffer> for GpuObject {
    fn from(buffer: ColorBuffer) -> Self {
        match buffer {
            ColorBuffer::Texture(id) => Self::Texture(id),
            ColorBuffer::Renderbuffer(id) => Self::Renderbuffer(id),
        }
    }
}

impl From<DepthBuffer> for GpuObject {
    fn from(buffer: DepthBuffer) -> Self {
        match buffer {
            DepthBuffer::Texture(id) => Self::Texture(id),
            DepthBuffer::Renderbuffer(id) => Self::Renderbuffer(id),
        }
    }
}

/// GPU objects making up one configured render target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTargetState {
    /// Variant this target was configured as.
    pub kind: BufferKind,
    /// Color storage.
    pub color: ColorBuffer,
    /// Depth storage, if the kind has one.
    pub depth: Option<DepthBuffer>,
    /// `false` when `depth` was supplied by the caller and must not be
    /// released here.
    pub depth_owned: bool,
    /// Framebuffer drawn into while capturing.
    pub framebuffer: FramebufferId,
    /// Resolve framebuffer holding `resolve_texture` (feedback kind).
    pub resolve_framebuffer: Option<FramebufferId>,
    /// Single-sample texture the feedback kind resolves into.
    pub resolve_texture: Option<TextureId>,
    /// Samples per pixel of the color storage.
    pub samples: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Context generation the objects were created in.
    pub generation: u64,
}

impl RenderTargetState {
    /// The texture consumers sample from.
    #[must_use]
    pub fn sampled_texture(&self) -> Option<TextureId> {
        match (self.kind, self.color) {
            (BufferKind::FeedbackMultisampleBlit, _) => self.resolve_texture,
            (_, ColorBuffer::Texture(id)) => Some(id),
            (_, ColorBuffer::Renderbuffer(_)) => None,
        }
    }

    /// Depth texture, for sharing with other color-and-depth targets.
    #[must_use]
    pub fn depth_texture(&self) -> Option<TextureId> {
        match self.depth {
            Some(DepthBuffer::Texture(id)) => Some(id),
            _ => None,
        }
    }

    /// Objects this target owns, in release order.
    #[must_use]
    pub fn release_plan(&self) -> Vec<GpuObject> {
        let mut plan = vec![GpuObject::from(self.color)];
        match self.kind {
            BufferKind::FeedbackMultisampleBlit => {
                plan.extend(self.depth.map(GpuObject::from));
                plan.extend(self.resolve_texture.map(GpuObject::Texture));
                plan.push(GpuObject::Framebuffer(self.framebuffer));
                plan.extend(
                    self.resolve_framebuffer.map(GpuObject::Framebuffer),
                );
            }
            BufferKind::ColorAndDepth => {
                if self.depth_owned {
                    plan.extend(self.depth.map(GpuObject::from));
                }
                plan.push(GpuObject::Framebuffer(self.framebuffer));
            }
            BufferKind::ColorOnly | BufferKind::None => {
                plan.push(GpuObject::Framebuffer(self.framebuffer));
            }
        }
        plan
    }

    fn owns_framebuffer(&self, framebuffer: FramebufferId) -> bool {
        self.framebuffer == framebuffer
            || self.resolve_framebuffer == Some(framebuffer)
    }
}

/// Allocate the objects for `kind` at `width` x `height`.
///
/// The previously bound framebuffer is bound again before returning. On an
/// incomplete framebuffer everything allocated so far is released.
///
/// # Errors
///
/// [`TextureError::AllocationIncomplete`] when the completeness check fails,
/// [`TextureError::StateMisuse`] for [`BufferKind::None`].
pub fn allocate<D: GraphicsDevice>(
    gfx: &mut GraphicsContext<D>,
    kind: BufferKind,
    width: u32,
    height: u32,
    options: &RenderTargetOptions,
) -> Result<RenderTargetState, TextureError> {
    let previous = gfx.framebuffer_bind_get();
    let state = match kind {
        BufferKind::None => {
            return Err(TextureError::StateMisuse(
                "BufferKind::None is not a render target",
            ))
        }
        BufferKind::ColorOnly => {
            allocate_color(gfx, width, height, options, false)
        }
        BufferKind::ColorAndDepth => {
            allocate_color(gfx, width, height, options, true)
        }
        BufferKind::FeedbackMultisampleBlit => {
            allocate_feedback(gfx, width, height, options)
        }
    };

    let status = completeness(gfx, &state);
    gfx.framebuffer_bind(previous);

    if status.is_complete() {
        log::debug!(
            "allocated {kind:?} render target {width}x{height} ({} samples)",
            state.samples
        );
        Ok(state)
    } else {
        log::warn!("{kind:?} render target {width}x{height} incomplete: {status}");
        release(gfx, &state);
        Err(TextureError::AllocationIncomplete(status))
    }
}

fn completeness<D: GraphicsDevice>(
    gfx: &GraphicsContext<D>,
    state: &RenderTargetState,
) -> FramebufferStatus {
    let device = gfx.device();
    let status = device.framebuffer_status(state.framebuffer);
    match state.resolve_framebuffer {
        Some(resolve) if status.is_complete() => {
            device.framebuffer_status(resolve)
        }
        _ => status,
    }
}

fn color_texture_desc(
    width: u32,
    height: u32,
    format: TexelFormat,
    sampler: SamplerParams,
) -> TextureDesc {
    TextureDesc {
        dimensionality: Dimensionality::D2,
        width,
        height,
        format,
        sampler,
    }
}

fn allocate_color<D: GraphicsDevice>(
    gfx: &mut GraphicsContext<D>,
    width: u32,
    height: u32,
    options: &RenderTargetOptions,
    with_depth: bool,
) -> RenderTargetState {
    let format = TexelFormat::color(options.float_texture, options.alpha);
    let generation = gfx.generation();
    let device = gfx.device_mut();

    let color = device.gen_texture();
    device.texture_storage(
        color,
        &color_texture_desc(width, height, format, SamplerParams::NEAREST_REPEAT),
    );

    let (depth, depth_owned) = match (with_depth, options.existing_depth) {
        (false, _) => (None, true),
        (true, Some(existing)) => (Some(DepthBuffer::Texture(existing)), false),
        (true, None) => {
            let id = device.gen_texture();
            device.texture_storage(
                id,
                &color_texture_desc(
                    width,
                    height,
                    TexelFormat::Depth24,
                    SamplerParams::NEAREST_REPEAT,
                ),
            );
            (Some(DepthBuffer::Texture(id)), true)
        }
    };

    let framebuffer = device.gen_framebuffer();
    gfx.framebuffer_bind(framebuffer);
    let device = gfx.device_mut();
    device.framebuffer_attach(
        framebuffer,
        AttachmentPoint::Color0,
        Attachment::Texture(color),
    );
    if let Some(DepthBuffer::Texture(id)) = depth {
        device.framebuffer_attach(
            framebuffer,
            AttachmentPoint::Depth,
            Attachment::Texture(id),
        );
    }

    RenderTargetState {
        kind: if with_depth {
            BufferKind::ColorAndDepth
        } else {
            BufferKind::ColorOnly
        },
        color: ColorBuffer::Texture(color),
        depth,
        depth_owned,
        framebuffer,
        resolve_framebuffer: None,
        resolve_texture: None,
        samples: 1,
        width,
        height,
        generation,
    }
}

fn allocate_feedback<D: GraphicsDevice>(
    gfx: &mut GraphicsContext<D>,
    width: u32,
    height: u32,
    options: &RenderTargetOptions,
) -> RenderTargetState {
    let samples = if options.multisample && gfx.capabilities().multisample {
        MULTISAMPLE_COUNT
    } else {
        if options.multisample {
            log::debug!("multisample unsupported, using single-sampled storage");
        }
        1
    };
    let format = TexelFormat::color(options.float_texture, options.alpha);
    let generation = gfx.generation();
    let device = gfx.device_mut();

    let color = device.gen_renderbuffer();
    device.renderbuffer_storage(color, format, width, height, samples);
    let depth = device.gen_renderbuffer();
    device.renderbuffer_storage(depth, TexelFormat::Depth24, width, height, samples);

    let framebuffer = device.gen_framebuffer();
    gfx.framebuffer_bind(framebuffer);
    let device = gfx.device_mut();
    device.framebuffer_attach(
        framebuffer,
        AttachmentPoint::Color0,
        Attachment::Renderbuffer(color),
    );
    device.framebuffer_attach(
        framebuffer,
        AttachmentPoint::Depth,
        Attachment::Renderbuffer(depth),
    );

    // the resolve texture always carries alpha
    let resolve_format = TexelFormat::color(options.float_texture, true);
    let resolve_texture = device.gen_texture();
    device.texture_storage(
        resolve_texture,
        &color_texture_desc(width, height, resolve_format, SamplerParams::LINEAR_REPEAT),
    );

    let resolve_framebuffer = device.gen_framebuffer();
    gfx.framebuffer_bind(resolve_framebuffer);
    gfx.device_mut().framebuffer_attach(
        resolve_framebuffer,
        AttachmentPoint::Color0,
        Attachment::Texture(resolve_texture),
    );

    RenderTargetState {
        kind: BufferKind::FeedbackMultisampleBlit,
        color: ColorBuffer::Renderbuffer(color),
        depth: Some(DepthBuffer::Renderbuffer(depth)),
        depth_owned: true,
        framebuffer,
        resolve_framebuffer: Some(resolve_framebuffer),
        resolve_texture: Some(resolve_texture),
        samples,
        width,
        height,
        generation,
    }
}

/// Release every object `state` owns.
///
/// If one of its framebuffers is currently bound, the default target is
/// bound first. Objects from a lost context generation are dropped without
/// device calls.
pub fn release<D: GraphicsDevice>(
    gfx: &mut GraphicsContext<D>,
    state: &RenderTargetState,
) {
    if state.generation != gfx.generation() {
        log::warn!(
            "{:?} render target belongs to lost context generation {}, \
             dropping its names",
            state.kind,
            state.generation
        );
        return;
    }
    if state.owns_framebuffer(gfx.framebuffer_bind_get()) {
        gfx.framebuffer_bind(FramebufferId::DEFAULT);
    }
    let device = gfx.device_mut();
    for object in state.release_plan() {
        match object {
            GpuObject::Texture(id) => device.delete_texture(id),
            GpuObject::Renderbuffer(id) => device.delete_renderbuffer(id),
            GpuObject::Framebuffer(id) => device.delete_framebuffer(id),
        }
    }
    log::debug!(
        "released {:?} render target {}x{}",
        state.kind,
        state.width,
        state.height
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::device::{Capabilities, Viewport};
    use crate::gpu::headless::HeadlessDevice;

    fn context() -> GraphicsContext<HeadlessDevice> {
        GraphicsContext::new(HeadlessDevice::new(), Viewport::sized(32, 32))
    }

    fn opts() -> RenderTargetOptions {
        RenderTargetOptions {
            alpha: true,
            multisample: true,
            ..Default::default()
        }
    }

    #[test]
    fn color_only_recipe() {
        let mut gfx = context();
        let state =
            allocate(&mut gfx, BufferKind::ColorOnly, 16, 8, &opts()).unwrap();
        assert!(matches!(state.color, ColorBuffer::Texture(_)));
        assert_eq!(state.depth, None);
        assert_eq!(state.resolve_framebuffer, None);
        assert_eq!(gfx.device().live_objects(), 2);
        assert_eq!(state.release_plan().len(), 2);
    }

    #[test]
    fn feedback_recipe_uses_two_framebuffers() {
        let mut gfx = context();
        let state = allocate(
            &mut gfx,
            BufferKind::FeedbackMultisampleBlit,
            16,
            16,
            &opts(),
        )
        .unwrap();
        assert_eq!(state.samples, MULTISAMPLE_COUNT);
        assert!(state.resolve_framebuffer.is_some());
        assert_eq!(state.sampled_texture(), state.resolve_texture);
        // color rb, depth rb, resolve texture, 2 framebuffers
        assert_eq!(gfx.device().live_objects(), 5);
        assert_eq!(state.release_plan().len(), 5);
    }

    #[test]
    fn multisample_falls_back_silently() {
        let mut device = HeadlessDevice::new();
        device.set_capabilities(Capabilities {
            multisample: false,
            ..Capabilities::ALL
        });
        let mut gfx = GraphicsContext::new(device, Viewport::sized(8, 8));
        let state = allocate(
            &mut gfx,
            BufferKind::FeedbackMultisampleBlit,
            8,
            8,
            &opts(),
        )
        .unwrap();
        assert_eq!(state.samples, 1);
    }

    #[test]
    fn float_policy_selects_half_float_storage() {
        let mut gfx = context();
        let options = RenderTargetOptions {
            float_texture: true,
            alpha: false,
            ..Default::default()
        };
        let state =
            allocate(&mut gfx, BufferKind::ColorOnly, 4, 4, &options).unwrap();
        let ColorBuffer::Texture(id) = state.color else {
            panic!("texture color expected");
        };
        let desc = gfx.device().texture(id).unwrap().desc.unwrap();
        assert_eq!(desc.format, TexelFormat::Rgb16F);
    }

    #[test]
    fn allocation_restores_previous_binding() {
        let mut gfx = context();
        let outer =
            allocate(&mut gfx, BufferKind::ColorOnly, 4, 4, &opts()).unwrap();
        gfx.framebuffer_bind(outer.framebuffer);
        let _inner = allocate(
            &mut gfx,
            BufferKind::FeedbackMultisampleBlit,
            4,
            4,
            &opts(),
        )
        .unwrap();
        assert_eq!(gfx.framebuffer_bind_get(), outer.framebuffer);
        assert_eq!(gfx.device().bound_framebuffer(), outer.framebuffer);
    }

    #[test]
    fn incomplete_allocation_releases_everything() {
        let mut gfx = context();
        gfx.device_mut().fail_framebuffer_completeness(true);
        let err = allocate(&mut gfx, BufferKind::ColorAndDepth, 4, 4, &opts())
            .unwrap_err();
        assert!(matches!(err, TextureError::AllocationIncomplete(_)));
        assert_eq!(gfx.device().live_objects(), 0);
        assert_eq!(gfx.device().invalid_deletes(), 0);
    }

    #[test]
    fn borrowed_depth_is_not_in_release_plan() {
        let mut gfx = context();
        let shared = gfx.device_mut().gen_texture();
        gfx.device_mut().texture_storage(
            shared,
            &color_texture_desc(4, 4, TexelFormat::Depth24, SamplerParams::NEAREST_REPEAT),
        );
        let options = RenderTargetOptions {
            existing_depth: Some(shared),
            ..opts()
        };
        let state =
            allocate(&mut gfx, BufferKind::ColorAndDepth, 4, 4, &options).unwrap();
        assert!(!state.depth_owned);
        assert_eq!(state.depth_texture(), Some(shared));
        assert!(!state.release_plan().contains(&GpuObject::Texture(shared)));

        release(&mut gfx, &state);
        assert!(gfx.device().is_texture_live(shared));
    }

    #[test]
    fn release_unbinds_own_framebuffer_first() {
        let mut gfx = context();
        let state =
            allocate(&mut gfx, BufferKind::ColorAndDepth, 4, 4, &opts()).unwrap();
        gfx.framebuffer_bind(state.framebuffer);
        release(&mut gfx, &state);
        assert!(gfx.framebuffer_bind_get().is_default());
        assert_eq!(gfx.device().live_objects(), 0);
    }

    #[test]
    fn release_after_context_loss_skips_device() {
        let mut gfx = context();
        let state =
            allocate(&mut gfx, BufferKind::ColorOnly, 4, 4, &opts()).unwrap();
        gfx.context_lost();
        release(&mut gfx, &state);
        assert_eq!(gfx.device().live_objects(), 2);
    }
}
