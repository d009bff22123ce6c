//! The graphics-API boundary.
//!
//! [`GraphicsDevice`] exposes a framebuffer-object shaped object model:
//! names are generated first, storage is attached later, and framebuffers
//! are assembled from texture or renderbuffer attachments. Every render
//! target recipe in [`crate::texture::render_target`] is written against
//! this trait, so the same code drives [`super::wgpu_device::WgpuDevice`]
//! and the CPU-side [`super::headless::HeadlessDevice`].

use std::fmt;
use std::num::NonZeroU32;

use crate::texture::pixels::MipLevel;

/// Name of a GPU image object. Unallocated is expressed as `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(NonZeroU32);

/// Name of a GPU renderbuffer (attachment-only storage).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderbufferId(NonZeroU32);

/// Name of a framebuffer object. `0` is the window's default target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FramebufferId(u32);

impl TextureId {
    /// Raw numeric name.
    #[must_use]
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl RenderbufferId {
    /// Raw numeric name.
    #[must_use]
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl FramebufferId {
    /// The default (window) render target.
    pub const DEFAULT: Self = Self(0);

    /// Raw numeric name.
    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }

    /// Whether this names the window's default target.
    #[must_use]
    pub fn is_default(self) -> bool {
        self.0 == 0
    }
}

impl Default for FramebufferId {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Monotonic name generator shared by the device implementations.
///
/// Names are never reused, so a released id can't alias a later object.
#[derive(Debug, Default)]
pub(crate) struct IdAllocator {
    issued: u32,
}

impl IdAllocator {
    fn next(&mut self) -> NonZeroU32 {
        let id = NonZeroU32::MIN.saturating_add(self.issued);
        self.issued = self.issued.saturating_add(1);
        id
    }

    pub(crate) fn texture(&mut self) -> TextureId {
        TextureId(self.next())
    }

    pub(crate) fn renderbuffer(&mut self) -> RenderbufferId {
        RenderbufferId(self.next())
    }

    pub(crate) fn framebuffer(&mut self) -> FramebufferId {
        FramebufferId(self.next().get())
    }
}

/// Any object a render target may own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuObject {
    /// Sampled image.
    Texture(TextureId),
    /// Attachment-only storage.
    Renderbuffer(RenderbufferId),
    /// Framebuffer object.
    Framebuffer(FramebufferId),
}

/// 1D or 2D texture target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dimensionality {
    /// One row of texels.
    D1,
    /// Regular 2D image.
    #[default]
    D2,
}

impl Dimensionality {
    /// Slot index used for per-target state tables.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::D1 => 0,
            Self::D2 => 1,
        }
    }
}

/// Storage format of a texture or renderbuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TexelFormat {
    /// 8-bit RGB.
    Rgb8,
    /// 8-bit RGBA.
    Rgba8,
    /// 16-bit float RGB.
    Rgb16F,
    /// 16-bit float RGBA.
    Rgba16F,
    /// 24-bit depth.
    Depth24,
}

impl TexelFormat {
    /// Color storage for the given channel policy.
    #[must_use]
    pub fn color(float_texture: bool, alpha: bool) -> Self {
        match (float_texture, alpha) {
            (true, true) => Self::Rgba16F,
            (true, false) => Self::Rgb16F,
            (false, true) => Self::Rgba8,
            (false, false) => Self::Rgb8,
        }
    }

    /// Whether this is a depth format.
    #[must_use]
    pub fn is_depth(self) -> bool {
        matches!(self, Self::Depth24)
    }

    /// Whether channels are stored as half floats.
    #[must_use]
    pub fn is_float(self) -> bool {
        matches!(self, Self::Rgb16F | Self::Rgba16F)
    }
}

/// Texel filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    /// Point sampling.
    Nearest,
    /// Bilinear sampling within one level.
    Linear,
    /// Trilinear sampling across mip levels.
    LinearMipmapLinear,
}

/// Texture coordinate wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WrapMode {
    /// Tile.
    Repeat,
    /// Clamp to the border texel.
    ClampToEdge,
}

/// Sampling parameters attached to a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerParams {
    /// Minification filter.
    pub min_filter: FilterMode,
    /// Magnification filter.
    pub mag_filter: FilterMode,
    /// Wrapping on both axes.
    pub wrap: WrapMode,
    /// Anisotropy clamp (1 = off).
    pub max_anisotropy: u16,
}

impl SamplerParams {
    /// Point-sampled, repeating. Render target color/depth attachments.
    pub const NEAREST_REPEAT: Self = Self {
        min_filter: FilterMode::Nearest,
        mag_filter: FilterMode::Nearest,
        wrap: WrapMode::Repeat,
        max_anisotropy: 1,
    };

    /// Bilinear, repeating, single level.
    pub const LINEAR_REPEAT: Self = Self {
        min_filter: FilterMode::Linear,
        mag_filter: FilterMode::Linear,
        wrap: WrapMode::Repeat,
        max_anisotropy: 1,
    };

    /// Trilinear with the maximum anisotropy the device clamps to.
    pub const MIPMAPPED: Self = Self {
        min_filter: FilterMode::LinearMipmapLinear,
        mag_filter: FilterMode::Linear,
        wrap: WrapMode::Repeat,
        max_anisotropy: 16,
    };
}

/// Storage request for a texture allocated without initial data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    /// Texture target.
    pub dimensionality: Dimensionality,
    /// Width in texels.
    pub width: u32,
    /// Height in texels (1 for 1D).
    pub height: u32,
    /// Storage format.
    pub format: TexelFormat,
    /// Sampling parameters.
    pub sampler: SamplerParams,
}

/// Pixel upload: storage plus every mip level's contents.
#[derive(Debug, Clone, Copy)]
pub struct TextureUpload<'a> {
    /// Texture target.
    pub dimensionality: Dimensionality,
    /// Storage format.
    pub format: TexelFormat,
    /// Level 0 first.
    pub levels: &'a [MipLevel],
    /// Sampling parameters.
    pub sampler: SamplerParams,
}

/// Framebuffer attachment slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentPoint {
    /// First color attachment.
    Color0,
    /// Depth attachment.
    Depth,
}

/// What gets attached to a framebuffer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attachment {
    /// A texture, level 0.
    Texture(TextureId),
    /// A renderbuffer.
    Renderbuffer(RenderbufferId),
}

/// Result of a framebuffer completeness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramebufferStatus {
    /// Usable as a render target.
    Complete,
    /// No attachments at all.
    MissingAttachment,
    /// An attachment names an object without storage.
    IncompleteAttachment,
    /// Attachments disagree on size.
    IncompleteDimensions,
    /// Attachments disagree on sample count.
    IncompleteMultisample,
    /// The framebuffer name is unknown or the combination is unsupported.
    Unsupported,
}

impl FramebufferStatus {
    /// Whether the framebuffer can be rendered into.
    #[must_use]
    pub fn is_complete(self) -> bool {
        self == Self::Complete
    }
}

impl fmt::Display for FramebufferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Complete => "complete",
            Self::MissingAttachment => "missing attachment",
            Self::IncompleteAttachment => "incomplete attachment",
            Self::IncompleteDimensions => "attachment sizes differ",
            Self::IncompleteMultisample => "attachment sample counts differ",
            Self::Unsupported => "unsupported",
        };
        f.write_str(text)
    }
}

/// Optional device features that gate render-target functionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Off-screen framebuffer objects.
    FramebufferObject,
    /// Framebuffer-to-framebuffer blits.
    FramebufferBlit,
    /// Multisampled renderbuffer storage.
    FramebufferMultisample,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::FramebufferObject => "framebuffer objects",
            Self::FramebufferBlit => "framebuffer blit",
            Self::FramebufferMultisample => "framebuffer multisample",
        };
        f.write_str(text)
    }
}

/// Capability flags reported by a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capabilities {
    /// Off-screen framebuffer objects are available.
    pub framebuffer_objects: bool,
    /// Framebuffer blits are available.
    pub framebuffer_blit: bool,
    /// Multisampled renderbuffers are available.
    pub multisample: bool,
}

impl Capabilities {
    /// Every feature present.
    pub const ALL: Self = Self {
        framebuffer_objects: true,
        framebuffer_blit: true,
        multisample: true,
    };

    /// Render targets need both framebuffer objects and blits.
    #[must_use]
    pub fn supports_render_targets(self) -> bool {
        self.framebuffer_objects && self.framebuffer_blit
    }

    /// First missing render-target capability, if any.
    #[must_use]
    pub fn missing_render_target_capability(self) -> Option<Capability> {
        if !self.framebuffer_objects {
            Some(Capability::FramebufferObject)
        } else if !self.framebuffer_blit {
            Some(Capability::FramebufferBlit)
        } else {
            None
        }
    }
}

/// Viewport rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Viewport {
    /// Left edge.
    pub x: i32,
    /// Bottom edge.
    pub y: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Viewport {
    /// Viewport anchored at the origin.
    #[must_use]
    pub fn sized(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

/// Graphics API operations the texture manager issues.
///
/// All calls come from the thread that owns the graphics context. Object
/// names are handed out by `gen_*` and carry no storage until the matching
/// storage call.
pub trait GraphicsDevice {
    /// Feature flags for this device.
    fn capabilities(&self) -> Capabilities;

    /// Reserve a texture name.
    fn gen_texture(&mut self) -> TextureId;
    /// Allocate storage with undefined contents.
    fn texture_storage(&mut self, id: TextureId, desc: &TextureDesc);
    /// Allocate storage and fill every supplied mip level.
    fn texture_upload(&mut self, id: TextureId, upload: &TextureUpload<'_>);
    /// Release a texture name and its storage.
    fn delete_texture(&mut self, id: TextureId);

    /// Reserve a renderbuffer name.
    fn gen_renderbuffer(&mut self) -> RenderbufferId;
    /// Allocate renderbuffer storage. `samples` of 1 means single-sampled.
    fn renderbuffer_storage(
        &mut self,
        id: RenderbufferId,
        format: TexelFormat,
        width: u32,
        height: u32,
        samples: u32,
    );
    /// Release a renderbuffer.
    fn delete_renderbuffer(&mut self, id: RenderbufferId);

    /// Reserve a framebuffer name.
    fn gen_framebuffer(&mut self) -> FramebufferId;
    /// Attach an image to a framebuffer slot.
    fn framebuffer_attach(
        &mut self,
        framebuffer: FramebufferId,
        point: AttachmentPoint,
        attachment: Attachment,
    );
    /// Completeness check.
    fn framebuffer_status(&self, framebuffer: FramebufferId)
        -> FramebufferStatus;
    /// Release a framebuffer (attachments are not released).
    fn delete_framebuffer(&mut self, framebuffer: FramebufferId);

    /// Direct subsequent drawing into `framebuffer`.
    fn bind_framebuffer(&mut self, framebuffer: FramebufferId);
    /// Copy (and resolve, if multisampled) the color of `src` into `dst`.
    fn blit_framebuffer(
        &mut self,
        src: FramebufferId,
        dst: FramebufferId,
        width: u32,
        height: u32,
    );
    /// Clear the bound framebuffer's color (and depth, if attached).
    fn clear(&mut self, color: [f32; 4]);

    /// Bind a texture to a target; `None` unbinds.
    fn bind_texture(&mut self, target: Dimensionality, id: Option<TextureId>);
    /// Set the drawing viewport.
    fn set_viewport(&mut self, viewport: Viewport);
}
