//! [`GraphicsDevice`] over wgpu.
//!
//! Names map to wgpu objects kept in hash maps. Renderbuffers are
//! attachment-only textures (optionally multisampled); a framebuffer is just
//! its pair of attachments, turned into a render pass when cleared or
//! blitted. 1D textures are stored as 2D textures one texel high so they can
//! carry mip chains.

use half::f16;
use rustc_hash::FxHashMap;

use super::device::{
    Attachment, AttachmentPoint, Capabilities, Dimensionality, FilterMode,
    FramebufferId, FramebufferStatus, GraphicsDevice, IdAllocator,
    RenderbufferId, SamplerParams, TexelFormat, TextureDesc, TextureId,
    TextureUpload, Viewport, WrapMode,
};
use super::render_context::RenderContext;
use crate::texture::pixels::PixelBuffer;

/// One allocated wgpu texture and its default view.
struct GpuImage {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    format: TexelFormat,
    width: u32,
    height: u32,
    samples: u32,
}

#[derive(Default)]
struct TextureSlot {
    image: Option<GpuImage>,
    sampler: Option<wgpu::Sampler>,
}

#[derive(Default, Clone, Copy)]
struct FramebufferSlot {
    color: Option<Attachment>,
    depth: Option<Attachment>,
}

/// wgpu-backed graphics device.
pub struct WgpuDevice {
    context: RenderContext,
    ids: IdAllocator,
    textures: FxHashMap<TextureId, TextureSlot>,
    renderbuffers: FxHashMap<RenderbufferId, Option<GpuImage>>,
    framebuffers: FxHashMap<FramebufferId, FramebufferSlot>,
    bound_framebuffer: FramebufferId,
    bound_textures: [Option<TextureId>; 2],
    viewport: Viewport,
}

impl std::fmt::Debug for WgpuDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuDevice")
            .field("textures", &self.textures.len())
            .field("renderbuffers", &self.renderbuffers.len())
            .field("framebuffers", &self.framebuffers.len())
            .field("bound_framebuffer", &self.bound_framebuffer)
            .field("viewport", &self.viewport)
            .finish_non_exhaustive()
    }
}

fn wgpu_format(format: TexelFormat) -> wgpu::TextureFormat {
    match format {
        TexelFormat::Rgb8 | TexelFormat::Rgba8 => {
            wgpu::TextureFormat::Rgba8Unorm
        }
        TexelFormat::Rgb16F | TexelFormat::Rgba16F => {
            wgpu::TextureFormat::Rgba16Float
        }
        TexelFormat::Depth24 => wgpu::TextureFormat::Depth24Plus,
    }
}

fn wgpu_filter(filter: FilterMode) -> wgpu::FilterMode {
    match filter {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear | FilterMode::LinearMipmapLinear => {
            wgpu::FilterMode::Linear
        }
    }
}

fn wgpu_address(wrap: WrapMode) -> wgpu::AddressMode {
    match wrap {
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
        WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
    }
}

/// Channel values the source carries per texel for `format`.
fn source_components(format: TexelFormat) -> usize {
    match format {
        TexelFormat::Rgb8 | TexelFormat::Rgb16F => 3,
        _ => 4,
    }
}

/// Repack pixels into the byte layout of `wgpu_format(format)`: always
/// four channels, 8-bit unorm or 16-bit float.
fn texel_bytes(pixels: &PixelBuffer, format: TexelFormat) -> Vec<u8> {
    let components = source_components(format);
    let rgba = |chunk: &[f32], alpha: f32| -> [f32; 4] {
        [
            chunk[0],
            chunk[1],
            chunk[2],
            if components == 4 { chunk[3] } else { alpha },
        ]
    };
    match (pixels, format.is_float()) {
        (PixelBuffer::Bytes(data), false) => {
            if components == 4 {
                data.clone()
            } else {
                data.chunks_exact(3)
                    .flat_map(|c| [c[0], c[1], c[2], u8::MAX])
                    .collect()
            }
        }
        (PixelBuffer::Bytes(data), true) => {
            let halves: Vec<f16> = data
                .chunks_exact(components)
                .flat_map(|c| {
                    let c: Vec<f32> =
                        c.iter().map(|&v| f32::from(v) / 255.0).collect();
                    rgba(&c, 1.0)
                })
                .map(f16::from_f32)
                .collect();
            bytemuck::cast_slice(&halves).to_vec()
        }
        (PixelBuffer::Floats(data), true) => {
            let halves: Vec<f16> = data
                .chunks_exact(components)
                .flat_map(|c| rgba(c, 1.0))
                .map(f16::from_f32)
                .collect();
            bytemuck::cast_slice(&halves).to_vec()
        }
        (PixelBuffer::Floats(data), false) => data
            .chunks_exact(components)
            .flat_map(|c| rgba(c, 1.0))
            .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect(),
    }
}

impl WgpuDevice {
    /// Wrap an initialized render context.
    #[must_use]
    pub fn new(context: RenderContext) -> Self {
        let viewport = Viewport::sized(context.config.width, context.config.height);
        Self {
            context,
            ids: IdAllocator::default(),
            textures: FxHashMap::default(),
            renderbuffers: FxHashMap::default(),
            framebuffers: FxHashMap::default(),
            bound_framebuffer: FramebufferId::DEFAULT,
            bound_textures: [None; 2],
            viewport,
        }
    }

    /// The wrapped render context, for presentation.
    #[must_use]
    pub fn render_context(&self) -> &RenderContext {
        &self.context
    }

    /// Mutable render context, for surface resizes.
    pub fn render_context_mut(&mut self) -> &mut RenderContext {
        &mut self.context
    }

    /// Sampling view of a texture with storage.
    #[must_use]
    pub fn texture_view(&self, id: TextureId) -> Option<&wgpu::TextureView> {
        self.textures
            .get(&id)
            .and_then(|slot| slot.image.as_ref())
            .map(|image| &image.view)
    }

    /// Sampler of a texture with storage.
    #[must_use]
    pub fn sampler(&self, id: TextureId) -> Option<&wgpu::Sampler> {
        self.textures.get(&id).and_then(|slot| slot.sampler.as_ref())
    }

    /// Texture last bound to `target`.
    #[must_use]
    pub fn bound_texture(&self, target: Dimensionality) -> Option<TextureId> {
        self.bound_textures[target.index()]
    }

    fn create_image(
        &self,
        label: &str,
        format: TexelFormat,
        (width, height): (u32, u32),
        samples: u32,
        mip_levels: u32,
    ) -> GpuImage {
        let mut usage = wgpu::TextureUsages::RENDER_ATTACHMENT;
        if samples == 1 {
            usage |= wgpu::TextureUsages::TEXTURE_BINDING;
            if !format.is_depth() {
                usage |= wgpu::TextureUsages::COPY_SRC
                    | wgpu::TextureUsages::COPY_DST;
            }
        }
        let texture =
            self.context
                .device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some(label),
                    size: wgpu::Extent3d {
                        width,
                        height,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: mip_levels,
                    sample_count: samples,
                    dimension: wgpu::TextureDimension::D2,
                    format: wgpu_format(format),
                    usage,
                    view_formats: &[],
                });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        GpuImage {
            texture,
            view,
            format,
            width,
            height,
            samples,
        }
    }

    fn create_sampler(&self, params: SamplerParams) -> wgpu::Sampler {
        let mipmapped = params.min_filter == FilterMode::LinearMipmapLinear;
        let all_linear = params.mag_filter != FilterMode::Nearest
            && params.min_filter != FilterMode::Nearest
            && mipmapped;
        self.context.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Texture Sampler"),
            address_mode_u: wgpu_address(params.wrap),
            address_mode_v: wgpu_address(params.wrap),
            address_mode_w: wgpu_address(params.wrap),
            mag_filter: wgpu_filter(params.mag_filter),
            min_filter: wgpu_filter(params.min_filter),
            mipmap_filter: if mipmapped {
                wgpu::FilterMode::Linear
            } else {
                wgpu::FilterMode::Nearest
            },
            // anisotropy requires linear filtering on every axis
            anisotropy_clamp: if all_linear {
                params.max_anisotropy.clamp(1, 16)
            } else {
                1
            },
            ..Default::default()
        })
    }

    fn attachment_image(&self, attachment: Attachment) -> Option<&GpuImage> {
        match attachment {
            Attachment::Texture(id) => {
                self.textures.get(&id).and_then(|s| s.image.as_ref())
            }
            Attachment::Renderbuffer(id) => {
                self.renderbuffers.get(&id).and_then(Option::as_ref)
            }
        }
    }

    fn color_image(&self, framebuffer: FramebufferId) -> Option<&GpuImage> {
        self.framebuffers
            .get(&framebuffer)
            .and_then(|fb| fb.color)
            .and_then(|a| self.attachment_image(a))
    }
}

impl GraphicsDevice for WgpuDevice {
    fn capabilities(&self) -> Capabilities {
        // WebGPU guarantees render targets, copies and 4x MSAA
        Capabilities::ALL
    }

    fn gen_texture(&mut self) -> TextureId {
        let id = self.ids.texture();
        drop(self.textures.insert(id, TextureSlot::default()));
        id
    }

    fn texture_storage(&mut self, id: TextureId, desc: &TextureDesc) {
        if !self.textures.contains_key(&id) {
            log::error!("storage for unknown texture {}", id.get());
            return;
        }
        let height = match desc.dimensionality {
            Dimensionality::D1 => 1,
            Dimensionality::D2 => desc.height,
        };
        let image = self.create_image(
            "Render Target Texture",
            desc.format,
            (desc.width, height),
            1,
            1,
        );
        let sampler = self.create_sampler(desc.sampler);
        if let Some(slot) = self.textures.get_mut(&id) {
            slot.image = Some(image);
            slot.sampler = Some(sampler);
        }
    }

    fn texture_upload(&mut self, id: TextureId, upload: &TextureUpload<'_>) {
        let Some(base) = upload.levels.first() else {
            log::error!("upload without levels into texture {}", id.get());
            return;
        };
        if !self.textures.contains_key(&id) {
            log::error!("upload into unknown texture {}", id.get());
            return;
        }
        let levels = u32::try_from(upload.levels.len()).unwrap_or(1);
        let image = self.create_image(
            "Image Texture",
            upload.format,
            (base.width, base.height),
            1,
            levels,
        );
        let bytes_per_texel = if upload.format.is_float() { 8 } else { 4 };
        for (mip_level, level) in (0u32..).zip(upload.levels) {
            let data = texel_bytes(&level.pixels, upload.format);
            self.context.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &image.texture,
                    mip_level,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                &data,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(level.width * bytes_per_texel),
                    rows_per_image: Some(level.height),
                },
                wgpu::Extent3d {
                    width: level.width,
                    height: level.height,
                    depth_or_array_layers: 1,
                },
            );
        }
        let sampler = self.create_sampler(upload.sampler);
        if let Some(slot) = self.textures.get_mut(&id) {
            if let Some(old) = slot.image.replace(image) {
                old.texture.destroy();
            }
            slot.sampler = Some(sampler);
        }
    }

    fn delete_texture(&mut self, id: TextureId) {
        match self.textures.remove(&id) {
            Some(slot) => {
                if let Some(image) = slot.image {
                    image.texture.destroy();
                }
            }
            None => log::error!("delete of unknown texture {}", id.get()),
        }
    }

    fn gen_renderbuffer(&mut self) -> RenderbufferId {
        let id = self.ids.renderbuffer();
        drop(self.renderbuffers.insert(id, None));
        id
    }

    fn renderbuffer_storage(
        &mut self,
        id: RenderbufferId,
        format: TexelFormat,
        width: u32,
        height: u32,
        samples: u32,
    ) {
        if !self.renderbuffers.contains_key(&id) {
            log::error!("storage for unknown renderbuffer {}", id.get());
            return;
        }
        let image =
            self.create_image("Renderbuffer", format, (width, height), samples, 1);
        if let Some(slot) = self.renderbuffers.get_mut(&id) {
            if let Some(old) = slot.replace(image) {
                old.texture.destroy();
            }
        }
    }

    fn delete_renderbuffer(&mut self, id: RenderbufferId) {
        match self.renderbuffers.remove(&id) {
            Some(slot) => {
                if let Some(image) = slot {
                    image.texture.destroy();
                }
            }
            None => log::error!("delete of unknown renderbuffer {}", id.get()),
        }
    }

    fn gen_framebuffer(&mut self) -> FramebufferId {
        let id = self.ids.framebuffer();
        drop(self.framebuffers.insert(id, FramebufferSlot::default()));
        id
    }

    fn framebuffer_attach(
        &mut self,
        framebuffer: FramebufferId,
        point: AttachmentPoint,
        attachment: Attachment,
    ) {
        let Some(fb) = self.framebuffers.get_mut(&framebuffer) else {
            log::error!("attach to unknown framebuffer {}", framebuffer.get());
            return;
        };
        match point {
            AttachmentPoint::Color0 => fb.color = Some(attachment),
            AttachmentPoint::Depth => fb.depth = Some(attachment),
        }
    }

    fn framebuffer_status(&self, framebuffer: FramebufferId) -> FramebufferStatus {
        let Some(fb) = self.framebuffers.get(&framebuffer) else {
            return FramebufferStatus::Unsupported;
        };
        let attached: Vec<Attachment> =
            fb.color.into_iter().chain(fb.depth).collect();
        if attached.is_empty() {
            return FramebufferStatus::MissingAttachment;
        }
        let mut images = Vec::with_capacity(attached.len());
        for attachment in attached {
            match self.attachment_image(attachment) {
                Some(image) => images.push(image),
                None => return FramebufferStatus::IncompleteAttachment,
            }
        }
        let first = images[0];
        if images
            .iter()
            .any(|i| (i.width, i.height) != (first.width, first.height))
        {
            FramebufferStatus::IncompleteDimensions
        } else if images.iter().any(|i| i.samples != first.samples) {
            FramebufferStatus::IncompleteMultisample
        } else if fb
            .color
            .and_then(|a| self.attachment_image(a))
            .is_some_and(|i| i.format.is_depth())
        {
            FramebufferStatus::IncompleteAttachment
        } else {
            FramebufferStatus::Complete
        }
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        if self.framebuffers.remove(&framebuffer).is_none() {
            log::error!("delete of unknown framebuffer {}", framebuffer.get());
        }
    }

    fn bind_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.bound_framebuffer = framebuffer;
    }

    fn blit_framebuffer(
        &mut self,
        src: FramebufferId,
        dst: FramebufferId,
        width: u32,
        height: u32,
    ) {
        let (Some(from), Some(to)) = (self.color_image(src), self.color_image(dst))
        else {
            log::debug!(
                "blit {} -> {} skipped: missing color attachment",
                src.get(),
                dst.get()
            );
            return;
        };
        let mut encoder = self.context.create_encoder();
        if from.samples > 1 {
            let pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Multisample Resolve"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &from.view,
                    depth_slice: None,
                    resolve_target: Some(&to.view),
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            drop(pass);
        } else {
            encoder.copy_texture_to_texture(
                from.texture.as_image_copy(),
                to.texture.as_image_copy(),
                wgpu::Extent3d {
                    width: width.min(from.width).min(to.width),
                    height: height.min(from.height).min(to.height),
                    depth_or_array_layers: 1,
                },
            );
        }
        self.context.submit(encoder);
    }

    fn clear(&mut self, color: [f32; 4]) {
        let framebuffer = self.bound_framebuffer;
        if framebuffer.is_default() {
            log::debug!("clear of the window target is left to presentation");
            return;
        }
        let Some(fb) = self.framebuffers.get(&framebuffer).copied() else {
            return;
        };
        let Some(target) = fb.color.and_then(|a| self.attachment_image(a)) else {
            return;
        };
        let depth = fb.depth.and_then(|a| self.attachment_image(a));
        let [r, g, b, a] = color.map(f64::from);
        let mut encoder = self.context.create_encoder();
        let pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Render Target Clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target.view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: depth.map(|d| {
                wgpu::RenderPassDepthStencilAttachment {
                    view: &d.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        drop(pass);
        self.context.submit(encoder);
    }

    fn bind_texture(&mut self, target: Dimensionality, id: Option<TextureId>) {
        self.bound_textures[target.index()] = id;
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }
}
