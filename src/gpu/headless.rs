//! CPU-side [`GraphicsDevice`] with no GPU behind it.
//!
//! Keeps every object it hands out, records the calls it receives, and
//! stores uploaded pixels so their contents can be inspected. Used by the
//! test suite and by `--headless` runs of the frame loop; the latter turn
//! the call log off with [`HeadlessDevice::without_call_log`].

use std::collections::BTreeMap;

use super::device::{
    Attachment, AttachmentPoint, Capabilities, Dimensionality, FramebufferId,
    FramebufferStatus, GpuObject, GraphicsDevice, IdAllocator, RenderbufferId,
    SamplerParams, TexelFormat, TextureDesc, TextureId, TextureUpload,
    Viewport,
};
use crate::texture::pixels::MipLevel;

/// Stored state of one texture.
#[derive(Debug, Clone, Default)]
pub struct HeadlessTexture {
    /// Storage description, `None` until storage is allocated.
    pub desc: Option<TextureDesc>,
    /// Uploaded levels (empty for storage-only textures).
    pub levels: Vec<MipLevel>,
    /// Number of `texture_upload` calls received.
    pub uploads: usize,
}

/// Stored state of one renderbuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadlessRenderbuffer {
    /// Storage format.
    pub format: TexelFormat,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Sample count.
    pub samples: u32,
}

/// Attachments of one framebuffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeadlessFramebuffer {
    /// Color attachment.
    pub color: Option<Attachment>,
    /// Depth attachment.
    pub depth: Option<Attachment>,
}

/// A recorded device call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeviceCall {
    /// `bind_framebuffer`.
    BindFramebuffer(FramebufferId),
    /// `blit_framebuffer`.
    Blit {
        /// Read framebuffer.
        src: FramebufferId,
        /// Draw framebuffer.
        dst: FramebufferId,
        /// Blit width.
        width: u32,
        /// Blit height.
        height: u32,
    },
    /// `clear` on the framebuffer bound at the time.
    Clear(FramebufferId, [f32; 4]),
    /// `texture_upload`.
    Upload(TextureId),
    /// `bind_texture`.
    BindTexture(Dimensionality, Option<TextureId>),
    /// Any `delete_*` call.
    Delete(GpuObject),
}

/// Device that keeps everything in memory.
#[derive(Debug)]
pub struct HeadlessDevice {
    ids: IdAllocator,
    capabilities: Capabilities,
    fail_completeness: bool,
    textures: BTreeMap<TextureId, HeadlessTexture>,
    renderbuffers: BTreeMap<RenderbufferId, Option<HeadlessRenderbuffer>>,
    framebuffers: BTreeMap<FramebufferId, HeadlessFramebuffer>,
    bound_framebuffer: FramebufferId,
    viewport: Viewport,
    calls: Vec<DeviceCall>,
    record_calls: bool,
    invalid_deletes: usize,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    /// Device reporting every capability.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capabilities(Capabilities::ALL)
    }

    /// Device reporting the given capabilities.
    #[must_use]
    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        Self {
            ids: IdAllocator::default(),
            capabilities,
            fail_completeness: false,
            textures: BTreeMap::new(),
            renderbuffers: BTreeMap::new(),
            framebuffers: BTreeMap::new(),
            bound_framebuffer: FramebufferId::DEFAULT,
            viewport: Viewport::default(),
            calls: Vec::new(),
            record_calls: true,
            invalid_deletes: 0,
        }
    }

    /// Stop recording calls. Object tracking is unaffected; [`Self::calls`]
    /// stays empty.
    #[must_use]
    pub fn without_call_log(mut self) -> Self {
        self.record_calls = false;
        self.calls = Vec::new();
        self
    }

    /// Change the reported capabilities.
    pub fn set_capabilities(&mut self, capabilities: Capabilities) {
        self.capabilities = capabilities;
    }

    /// Make every completeness check report
    /// [`FramebufferStatus::Unsupported`].
    pub fn fail_framebuffer_completeness(&mut self, fail: bool) {
        self.fail_completeness = fail;
    }

    /// Whether `id` names a live texture.
    #[must_use]
    pub fn is_texture_live(&self, id: TextureId) -> bool {
        self.textures.contains_key(&id)
    }

    /// Whether `id` names a live renderbuffer.
    #[must_use]
    pub fn is_renderbuffer_live(&self, id: RenderbufferId) -> bool {
        self.renderbuffers.contains_key(&id)
    }

    /// Whether `id` names a live framebuffer.
    #[must_use]
    pub fn is_framebuffer_live(&self, id: FramebufferId) -> bool {
        self.framebuffers.contains_key(&id)
    }

    /// Stored texture state.
    #[must_use]
    pub fn texture(&self, id: TextureId) -> Option<&HeadlessTexture> {
        self.textures.get(&id)
    }

    /// Sampling parameters of a texture with storage.
    #[must_use]
    pub fn texture_sampler(&self, id: TextureId) -> Option<SamplerParams> {
        self.texture(id).and_then(|t| t.desc).map(|d| d.sampler)
    }

    /// Stored renderbuffer storage.
    #[must_use]
    pub fn renderbuffer(&self, id: RenderbufferId) -> Option<HeadlessRenderbuffer> {
        self.renderbuffers.get(&id).copied().flatten()
    }

    /// Stored framebuffer attachments.
    #[must_use]
    pub fn framebuffer(&self, id: FramebufferId) -> Option<HeadlessFramebuffer> {
        self.framebuffers.get(&id).copied()
    }

    /// Count of live objects of all kinds.
    #[must_use]
    pub fn live_objects(&self) -> usize {
        self.textures.len() + self.renderbuffers.len() + self.framebuffers.len()
    }

    /// Count of live textures.
    #[must_use]
    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    /// Deletes of names that were not live (double frees).
    #[must_use]
    pub fn invalid_deletes(&self) -> usize {
        self.invalid_deletes
    }

    /// Framebuffer the device last had bound.
    #[must_use]
    pub fn bound_framebuffer(&self) -> FramebufferId {
        self.bound_framebuffer
    }

    /// Last viewport set.
    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Every call recorded so far. Empty when the call log is off.
    #[must_use]
    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    /// Count of recorded calls matching `pred`.
    pub fn count_calls(&self, pred: impl Fn(&DeviceCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    /// Whether `object` was ever deleted.
    #[must_use]
    pub fn was_deleted(&self, object: GpuObject) -> bool {
        self.calls.contains(&DeviceCall::Delete(object))
    }

    fn attachment_info(&self, attachment: Attachment) -> Option<(u32, u32, u32)> {
        match attachment {
            Attachment::Texture(id) => self
                .textures
                .get(&id)
                .and_then(|t| t.desc)
                .map(|d| (d.width, d.height, 1)),
            Attachment::Renderbuffer(id) => self
                .renderbuffer(id)
                .map(|r| (r.width, r.height, r.samples)),
        }
    }

    fn record(&mut self, call: DeviceCall) {
        if self.record_calls {
            self.calls.push(call);
        }
    }

    fn record_delete(&mut self, object: GpuObject, was_live: bool) {
        if !was_live {
            log::error!("headless device: delete of dead object {object:?}");
            self.invalid_deletes += 1;
        }
        self.record(DeviceCall::Delete(object));
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn gen_texture(&mut self) -> TextureId {
        let id = self.ids.texture();
        let _ = self.textures.insert(id, HeadlessTexture::default());
        id
    }

    fn texture_storage(&mut self, id: TextureId, desc: &TextureDesc) {
        if let Some(texture) = self.textures.get_mut(&id) {
            texture.desc = Some(*desc);
            texture.levels.clear();
        }
    }

    fn texture_upload(&mut self, id: TextureId, upload: &TextureUpload<'_>) {
        let Some(texture) = self.textures.get_mut(&id) else {
            log::error!("headless device: upload into dead texture {id:?}");
            return;
        };
        let (width, height) = upload
            .levels
            .first()
            .map_or((0, 0), |l| (l.width, l.height));
        texture.desc = Some(TextureDesc {
            dimensionality: upload.dimensionality,
            width,
            height,
            format: upload.format,
            sampler: upload.sampler,
        });
        texture.levels = upload.levels.to_vec();
        texture.uploads += 1;
        self.record(DeviceCall::Upload(id));
    }

    fn delete_texture(&mut self, id: TextureId) {
        let was_live = self.textures.remove(&id).is_some();
        self.record_delete(GpuObject::Texture(id), was_live);
    }

    fn gen_renderbuffer(&mut self) -> RenderbufferId {
        let id = self.ids.renderbuffer();
        let _ = self.renderbuffers.insert(id, None);
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
        if let Some(slot) = self.renderbuffers.get_mut(&id) {
            *slot = Some(HeadlessRenderbuffer {
                format,
                width,
                height,
                samples,
            });
        }
    }

    fn delete_renderbuffer(&mut self, id: RenderbufferId) {
        let was_live = self.renderbuffers.remove(&id).is_some();
        self.record_delete(GpuObject::Renderbuffer(id), was_live);
    }

    fn gen_framebuffer(&mut self) -> FramebufferId {
        let id = self.ids.framebuffer();
        let _ = self.framebuffers.insert(id, HeadlessFramebuffer::default());
        id
    }

    fn framebuffer_attach(
        &mut self,
        framebuffer: FramebufferId,
        point: AttachmentPoint,
        attachment: Attachment,
    ) {
        if let Some(fb) = self.framebuffers.get_mut(&framebuffer) {
            match point {
                AttachmentPoint::Color0 => fb.color = Some(attachment),
                AttachmentPoint::Depth => fb.depth = Some(attachment),
            }
        }
    }

    fn framebuffer_status(
        &self,
        framebuffer: FramebufferId,
    ) -> FramebufferStatus {
        if self.fail_completeness {
            return FramebufferStatus::Unsupported;
        }
        let Some(fb) = self.framebuffers.get(&framebuffer) else {
            return FramebufferStatus::Unsupported;
        };
        let attached: Vec<Attachment> =
            fb.color.into_iter().chain(fb.depth).collect();
        if attached.is_empty() {
            return FramebufferStatus::MissingAttachment;
        }
        let mut infos = Vec::with_capacity(attached.len());
        for attachment in attached {
            match self.attachment_info(attachment) {
                Some(info) => infos.push(info),
                None => return FramebufferStatus::IncompleteAttachment,
            }
        }
        let (w, h, samples) = infos[0];
        if infos.iter().any(|&(iw, ih, _)| (iw, ih) != (w, h)) {
            FramebufferStatus::IncompleteDimensions
        } else if infos.iter().any(|&(_, _, s)| s != samples) {
            FramebufferStatus::IncompleteMultisample
        } else {
            FramebufferStatus::Complete
        }
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        let was_live = self.framebuffers.remove(&framebuffer).is_some();
        self.record_delete(GpuObject::Framebuffer(framebuffer), was_live);
    }

    fn bind_framebuffer(&mut self, framebuffer: FramebufferId) {
        if !framebuffer.is_default() && !self.is_framebuffer_live(framebuffer) {
            log::error!("headless device: bind of dead framebuffer {framebuffer:?}");
        }
        self.bound_framebuffer = framebuffer;
        self.record(DeviceCall::BindFramebuffer(framebuffer));
    }

    fn blit_framebuffer(
        &mut self,
        src: FramebufferId,
        dst: FramebufferId,
        width: u32,
        height: u32,
    ) {
        self.record(DeviceCall::Blit {
            src,
            dst,
            width,
            height,
        });
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.record(DeviceCall::Clear(self.bound_framebuffer, color));
    }

    fn bind_texture(&mut self, target: Dimensionality, id: Option<TextureId>) {
        self.record(DeviceCall::BindTexture(target, id));
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }
}
