//! The texture resource: one logical texture or render target.
//!
//! A [`Texture`] starts empty and becomes either a render target
//! (`init_as_render_target`) or a sampled image (`upload_pixels`, `load`,
//! `load_async`). Every entry point is safe to call in any state: misuse is
//! logged and reported, and leaves the resource unchanged or fully invalid.

use std::sync::Arc;

use super::cache::{LoadOptions, SourceKind};
use super::capture::CaptureContext;
use super::handle::{TextureHandle, TextureInfo};
use super::loader::{AsyncLoadJob, JobState};
use super::pixels::{mip_chain, Bitmap, MipLevel, PixelBuffer};
use super::render_target::{self, BufferKind, RenderTargetOptions, RenderTargetState};
use super::TextureContext;
use crate::error::TextureError;
use crate::gpu::context::{GraphicsContext, MatrixMode};
use crate::gpu::device::{
    Capability, Dimensionality, GraphicsDevice, SamplerParams, TexelFormat,
    TextureId, TextureUpload, Viewport,
};

/// Progress of a background load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadState {
    /// No job.
    Idle,
    /// Decode in flight.
    Running,
    /// Decode finished; picked up by the next `bind()`.
    Done,
}

fn misuse(what: &'static str) -> TextureError {
    log::warn!("texture misuse: {what}");
    TextureError::StateMisuse(what)
}

/// One logical texture: GPU handle, optional render-target state, optional
/// cache reference and optional in-flight decode.
#[derive(Debug, Default)]
pub struct Texture {
    handle: TextureHandle,
    render_target: Option<RenderTargetState>,
    capture: Option<CaptureContext>,
    asset_key: Option<String>,
    shared: bool,
    job: Option<AsyncLoadJob>,
    generation: u64,
}

impl Texture {
    /// Empty, unallocated texture.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// GPU identity and validity flags.
    #[must_use]
    pub fn handle(&self) -> &TextureHandle {
        &self.handle
    }

    /// Render-target variant, [`BufferKind::None`] for sampled images.
    #[must_use]
    pub fn buffer_kind(&self) -> BufferKind {
        self.render_target.as_ref().map_or(BufferKind::None, |s| s.kind)
    }

    /// Render-target objects, if configured as one.
    #[must_use]
    pub fn render_target(&self) -> Option<&RenderTargetState> {
        self.render_target.as_ref()
    }

    /// Depth texture of a color-and-depth target, for sharing with other
    /// targets through [`RenderTargetOptions::existing_depth`].
    #[must_use]
    pub fn depth_buffer_handle(&self) -> Option<TextureId> {
        self.render_target
            .as_ref()
            .and_then(RenderTargetState::depth_texture)
    }

    /// Whether a capture bracket is open.
    #[must_use]
    pub fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }

    /// Cache key this texture holds a reference to.
    #[must_use]
    pub fn asset_key(&self) -> Option<&str> {
        self.asset_key.as_deref()
    }

    /// Whether the GPU object came from a cache hit rather than this
    /// texture's own upload.
    #[must_use]
    pub fn is_shared(&self) -> bool {
        self.shared
    }

    /// Whether a background decode is pending.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.job.is_some()
    }

    /// Progress of the background decode. A failed decode reads as
    /// `Running` until its worker exits and `Idle` after that; only a
    /// decode that handed over pixels reads as `Done`.
    #[must_use]
    pub fn load_state(&self) -> LoadState {
        match &self.job {
            None => LoadState::Idle,
            Some(job) if job.has_result() => LoadState::Done,
            Some(job) if job.is_finished() => LoadState::Idle,
            Some(_) => LoadState::Running,
        }
    }

    // ── Render targets ───────────────────────────────────────────────

    /// Configure as a render target of `kind`.
    ///
    /// # Errors
    ///
    /// - [`TextureError::StateMisuse`] if already configured or holding an
    ///   image, or for [`BufferKind::None`]
    /// - [`TextureError::InvalidDimensions`] for a zero size
    /// - [`TextureError::CapabilityUnavailable`] without framebuffer support
    /// - [`TextureError::AllocationIncomplete`] if the device rejects the
    ///   framebuffer
    ///
    /// On error the texture is left unconfigured.
    pub fn init_as_render_target<D: GraphicsDevice>(
        &mut self,
        gfx: &mut GraphicsContext<D>,
        kind: BufferKind,
        width: u32,
        height: u32,
        options: &RenderTargetOptions,
    ) -> Result<(), TextureError> {
        if self.render_target.is_some() {
            return Err(misuse("render target already configured"));
        }
        if self.handle.object().is_some()
            || self.asset_key.is_some()
            || self.job.is_some()
        {
            return Err(misuse("texture holds an image, unload it first"));
        }
        if kind == BufferKind::None {
            return Err(misuse("BufferKind::None is not a render target"));
        }
        if width == 0 || height == 0 {
            log::warn!("refusing {width}x{height} render target");
            return Err(TextureError::InvalidDimensions { width, height });
        }
        if !gfx.supports_render_targets() {
            let missing = gfx
                .capabilities()
                .missing_render_target_capability()
                .unwrap_or(Capability::FramebufferObject);
            return Err(TextureError::CapabilityUnavailable(missing));
        }

        let state = render_target::allocate(gfx, kind, width, height, options)?;
        self.handle.set_render_target(TextureInfo {
            object: state.sampled_texture(),
            dimensionality: Dimensionality::D2,
            width,
            height,
        });
        self.generation = state.generation;
        self.render_target = Some(state);
        Ok(())
    }

    /// Release the render-target objects. No-op if not configured.
    pub fn deinit<D: GraphicsDevice>(&mut self, gfx: &mut GraphicsContext<D>) {
        if self.capture.is_some() {
            self.end_capture(gfx);
        }
        let Some(state) = self.render_target.take() else {
            return;
        };
        render_target::release(gfx, &state);
        self.handle.clear();
    }

    /// [`Self::deinit`] followed by [`Self::init_as_render_target`].
    ///
    /// # Errors
    ///
    /// As [`Self::init_as_render_target`]; the texture is then left
    /// unconfigured.
    pub fn reinit_as_render_target<D: GraphicsDevice>(
        &mut self,
        gfx: &mut GraphicsContext<D>,
        kind: BufferKind,
        width: u32,
        height: u32,
        options: &RenderTargetOptions,
    ) -> Result<(), TextureError> {
        self.deinit(gfx);
        self.init_as_render_target(gfx, kind, width, height, options)
    }

    /// Redirect drawing into this render target. No-op unless capturable
    /// and not already capturing.
    pub fn begin_capture<D: GraphicsDevice>(
        &mut self,
        gfx: &mut GraphicsContext<D>,
    ) {
        if !self.handle.is_valid_for_capture() {
            return;
        }
        if self.capture.is_some() {
            log::debug!("begin_capture while capturing, ignored");
            return;
        }
        let Some(state) = &self.render_target else {
            return;
        };
        if state.generation != gfx.generation() {
            log::warn!("begin_capture on a render target from a lost context");
            return;
        }

        self.capture = Some(CaptureContext::save(gfx));
        gfx.framebuffer_bind(state.framebuffer);
        for mode in MatrixMode::ALL {
            gfx.matrix_load_identity(mode);
        }
        gfx.set_viewport(Viewport::sized(state.width, state.height));
    }

    /// Finish drawing into this render target and restore what
    /// [`Self::begin_capture`] replaced. No-op unless capturing.
    pub fn end_capture<D: GraphicsDevice>(&mut self, gfx: &mut GraphicsContext<D>) {
        let Some(saved) = self.capture.take() else {
            return;
        };
        if let Some(state) = &self.render_target {
            if let (BufferKind::FeedbackMultisampleBlit, Some(resolve)) =
                (state.kind, state.resolve_framebuffer)
            {
                gfx.device_mut().blit_framebuffer(
                    state.framebuffer,
                    resolve,
                    state.width,
                    state.height,
                );
            }
        }
        saved.restore(gfx);
    }

    // ── Sampled images ───────────────────────────────────────────────

    /// Upload `bitmap` as this texture's image, replacing any previous
    /// one. A pending background load is discarded.
    ///
    /// # Errors
    ///
    /// [`TextureError::StateMisuse`] on render targets or malformed
    /// buffers; the previous image is then kept.
    pub fn upload_pixels<D: GraphicsDevice>(
        &mut self,
        ctx: &mut TextureContext<D>,
        dimensionality: Dimensionality,
        bitmap: Bitmap,
        options: &LoadOptions,
    ) -> Result<(), TextureError> {
        if self.render_target.is_some() {
            return Err(misuse("upload into a render target"));
        }
        validate(dimensionality, &bitmap)?;
        self.job = None;
        if self.asset_key.is_some() {
            self.unload(ctx);
        }
        let reuse = self
            .handle
            .object()
            .filter(|_| self.generation == ctx.gfx.generation());
        let info = upload_bitmap(&mut ctx.gfx, reuse, dimensionality, bitmap, options)?;
        self.handle.set_sampled(info);
        self.generation = ctx.gfx.generation();
        Ok(())
    }

    /// Load `key` now: cache hit shares the cached object, miss decodes and
    /// uploads on this thread. On failure the previous image is kept.
    ///
    /// # Errors
    ///
    /// [`TextureError::Decode`] or upload errors.
    pub fn load<D: GraphicsDevice>(
        &mut self,
        ctx: &mut TextureContext<D>,
        key: &str,
        options: LoadOptions,
    ) -> Result<(), TextureError> {
        if self.render_target.is_some() {
            return Err(misuse("load into a render target"));
        }
        self.job = None;
        if self.holds_live(ctx, key) {
            return Ok(());
        }
        if let Some(info) = ctx.cache.acquire(key) {
            self.adopt(ctx, key, info, true);
            return Ok(());
        }

        let bitmap = ctx.decoder().decode(key).map_err(|e| {
            log::warn!("could not load {key}: {e}");
            TextureError::from(e)
        })?;
        let info =
            upload_bitmap(&mut ctx.gfx, None, Dimensionality::D2, bitmap, &options)?;
        self.publish(ctx, key, info, SourceKind::DecodedImage, options);
        Ok(())
    }

    /// Start loading `key` in the background. A cache hit completes
    /// immediately. Otherwise a previous job is waited for and discarded,
    /// a new worker decodes, and the next [`Self::bind`] after it finishes
    /// uploads the result; until then the previous image stays bindable.
    ///
    /// # Errors
    ///
    /// [`TextureError::StateMisuse`] on render targets,
    /// [`TextureError::ThreadSpawn`] if no worker could be started.
    pub fn load_async<D: GraphicsDevice>(
        &mut self,
        ctx: &mut TextureContext<D>,
        key: &str,
        options: LoadOptions,
    ) -> Result<(), TextureError> {
        if self.render_target.is_some() {
            return Err(misuse("load into a render target"));
        }
        if let Some(info) = ctx.cache.acquire(key) {
            self.job = None;
            self.adopt(ctx, key, info, true);
            return Ok(());
        }
        if let Some(mut previous) = self.job.take() {
            log::debug!(
                "waiting for decode of {} before loading {key}",
                previous.key()
            );
            previous.wait();
        }
        self.job = Some(AsyncLoadJob::spawn(key, options, Arc::clone(ctx.decoder()))?);
        Ok(())
    }

    /// Block until the background decode, if any, has finished. The result
    /// is still uploaded by the next [`Self::bind`].
    pub fn wait_for_load(&mut self) {
        if let Some(job) = &mut self.job {
            job.wait();
        }
    }

    /// Publish this texture's uploaded image under `key` so that `load`
    /// calls for it share the object. The cache takes ownership of it.
    ///
    /// # Errors
    ///
    /// [`TextureError::StateMisuse`] for render targets, textures without an
    /// image, textures already cache-backed under another key, or keys
    /// already in use.
    pub fn share_as<D: GraphicsDevice>(
        &mut self,
        ctx: &mut TextureContext<D>,
        key: &str,
    ) -> Result<(), TextureError> {
        if self.render_target.is_some() {
            return Err(misuse("render targets cannot be published"));
        }
        match self.asset_key.as_deref() {
            Some(current) if current == key => return Ok(()),
            Some(_) => return Err(misuse("texture is already cache-backed")),
            None => {}
        }
        if self.handle.object().is_none() {
            return Err(misuse("nothing uploaded to publish"));
        }
        if ctx.cache.contains(key) {
            return Err(misuse("cache key already in use"));
        }
        ctx.cache.insert(
            key,
            self.handle.info(),
            SourceKind::Procedural,
            LoadOptions::default(),
            self.generation,
        );
        self.asset_key = Some(key.to_owned());
        self.shared = false;
        Ok(())
    }

    /// Bind for sampling. Finishes a completed background load first.
    /// Returns `false` when there is nothing to bind.
    pub fn bind<D: GraphicsDevice>(&mut self, ctx: &mut TextureContext<D>) -> bool {
        self.poll_job(ctx);
        self.refresh_from_cache(ctx);
        if !self.handle.is_valid_for_binding() {
            return false;
        }
        let Some(id) = self.handle.object() else {
            return false;
        };
        if self.generation != ctx.gfx.generation() {
            log::warn!("bind of a texture from a lost context");
            return false;
        }
        let target = self.handle.dimensionality();
        ctx.gfx.enable(target);
        ctx.gfx.bind_texture(target, Some(id));
        true
    }

    /// Undo [`Self::bind`].
    pub fn unbind<D: GraphicsDevice>(&self, gfx: &mut GraphicsContext<D>) {
        let target = self.handle.dimensionality();
        gfx.bind_texture(target, None);
        gfx.disable(target);
    }

    /// Release everything: pending job, render target, cache reference or
    /// owned image. Safe to call repeatedly.
    pub fn unload<D: GraphicsDevice>(&mut self, ctx: &mut TextureContext<D>) {
        self.job = None;
        if self.render_target.is_some() {
            self.deinit(&mut ctx.gfx);
        } else if let Some(key) = self.asset_key.take() {
            let _ = ctx.cache.release(&key, &mut ctx.gfx);
        } else if let Some(id) = self.handle.object() {
            if self.generation == ctx.gfx.generation() {
                ctx.gfx.device_mut().delete_texture(id);
            } else {
                log::warn!("texture {} belongs to a lost context", id.get());
            }
        }
        self.handle.clear();
        self.asset_key = None;
        self.shared = false;
    }

    fn holds_live<D: GraphicsDevice>(&self, ctx: &TextureContext<D>, key: &str) -> bool {
        self.asset_key.as_deref() == Some(key)
            && ctx.cache.lookup(key).is_some()
    }

    /// Take over `info`, already referenced in the cache under `key`.
    fn adopt<D: GraphicsDevice>(
        &mut self,
        ctx: &mut TextureContext<D>,
        key: &str,
        info: TextureInfo,
        shared: bool,
    ) {
        self.unload(ctx);
        self.handle.set_sampled(info);
        self.asset_key = Some(key.to_owned());
        self.shared = shared;
        self.generation = ctx.gfx.generation();
    }

    /// Insert a fresh upload under `key` and take it over.
    fn publish<D: GraphicsDevice>(
        &mut self,
        ctx: &mut TextureContext<D>,
        key: &str,
        info: TextureInfo,
        source: SourceKind,
        options: LoadOptions,
    ) {
        self.unload(ctx);
        let generation = ctx.gfx.generation();
        ctx.cache.insert(key, info, source, options, generation);
        self.handle.set_sampled(info);
        self.asset_key = Some(key.to_owned());
        self.shared = false;
        self.generation = generation;
    }

    fn poll_job<D: GraphicsDevice>(&mut self, ctx: &mut TextureContext<D>) {
        let Some(job) = &self.job else { return };
        match job.poll() {
            JobState::Running => {}
            JobState::Failed => {
                log::warn!("background load of {} failed", job.key());
                self.job = None;
            }
            JobState::Done(bitmap) => {
                let key = job.key().to_owned();
                let options = job.options();
                self.job = None;
                self.finish_load(ctx, &key, options, bitmap);
            }
        }
    }

    fn finish_load<D: GraphicsDevice>(
        &mut self,
        ctx: &mut TextureContext<D>,
        key: &str,
        options: LoadOptions,
        bitmap: Bitmap,
    ) {
        if let Some(info) = ctx.cache.acquire(key) {
            log::debug!("{key} was cached while decoding, sharing it");
            self.adopt(ctx, key, info, true);
            return;
        }
        match upload_bitmap(&mut ctx.gfx, None, Dimensionality::D2, bitmap, &options) {
            Ok(info) => {
                self.publish(ctx, key, info, SourceKind::DecodedImage, options);
                log::debug!("uploaded background load of {key}");
            }
            Err(e) => log::warn!("could not upload {key}: {e}"),
        }
    }

    fn refresh_from_cache<D: GraphicsDevice>(&mut self, ctx: &TextureContext<D>) {
        let Some(key) = &self.asset_key else { return };
        match ctx.cache.entry(key) {
            Some(entry) => {
                if entry.info != self.handle.info() {
                    self.handle.set_sampled(entry.info);
                    self.generation = entry.generation;
                }
            }
            None => {
                log::debug!("{key} left the cache, texture is now empty");
                self.handle.clear();
                self.asset_key = None;
                self.shared = false;
            }
        }
    }
}

fn validate(dimensionality: Dimensionality, bitmap: &Bitmap) -> Result<(), TextureError> {
    if bitmap.width == 0 || bitmap.height == 0 {
        log::warn!("refusing {}x{} upload", bitmap.width, bitmap.height);
        return Err(TextureError::InvalidDimensions {
            width: bitmap.width,
            height: bitmap.height,
        });
    }
    if !bitmap.is_consistent() {
        return Err(misuse("pixel buffer does not match its dimensions"));
    }
    if dimensionality == Dimensionality::D1 && bitmap.height != 1 {
        return Err(misuse("1D upload with more than one row"));
    }
    Ok(())
}

/// Upload `bitmap` into `object` (or a new texture), with optional row
/// flip and mip pyramid. The texture-target enable flag is left as found.
///
/// # Errors
///
/// [`TextureError::InvalidDimensions`] or [`TextureError::StateMisuse`] for
/// buffers that do not describe an image, [`TextureError::Decode`] for
/// unsupported channel counts. Nothing is allocated on error.
pub(crate) fn upload_bitmap<D: GraphicsDevice>(
    gfx: &mut GraphicsContext<D>,
    object: Option<TextureId>,
    dimensionality: Dimensionality,
    bitmap: Bitmap,
    options: &LoadOptions,
) -> Result<TextureInfo, TextureError> {
    validate(dimensionality, &bitmap)?;
    let bitmap = bitmap.normalized()?;
    let (width, height, components) = (bitmap.width, bitmap.height, bitmap.components);
    let pixels = bitmap.into_oriented(options.flip_vertically);
    let format = match (&pixels, components) {
        (PixelBuffer::Floats(_), _) => TexelFormat::Rgba16F,
        (PixelBuffer::Bytes(_), 3) => TexelFormat::Rgb8,
        (PixelBuffer::Bytes(_), _) => TexelFormat::Rgba8,
    };
    let base = MipLevel {
        width,
        height,
        pixels,
    };
    let (levels, sampler) = if options.mipmaps {
        (
            mip_chain(base, components, dimensionality),
            SamplerParams::MIPMAPPED,
        )
    } else {
        (vec![base], SamplerParams::LINEAR_REPEAT)
    };

    let id = object.unwrap_or_else(|| gfx.device_mut().gen_texture());
    let was_enabled = gfx.is_enabled(dimensionality);
    gfx.enable(dimensionality);
    gfx.bind_texture(dimensionality, Some(id));
    gfx.device_mut().texture_upload(id, &TextureUpload {
        dimensionality,
        format,
        levels: &levels,
        sampler,
    });
    if !was_enabled {
        gfx.disable(dimensionality);
    }
    log::debug!(
        "uploaded {width}x{height} {format:?} texture {} ({} levels)",
        id.get(),
        levels.len()
    );
    Ok(TextureInfo {
        object: Some(id),
        dimensionality,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::device::{Capabilities, GpuObject};
    use crate::gpu::headless::{DeviceCall, HeadlessDevice};
    use crate::texture::testing::FakeDecoder;
    use glam::{Mat4, Vec3};

    fn context_with(decoder: Arc<FakeDecoder>) -> TextureContext<HeadlessDevice> {
        TextureContext::new(
            GraphicsContext::new(HeadlessDevice::new(), Viewport::sized(64, 48)),
            decoder,
        )
    }

    fn context() -> TextureContext<HeadlessDevice> {
        context_with(Arc::new(FakeDecoder::new()))
    }

    fn rt_options() -> RenderTargetOptions {
        RenderTargetOptions {
            alpha: true,
            multisample: true,
            ..Default::default()
        }
    }

    const KINDS: [BufferKind; 3] = [
        BufferKind::ColorOnly,
        BufferKind::ColorAndDepth,
        BufferKind::FeedbackMultisampleBlit,
    ];

    fn uploads(ctx: &TextureContext<HeadlessDevice>) -> usize {
        ctx.gfx
            .device()
            .count_calls(|c| matches!(c, DeviceCall::Upload(_)))
    }

    #[test]
    fn teardown_is_idempotent() {
        let mut ctx = context();
        for kind in KINDS {
            let mut tex = Texture::new();
            tex.init_as_render_target(&mut ctx.gfx, kind, 16, 16, &rt_options())
                .unwrap();
            tex.deinit(&mut ctx.gfx);
            tex.deinit(&mut ctx.gfx);
            tex.unload(&mut ctx);
            assert!(!tex.handle().is_valid_for_binding());
        }
        let mut image = Texture::new();
        image.load(&mut ctx, "a.png", LoadOptions::default()).unwrap();
        image.unload(&mut ctx);
        image.unload(&mut ctx);

        let mut never = Texture::new();
        never.deinit(&mut ctx.gfx);
        never.unload(&mut ctx);

        assert_eq!(ctx.gfx.device().live_objects(), 0);
        assert_eq!(ctx.gfx.device().invalid_deletes(), 0);
    }

    #[test]
    fn same_key_shares_one_object_and_one_decode() {
        let decoder = Arc::new(FakeDecoder::new());
        let mut ctx = context_with(decoder.clone());
        let mut first = Texture::new();
        let mut second = Texture::new();
        first.load(&mut ctx, "a.png", LoadOptions::default()).unwrap();
        second.load(&mut ctx, "a.png", LoadOptions::default()).unwrap();

        assert_eq!(first.handle().object_id(), second.handle().object_id());
        assert_ne!(first.handle().object_id(), 0);
        assert_eq!(decoder.calls("a.png"), 1);
        assert!(!first.is_shared());
        assert!(second.is_shared());

        let mut third = Texture::new();
        third
            .load_async(&mut ctx, "a.png", LoadOptions::default())
            .unwrap();
        assert!(!third.is_loading());
        assert_eq!(third.handle().object_id(), first.handle().object_id());
        assert_eq!(decoder.calls("a.png"), 1);
    }

    #[test]
    fn shared_object_lives_until_last_unload() {
        let mut ctx = context();
        let mut first = Texture::new();
        let mut second = Texture::new();
        first.load(&mut ctx, "a.png", LoadOptions::default()).unwrap();
        second.load(&mut ctx, "a.png", LoadOptions::default()).unwrap();
        let id = first.handle().object().unwrap();

        second.unload(&mut ctx);
        assert!(ctx.gfx.device().is_texture_live(id));
        assert!(first.bind(&mut ctx));

        first.unload(&mut ctx);
        assert!(!ctx.gfx.device().is_texture_live(id));
        assert!(ctx.cache.is_empty());
    }

    #[test]
    fn reinit_yields_valid_target_with_fresh_objects() {
        let mut ctx = context();
        for kind in KINDS {
            let mut tex = Texture::new();
            tex.init_as_render_target(&mut ctx.gfx, kind, 32, 32, &rt_options())
                .unwrap();
            let old = tex.render_target().unwrap().release_plan();
            tex.reinit_as_render_target(&mut ctx.gfx, kind, 64, 16, &rt_options())
                .unwrap();

            assert!(tex.handle().is_valid_for_binding());
            assert!(tex.handle().is_valid_for_capture());
            assert_eq!((tex.handle().width(), tex.handle().height()), (64, 16));
            let new = tex.render_target().unwrap().release_plan();
            assert!(new.iter().all(|object| !old.contains(object)));
            tex.deinit(&mut ctx.gfx);
        }
        assert_eq!(ctx.gfx.device().live_objects(), 0);
    }

    #[test]
    fn failed_reinit_leaves_texture_invalid() {
        let mut ctx = context();
        let mut tex = Texture::new();
        tex.init_as_render_target(&mut ctx.gfx, BufferKind::ColorOnly, 8, 8, &rt_options())
            .unwrap();
        ctx.gfx.device_mut().fail_framebuffer_completeness(true);
        assert!(tex
            .reinit_as_render_target(&mut ctx.gfx, BufferKind::ColorOnly, 8, 8, &rt_options())
            .is_err());
        assert!(!tex.handle().is_valid_for_binding());
        assert!(!tex.handle().is_valid_for_capture());
        assert_eq!(tex.buffer_kind(), BufferKind::None);
        assert_eq!(ctx.gfx.device().live_objects(), 0);
    }

    #[test]
    fn capture_bracket_restores_state() {
        let mut ctx = context();
        let outer_fb = ctx.gfx.device_mut().gen_framebuffer();
        for kind in KINDS {
            let mut tex = Texture::new();
            tex.init_as_render_target(&mut ctx.gfx, kind, 16, 8, &rt_options())
                .unwrap();
            ctx.gfx.framebuffer_bind(outer_fb);
            ctx.gfx.matrix_set(
                MatrixMode::ModelView,
                Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)),
            );
            let before: Vec<Mat4> =
                MatrixMode::ALL.iter().map(|&m| ctx.gfx.matrix_get(m)).collect();
            let viewport = ctx.gfx.viewport();

            tex.begin_capture(&mut ctx.gfx);
            assert!(tex.is_capturing());
            assert_eq!(ctx.gfx.framebuffer_bind_get(), tex.render_target().unwrap().framebuffer);
            assert_eq!(ctx.gfx.matrix_get(MatrixMode::ModelView), Mat4::IDENTITY);
            assert_eq!(ctx.gfx.viewport(), Viewport::sized(16, 8));
            tex.begin_capture(&mut ctx.gfx);
            ctx.gfx.matrix_set(MatrixMode::Projection, Mat4::from_scale(Vec3::splat(5.0)));
            tex.end_capture(&mut ctx.gfx);
            tex.end_capture(&mut ctx.gfx);

            let after: Vec<Mat4> =
                MatrixMode::ALL.iter().map(|&m| ctx.gfx.matrix_get(m)).collect();
            assert_eq!(before, after);
            assert_eq!(ctx.gfx.framebuffer_bind_get(), outer_fb);
            assert_eq!(ctx.gfx.viewport(), viewport);
            assert!(!tex.is_capturing());
            tex.deinit(&mut ctx.gfx);
        }
    }

    #[test]
    fn feedback_capture_resolves_once() {
        let mut ctx = context();
        let mut tex = Texture::new();
        tex.init_as_render_target(
            &mut ctx.gfx,
            BufferKind::FeedbackMultisampleBlit,
            16,
            16,
            &rt_options(),
        )
        .unwrap();
        let state = tex.render_target().unwrap().clone();
        tex.begin_capture(&mut ctx.gfx);
        tex.end_capture(&mut ctx.gfx);
        tex.end_capture(&mut ctx.gfx);

        let blits: Vec<_> = ctx
            .gfx
            .device()
            .calls()
            .iter()
            .filter(|c| matches!(c, DeviceCall::Blit { .. }))
            .copied()
            .collect();
        assert_eq!(blits, vec![DeviceCall::Blit {
            src: state.framebuffer,
            dst: state.resolve_framebuffer.unwrap(),
            width: 16,
            height: 16,
        }]);
        assert!(tex.bind(&mut ctx));
    }

    #[test]
    fn capture_on_plain_texture_is_ignored() {
        let mut ctx = context();
        let mut tex = Texture::new();
        tex.begin_capture(&mut ctx.gfx);
        assert!(!tex.is_capturing());
        tex.load(&mut ctx, "a.png", LoadOptions::default()).unwrap();
        tex.begin_capture(&mut ctx.gfx);
        assert!(!tex.is_capturing());
        assert!(ctx.gfx.framebuffer_bind_get().is_default());
    }

    #[test]
    fn borrowed_depth_survives_deinit() {
        let mut ctx = context();
        let mut owner = Texture::new();
        owner
            .init_as_render_target(&mut ctx.gfx, BufferKind::ColorAndDepth, 8, 8, &rt_options())
            .unwrap();
        let depth = owner.depth_buffer_handle().unwrap();

        let mut borrower = Texture::new();
        let options = RenderTargetOptions {
            existing_depth: Some(depth),
            ..rt_options()
        };
        borrower
            .init_as_render_target(&mut ctx.gfx, BufferKind::ColorAndDepth, 8, 8, &options)
            .unwrap();
        borrower.deinit(&mut ctx.gfx);
        assert!(ctx.gfx.device().is_texture_live(depth));

        owner.deinit(&mut ctx.gfx);
        assert!(!ctx.gfx.device().is_texture_live(depth));
        assert!(ctx.gfx.device().was_deleted(GpuObject::Texture(depth)));
        assert_eq!(ctx.gfx.device().invalid_deletes(), 0);
    }

    #[test]
    fn async_load_uploads_exactly_once() {
        let decoder = Arc::new(FakeDecoder::gated());
        let mut ctx = context_with(decoder.clone());
        let mut tex = Texture::new();
        tex.load_async(&mut ctx, "a.png", LoadOptions::default())
            .unwrap();
        assert_eq!(tex.load_state(), LoadState::Running);
        assert!(!tex.bind(&mut ctx));

        decoder.open();
        tex.wait_for_load();
        assert_eq!(tex.load_state(), LoadState::Done);
        for _ in 0..5 {
            assert!(tex.bind(&mut ctx));
        }
        assert_eq!(uploads(&ctx), 1);
        assert_eq!(tex.load_state(), LoadState::Idle);
        assert_eq!(ctx.cache.refs("a.png"), 1);
    }

    #[test]
    fn second_async_load_waits_for_the_first() {
        let decoder = Arc::new(FakeDecoder::gated());
        let mut ctx = context_with(decoder.clone());
        let mut tex = Texture::new();
        tex.load_async(&mut ctx, "a.png", LoadOptions::default())
            .unwrap();

        let opener = {
            let decoder = decoder.clone();
            std::thread::spawn(move || {
                std::thread::sleep(std::time::Duration::from_millis(50));
                decoder.open();
            })
        };
        tex.load_async(&mut ctx, "a.png", LoadOptions::default())
            .unwrap();
        assert!(decoder.completed() >= 1);
        opener.join().unwrap();

        tex.wait_for_load();
        assert!(tex.bind(&mut ctx));
        assert!(tex.bind(&mut ctx));
        assert_eq!(uploads(&ctx), 1);
        assert_eq!(decoder.calls("a.png"), 2);
    }

    #[test]
    fn failed_async_load_stays_unbound() {
        let mut ctx = context();
        let mut tex = Texture::new();
        tex.load_async(&mut ctx, "missing.png", LoadOptions::default())
            .unwrap();
        tex.wait_for_load();
        assert!(!tex.bind(&mut ctx));
        assert!(!tex.is_loading());
        assert!(!tex.bind(&mut ctx));
        assert!(ctx.cache.is_empty());
    }

    #[test]
    fn failed_async_load_never_reports_done() {
        let mut ctx = context();
        let mut tex = Texture::new();
        tex.load_async(&mut ctx, "missing.png", LoadOptions::default())
            .unwrap();
        tex.wait_for_load();
        assert_ne!(tex.load_state(), LoadState::Done);
        assert_eq!(tex.load_state(), LoadState::Idle);

        tex.load_async(&mut ctx, "a.png", LoadOptions::default())
            .unwrap();
        tex.wait_for_load();
        assert_eq!(tex.load_state(), LoadState::Done);
        assert!(tex.bind(&mut ctx));
        assert_eq!(tex.load_state(), LoadState::Idle);
    }

    #[test]
    fn previous_image_stays_bound_until_swap() {
        let decoder = Arc::new(FakeDecoder::gated());
        let mut ctx = context_with(decoder.clone());
        decoder.open();
        let mut tex = Texture::new();
        tex.load(&mut ctx, "a.png", LoadOptions::default()).unwrap();
        let old = tex.handle().object().unwrap();

        tex.load_async(&mut ctx, "b.png", LoadOptions::default())
            .unwrap();
        tex.wait_for_load();
        assert_eq!(tex.handle().object(), Some(old));
        assert!(tex.bind(&mut ctx));
        assert_ne!(tex.handle().object(), Some(old));
        assert_eq!(tex.asset_key(), Some("b.png"));
        assert!(!ctx.gfx.device().is_texture_live(old));
    }

    #[test]
    fn key_cached_during_decode_is_shared() {
        let decoder = Arc::new(FakeDecoder::new());
        let mut ctx = context_with(decoder.clone());
        let mut background = Texture::new();
        background
            .load_async(&mut ctx, "a.png", LoadOptions::default())
            .unwrap();
        background.wait_for_load();

        let mut eager = Texture::new();
        eager.load(&mut ctx, "a.png", LoadOptions::default()).unwrap();
        assert!(background.bind(&mut ctx));
        assert!(background.is_shared());
        assert_eq!(background.handle().object(), eager.handle().object());
        assert_eq!(uploads(&ctx), 1);
        assert_eq!(ctx.cache.refs("a.png"), 2);
    }

    #[test]
    fn flipped_upload_reverses_rows() {
        let mut ctx = context();
        let bytes = Bitmap::from_bytes(
            2,
            3,
            3,
            (0..3u8).flat_map(|row| [row * 10; 6]).collect(),
        );
        let floats = Bitmap::from_floats(
            1,
            3,
            (0..3).flat_map(|row| [row as f32; 4]).collect(),
        );
        let flip = LoadOptions {
            mipmaps: false,
            flip_vertically: true,
        };
        for bitmap in [bytes, floats] {
            let mut tex = Texture::new();
            tex.upload_pixels(&mut ctx, Dimensionality::D2, bitmap.clone(), &flip)
                .unwrap();
            let id = tex.handle().object().unwrap();
            let uploaded = &ctx.gfx.device().texture(id).unwrap().levels[0].pixels;
            let row_len = bitmap.row_len();
            match (uploaded, &bitmap.pixels) {
                (PixelBuffer::Bytes(out), PixelBuffer::Bytes(src)) => {
                    for i in 0..3 {
                        assert_eq!(
                            out[(2 - i) * row_len..(3 - i) * row_len],
                            src[i * row_len..(i + 1) * row_len]
                        );
                    }
                }
                (PixelBuffer::Floats(out), PixelBuffer::Floats(src)) => {
                    for i in 0..3 {
                        assert_eq!(
                            out[(2 - i) * row_len..(3 - i) * row_len],
                            src[i * row_len..(i + 1) * row_len]
                        );
                    }
                }
                _ => panic!("pixel type changed during upload"),
            }
            tex.unload(&mut ctx);
        }
    }

    #[test]
    fn upload_preserves_enable_state_and_selects_filtering() {
        let mut ctx = context();
        let mut tex = Texture::new();
        let bitmap = Bitmap::from_bytes(4, 4, 4, vec![200; 64]);
        tex.upload_pixels(&mut ctx, Dimensionality::D2, bitmap.clone(), &LoadOptions {
            mipmaps: true,
            flip_vertically: false,
        })
        .unwrap();
        assert!(!ctx.gfx.is_enabled(Dimensionality::D2));
        let id = tex.handle().object().unwrap();
        assert_eq!(ctx.gfx.device().texture(id).unwrap().levels.len(), 3);
        assert_eq!(
            ctx.gfx.device().texture_sampler(id),
            Some(SamplerParams::MIPMAPPED)
        );

        ctx.gfx.enable(Dimensionality::D2);
        tex.upload_pixels(&mut ctx, Dimensionality::D2, bitmap, &LoadOptions::default())
            .unwrap();
        assert!(ctx.gfx.is_enabled(Dimensionality::D2));
        assert_eq!(tex.handle().object(), Some(id));
        assert_eq!(ctx.gfx.device().texture(id).unwrap().levels.len(), 1);
        assert_eq!(
            ctx.gfx.device().texture_sampler(id),
            Some(SamplerParams::LINEAR_REPEAT)
        );
        assert!(tex.handle().is_valid_for_binding());
        assert!(!tex.handle().is_valid_for_capture());
    }

    #[test]
    fn one_dimensional_upload_needs_one_row() {
        let mut ctx = context();
        let mut tex = Texture::new();
        let err = tex
            .upload_pixels(
                &mut ctx,
                Dimensionality::D1,
                Bitmap::from_bytes(4, 2, 3, vec![0; 24]),
                &LoadOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, TextureError::StateMisuse(_)));
        tex.upload_pixels(
            &mut ctx,
            Dimensionality::D1,
            Bitmap::from_bytes(4, 1, 1, vec![0; 4]),
            &LoadOptions::default(),
        )
        .unwrap();
        assert_eq!(tex.handle().dimensionality(), Dimensionality::D1);
        assert!(tex.bind(&mut ctx));
        assert!(ctx.gfx.is_enabled(Dimensionality::D1));
    }

    #[test]
    fn missing_capability_fails_softly() {
        let mut ctx = context();
        ctx.gfx.device_mut().set_capabilities(Capabilities {
            framebuffer_blit: false,
            ..Capabilities::ALL
        });
        let mut tex = Texture::new();
        let err = tex
            .init_as_render_target(&mut ctx.gfx, BufferKind::ColorOnly, 8, 8, &rt_options())
            .unwrap_err();
        assert!(matches!(
            err,
            TextureError::CapabilityUnavailable(Capability::FramebufferBlit)
        ));
        assert!(!tex.bind(&mut ctx));
        assert_eq!(ctx.gfx.device().live_objects(), 0);
    }

    #[test]
    fn misuse_is_rejected_without_side_effects() {
        let mut ctx = context();
        let mut tex = Texture::new();
        assert!(matches!(
            tex.init_as_render_target(&mut ctx.gfx, BufferKind::ColorOnly, 0, 8, &rt_options()),
            Err(TextureError::InvalidDimensions { .. })
        ));
        assert!(tex
            .init_as_render_target(&mut ctx.gfx, BufferKind::None, 8, 8, &rt_options())
            .is_err());
        tex.init_as_render_target(&mut ctx.gfx, BufferKind::ColorOnly, 8, 8, &rt_options())
            .unwrap();
        assert!(tex
            .init_as_render_target(&mut ctx.gfx, BufferKind::ColorOnly, 8, 8, &rt_options())
            .is_err());
        assert!(tex.load(&mut ctx, "a.png", LoadOptions::default()).is_err());
        assert!(tex.share_as(&mut ctx, "rt").is_err());
        assert!(tex.handle().is_valid_for_capture());
        assert_eq!(ctx.gfx.device().live_objects(), 2);
    }

    #[test]
    fn published_pixels_are_shared_by_key() {
        let decoder = Arc::new(FakeDecoder::new());
        let mut ctx = context_with(decoder.clone());
        let mut generated = Texture::new();
        generated
            .upload_pixels(
                &mut ctx,
                Dimensionality::D2,
                Bitmap::from_bytes(1, 1, 4, vec![1, 2, 3, 4]),
                &LoadOptions::default(),
            )
            .unwrap();
        generated.share_as(&mut ctx, "noise").unwrap();

        let mut user = Texture::new();
        user.load(&mut ctx, "noise", LoadOptions::default()).unwrap();
        assert_eq!(user.handle().object(), generated.handle().object());
        assert_eq!(decoder.calls("noise"), 0);

        generated.unload(&mut ctx);
        assert!(user.bind(&mut ctx));
        user.unload(&mut ctx);
        assert_eq!(ctx.gfx.device().live_textures(), 0);
    }

    #[test]
    fn context_loss_and_reload_refreshes_bound_textures() {
        let decoder = Arc::new(FakeDecoder::new());
        let mut ctx = context_with(decoder.clone());
        let mut tex = Texture::new();
        tex.load(&mut ctx, "a.png", LoadOptions::default()).unwrap();
        let before = tex.handle().object();

        ctx.context_lost();
        assert!(!tex.bind(&mut ctx));
        assert_eq!(ctx.reinit_all(), 1);
        assert!(tex.bind(&mut ctx));
        assert_ne!(tex.handle().object(), before);
        assert_eq!(decoder.calls("a.png"), 2);

        tex.unload(&mut ctx);
        assert_eq!(ctx.gfx.device().invalid_deletes(), 0);
        assert!(ctx.cache.is_empty());
    }
}
