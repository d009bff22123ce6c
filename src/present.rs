//! Puts one texture on the window surface.

use crate::gpu::device::TextureId;
use crate::gpu::pipeline_helpers::{
    create_screen_space_pipeline, filtering_sampler, linear_sampler,
    texture_2d,
};
use crate::gpu::wgpu_device::WgpuDevice;

/// Full-screen textured pass onto the swapchain.
pub struct Presenter {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
}

impl std::fmt::Debug for Presenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Presenter").finish_non_exhaustive()
    }
}

impl Presenter {
    /// Build the pipeline for the device's surface format.
    #[must_use]
    pub fn new(device: &WgpuDevice) -> Self {
        let context = device.render_context();
        let shader =
            context
                .device
                .create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some("Present Shader"),
                    source: wgpu::ShaderSource::Wgsl(
                        include_str!("shaders/present.wgsl").into(),
                    ),
                });
        let layout = context.device.create_bind_group_layout(
            &wgpu::BindGroupLayoutDescriptor {
                label: Some("Present Layout"),
                entries: &[texture_2d(0), filtering_sampler(1)],
            },
        );
        let pipeline = create_screen_space_pipeline(
            &context.device,
            "Present",
            &shader,
            context.format(),
            &[&layout],
        );
        let sampler = linear_sampler(&context.device, "Present Sampler");
        Self {
            pipeline,
            layout,
            sampler,
        }
    }

    /// Draw `texture` over the whole window and present. With no texture
    /// (or one without storage) the window is cleared to black.
    ///
    /// # Errors
    ///
    /// [`wgpu::SurfaceError`] when the swapchain image is unavailable; the
    /// caller reconfigures the surface and tries again next frame.
    pub fn present(
        &self,
        device: &WgpuDevice,
        texture: Option<TextureId>,
    ) -> Result<(), wgpu::SurfaceError> {
        let context = device.render_context();
        let frame = context.get_next_frame()?;
        let target = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let bind_group = texture.and_then(|id| device.texture_view(id)).map(
            |view| {
                context
                    .device
                    .create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some("Present Bind Group"),
                        layout: &self.layout,
                        entries: &[
                            wgpu::BindGroupEntry {
                                binding: 0,
                                resource: wgpu::BindingResource::TextureView(
                                    view,
                                ),
                            },
                            wgpu::BindGroupEntry {
                                binding: 1,
                                resource: wgpu::BindingResource::Sampler(
                                    &self.sampler,
                                ),
                            },
                        ],
                    })
            },
        );

        let mut encoder = context.create_encoder();
        {
            let mut pass =
                encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Present Pass"),
                    color_attachments: &[Some(
                        wgpu::RenderPassColorAttachment {
                            view: &target,
                            depth_slice: None,
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                                store: wgpu::StoreOp::Store,
                            },
                        },
                    )],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
            if let Some(bind_group) = &bind_group {
                pass.set_pipeline(&self.pipeline);
                pass.set_bind_group(0, bind_group, &[]);
                pass.draw(0..3, 0..1);
            }
        }
        context.submit(encoder);
        frame.present();
        Ok(())
    }
}
